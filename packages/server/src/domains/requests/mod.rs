//! Service requests: intake, storage and the customer/admin listings.

pub mod activities;
pub mod models;
pub mod store;

pub use models::{RequestStatus, ServiceRequest};
pub use store::{PostgresRequestStore, RequestStore};
