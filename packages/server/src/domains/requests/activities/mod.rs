pub mod create;
pub mod list;

pub use create::{create_request, CreateRequestInput, CreatedRequest, IntakeError, ValidationError};
pub use list::{list_all, list_for_client};
