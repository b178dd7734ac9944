//! Professional directory: the read-only view of professionals the matching
//! engine ranks by distance.

pub mod directory;
pub mod models;

pub use directory::{PostgresProfessionalDirectory, ProfessionalDirectory};
pub use models::Candidate;
