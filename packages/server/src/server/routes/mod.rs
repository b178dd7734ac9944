// HTTP routes
pub mod health;
pub mod matches;
pub mod requests;

pub use health::*;
pub use matches::*;
pub use requests::*;
