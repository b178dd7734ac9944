pub mod expo;
pub mod geocoding;
pub mod postmark;

pub use expo::*;
pub use geocoding::*;
pub use postmark::*;
