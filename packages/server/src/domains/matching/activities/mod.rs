//! Matching engine operations.

pub mod advance;
pub mod history;
pub mod notify;
pub mod respond;
pub mod sweep;

pub use advance::{advance, select_next_candidate};
pub use history::offer_history;
pub use notify::{notify_candidate, OfferNotice};
pub use respond::respond;
pub use sweep::sweep_expired;
