//! Matching domain: sequential, time-boxed offers of a request to the
//! nearest professionals, one at a time.

pub mod activities;
pub mod ledger;
pub mod models;
pub mod types;

pub use ledger::{GuardedWrite, MatchLedger, OfferInsert, PostgresMatchLedger};
pub use models::{Match, MatchStatus};
pub use types::*;
