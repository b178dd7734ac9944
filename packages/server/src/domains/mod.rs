// Business domains
pub mod matching;
pub mod professionals;
pub mod requests;
