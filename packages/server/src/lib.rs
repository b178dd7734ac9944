// Miles - matching core
//
// This crate pairs customer service requests with nearby professionals, one
// time-boxed offer at a time, until someone accepts.
//
// Domains live in domains/*; external providers sit behind the traits in kernel/.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
