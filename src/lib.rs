//! querywarden — role-gated natural-language SQL with karma reputation.
//!
//! Users authenticate with username + password and receive a signed,
//! time-bounded session token. Protected endpoints pass the token through
//! the authorization gate, which checks the caller's role against the
//! endpoint's allowed set and moves the caller's karma accordingly: every
//! denied attempt costs 1.0, every authorized query execution earns 0.2.
//!
//! The English-to-SQL translator and the SQL executor sit behind traits in
//! [`query`]; the trust core in [`auth`] treats both as black boxes.

pub mod auth;
pub mod config;
pub mod error;
pub mod gateway;
pub mod query;

pub use error::{Error, Result};
