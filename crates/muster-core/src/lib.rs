//! Core types and trait definitions for the Muster personnel roster.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod error;
pub mod identity;
pub mod person;
pub mod query;
pub mod store;

pub use error::{Error, Result};
