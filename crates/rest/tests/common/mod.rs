//! Common test utilities for API testing.
//!
//! - [`fixtures`] - Table configuration and seed rows
//! - [`harness`] - A booted in-memory world and its test server

pub mod fixtures;
pub mod harness;
