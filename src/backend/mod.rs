//! Analysis backend access.
//!
//! This module provides the client used to poll jobs and fetch their results.

pub mod client;

pub use client::{BackendClient, BackendSettings};
