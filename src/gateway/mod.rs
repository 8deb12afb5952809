// src/gateway/mod.rs

//! Gateway access for the content-addressed store.
//!
//! This module provides the retrying fetch client used by every network
//! path in the crate: a `Transport` trait for a single attempt (mockable
//! in tests), a pooled HTTP implementation, and the retry policy wrapped
//! around it.

mod client;
mod retry;

pub use client::{FetchClient, GatewayResponse, HttpTransport, Method, Transport};
pub use retry::{retry_blocking, RetryConfig, RetryResult};
