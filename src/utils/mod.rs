//! # Utility Modules
//!
//! Supporting utilities for body integrity, logging and metrics.
//!
//! ## Components
//! - **Integrity**: HMAC-SHA1 body digests with constant-time verification
//! - **Logging**: Structured logging configuration
//! - **Metrics**: Thread-safe observability counters

pub mod integrity;
pub mod logging;
pub mod metrics;
