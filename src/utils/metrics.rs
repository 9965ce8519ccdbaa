//! Observability and Metrics
//!
//! Counters for session outcomes, traffic and validation failures.
//!
//! Uses atomic counters for thread-safe metrics collection, so one instance
//! can be shared by every session in the process.

use crate::error::{DecodeError, ProtocolError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Metrics collector for protocol operations
#[derive(Debug)]
pub struct Metrics {
    /// Sessions that completed the CONNECT handshake
    pub sessions_opened: AtomicU64,
    /// Sessions refused with CONNECT_FAIL
    pub sessions_rejected: AtomicU64,
    /// Sessions that ended in the Failed state for any other reason
    pub sessions_failed: AtomicU64,
    /// Total messages sent
    pub messages_sent: AtomicU64,
    /// Total messages received
    pub messages_received: AtomicU64,
    /// Total bytes sent, headers included
    pub bytes_sent: AtomicU64,
    /// Total bytes received, headers included
    pub bytes_received: AtomicU64,
    /// INVOKE messages sent or served
    pub invocations: AtomicU64,
    /// RESULT messages carrying the EXCEPTION flag
    pub exceptions: AtomicU64,
    /// Headers rejected by checksum
    pub checksum_failures: AtomicU64,
    /// Digest failures and authentication mode mismatches
    pub authentication_failures: AtomicU64,
    /// Every other wire-level violation
    pub protocol_errors: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            sessions_opened: AtomicU64::new(0),
            sessions_rejected: AtomicU64::new(0),
            sessions_failed: AtomicU64::new(0),
            messages_sent: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            invocations: AtomicU64::new(0),
            exceptions: AtomicU64::new(0),
            checksum_failures: AtomicU64::new(0),
            authentication_failures: AtomicU64::new(0),
            protocol_errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn session_opened(&self) {
        self.sessions_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn session_rejected(&self) {
        self.sessions_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn session_failed(&self) {
        self.sessions_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a message sent
    pub fn message_sent(&self, byte_count: u64) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(byte_count, Ordering::Relaxed);
    }

    /// Record a message received
    pub fn message_received(&self, byte_count: u64) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn invocation(&self) {
        self.invocations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn exception(&self) {
        self.exceptions.fetch_add(1, Ordering::Relaxed);
    }

    /// Classify and count a failure. Local misuse and peer rejections are not
    /// counted here.
    pub fn record_error(&self, error: &ProtocolError) {
        match error {
            ProtocolError::Decode(DecodeError::ChecksumMismatch { .. }) => {
                self.checksum_failures.fetch_add(1, Ordering::Relaxed);
            }
            ProtocolError::AuthenticationFailed
            | ProtocolError::AuthenticationModeMismatch { .. } => {
                self.authentication_failures.fetch_add(1, Ordering::Relaxed);
            }
            ProtocolError::ConnectionRejected(_) => {}
            other if other.is_wire_error() => {
                self.protocol_errors.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            sessions_opened: self.sessions_opened.load(Ordering::Relaxed),
            sessions_rejected: self.sessions_rejected.load(Ordering::Relaxed),
            sessions_failed: self.sessions_failed.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            invocations: self.invocations.load(Ordering::Relaxed),
            exceptions: self.exceptions.load(Ordering::Relaxed),
            checksum_failures: self.checksum_failures.load(Ordering::Relaxed),
            authentication_failures: self.authentication_failures.load(Ordering::Relaxed),
            protocol_errors: self.protocol_errors.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            sessions_opened = snapshot.sessions_opened,
            sessions_rejected = snapshot.sessions_rejected,
            sessions_failed = snapshot.sessions_failed,
            messages_sent = snapshot.messages_sent,
            messages_received = snapshot.messages_received,
            bytes_sent = snapshot.bytes_sent,
            bytes_received = snapshot.bytes_received,
            invocations = snapshot.invocations,
            exceptions = snapshot.exceptions,
            checksum_failures = snapshot.checksum_failures,
            authentication_failures = snapshot.authentication_failures,
            protocol_errors = snapshot.protocol_errors,
            uptime_seconds = snapshot.uptime_seconds,
            "Protocol metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub sessions_opened: u64,
    pub sessions_rejected: u64,
    pub sessions_failed: u64,
    pub messages_sent: u64,
    pub messages_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub invocations: u64,
    pub exceptions: u64,
    pub checksum_failures: u64,
    pub authentication_failures: u64,
    pub protocol_errors: u64,
    pub uptime_seconds: u64,
}

/// Global metrics instance (lazy static for simplicity)
static METRICS: once_cell::sync::Lazy<Metrics> = once_cell::sync::Lazy::new(Metrics::new);

/// Get the global metrics instance
pub fn global_metrics() -> &'static Metrics {
    &METRICS
}

/// Timer for measuring operation duration
pub struct Timer {
    start: Instant,
    operation: &'static str,
}

impl Timer {
    /// Start timing an operation
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        debug!(
            operation = self.operation,
            duration_us = duration.as_micros() as u64,
            "Operation completed"
        );
    }
}
