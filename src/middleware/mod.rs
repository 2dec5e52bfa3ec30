//! Middleware for observability and rate limiting.
//!
//! This module provides:
//! - Request logging with latency tracking
//! - Rate limiting per IP address
//! - Request-ID generation/propagation for cross-service tracing

pub mod logging;
pub mod request_id;

pub use logging::{request_logging, request_logging_simple};
pub use request_id::request_id as request_id_middleware;
