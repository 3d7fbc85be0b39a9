//! HTTP API Module
//!
//! Provides a REST API for coordination status and worker readiness.

mod http;

pub use http::{HealthResponse, HttpServer, StatusResponse};
