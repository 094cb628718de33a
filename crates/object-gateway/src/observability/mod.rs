//! Observability module for Object Gateway.
//!
//! Provides metrics definitions and the Prometheus recorder setup.

pub mod metrics;
