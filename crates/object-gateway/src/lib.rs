//! Object Gateway Service Library
//!
//! An HTTP gateway in front of an S3 bucket that authenticates every request
//! with an identity-provider bearer token and confines each user to their
//! own key namespace, `{namespace_root}/{subject}/`.
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> middleware/auth.rs -> handlers/*.rs -> policy -> storage
//! ```
//!
//! # Modules
//!
//! - `auth` - Token verification against the provider's JWKS
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Authentication and HTTP metrics middleware
//! - `models` - Request and response models
//! - `observability` - Prometheus metrics
//! - `policy` - Key derivation and ownership checks
//! - `routes` - Axum router setup
//! - `storage` - Object store trait, S3 and in-memory backends

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod policy;
pub mod routes;
pub mod storage;
