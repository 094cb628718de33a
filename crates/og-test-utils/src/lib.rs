//! # Object Gateway Test Utilities
//!
//! Shared test utilities for the Object Gateway service.
//!
//! This crate provides:
//! - Deterministic crypto fixtures (fixed RSA keys and their JWKs)
//! - Test token builders (TestTokenBuilder)
//! - A mock JWKS endpoint (TestJwksServer)
//! - Server test harness (TestGatewayServer for E2E tests)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use og_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> anyhow::Result<()> {
//!     let jwks = TestJwksServer::start().await;
//!     let server = TestGatewayServer::spawn(&jwks.jwks_url()).await?;
//!
//!     let token = TestTokenBuilder::new()
//!         .for_user("alice")
//!         .sign_rs256(TEST_KEY_A_PEM, TEST_KID_A);
//!
//!     let response = reqwest::Client::new()
//!         .get(format!("{}/list-files", server.url()))
//!         .bearer_auth(token)
//!         .send()
//!         .await?;
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod crypto_fixtures;
pub mod jwks_server;
pub mod server_harness;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use jwks_server::*;
pub use server_harness::*;
pub use token_builders::*;
