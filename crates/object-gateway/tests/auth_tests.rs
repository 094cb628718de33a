//! Authentication integration tests.
//!
//! Exercises the bearer-token gate in front of every protected endpoint using
//! a mocked JWKS endpoint and the fixture RSA keys.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::Result;
use chrono::Utc;
use og_test_utils::*;
use std::sync::Arc;

async fn spawn_gateway() -> Result<(TestJwksServer, TestGatewayServer)> {
    let jwks = TestJwksServer::start().await;
    let server = TestGatewayServer::spawn(&jwks.jwks_url()).await?;
    Ok((jwks, server))
}

fn valid_token(subject: &str) -> String {
    TestTokenBuilder::new()
        .for_user(subject)
        .sign_rs256(TEST_KEY_A_PEM, TEST_KID_A)
}

async fn list_files_with(server: &TestGatewayServer, token: &str) -> Result<reqwest::Response> {
    Ok(reqwest::Client::new()
        .get(format!("{}/list-files", server.url()))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await?)
}

/// Every protected route answers 401 without a token and never touches storage.
#[tokio::test]
async fn test_protected_routes_require_auth() -> Result<()> {
    let (_jwks, server) = spawn_gateway().await?;
    let client = reqwest::Client::new();
    let base = server.url();

    let requests = [
        client.get(format!("{base}/generate-upload-url?filename=a.png&type=image/png")),
        client.get(format!("{base}/generate-download-url?key=images/alice/1.png")),
        client.post(format!("{base}/upload-image")),
        client.delete(format!("{base}/delete-file?key=images/alice/1.png")),
        client.get(format!("{base}/list-files")),
    ];

    for request in requests {
        let response = request.send().await?;
        assert_eq!(response.status(), 401);
        let challenge = response
            .headers()
            .get("www-authenticate")
            .expect("401 should carry a challenge")
            .to_str()?;
        assert!(challenge.starts_with("Bearer"));
    }

    assert_eq!(server.store().call_count(), 0);

    Ok(())
}

#[tokio::test]
async fn test_rejects_non_bearer_scheme() -> Result<()> {
    let (_jwks, server) = spawn_gateway().await?;

    let response = reqwest::Client::new()
        .get(format!("{}/list-files", server.url()))
        .header("Authorization", "Basic dXNlcjpwYXNz")
        .send()
        .await?;

    assert_eq!(response.status(), 401);
    assert_eq!(server.store().call_count(), 0);

    Ok(())
}

#[tokio::test]
async fn test_accepts_valid_token() -> Result<()> {
    let (_jwks, server) = spawn_gateway().await?;

    let response = list_files_with(&server, &valid_token("alice")).await?;

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["count"], 0);

    Ok(())
}

/// Access tokens carry `client_id` instead of `aud`.
#[tokio::test]
async fn test_accepts_client_id_as_audience() -> Result<()> {
    let (_jwks, server) = spawn_gateway().await?;

    let token = TestTokenBuilder::new()
        .for_user("alice")
        .with_client_id(TEST_CLIENT_ID)
        .sign_rs256(TEST_KEY_A_PEM, TEST_KID_A);

    let response = list_files_with(&server, &token).await?;
    assert_eq!(response.status(), 200);

    Ok(())
}

#[tokio::test]
async fn test_rejects_wrong_audience() -> Result<()> {
    let (_jwks, server) = spawn_gateway().await?;

    let token = TestTokenBuilder::new()
        .for_user("alice")
        .for_audience("some-other-client")
        .sign_rs256(TEST_KEY_A_PEM, TEST_KID_A);

    let response = list_files_with(&server, &token).await?;
    assert_eq!(response.status(), 401);

    Ok(())
}

#[tokio::test]
async fn test_audience_check_disabled_without_client_id() -> Result<()> {
    let jwks = TestJwksServer::start().await;
    let server = TestGatewayServer::spawn_with(
        &jwks.jwks_url(),
        Arc::new(object_gateway::storage::InMemoryObjectStore::new(TEST_BUCKET)),
        &[("COGNITO_CLIENT_ID", "")],
    )
    .await?;

    let token = TestTokenBuilder::new()
        .for_user("alice")
        .for_audience("some-other-client")
        .sign_rs256(TEST_KEY_A_PEM, TEST_KID_A);

    let response = list_files_with(&server, &token).await?;
    assert_eq!(response.status(), 200);

    Ok(())
}

#[tokio::test]
async fn test_rejects_wrong_issuer() -> Result<()> {
    let (_jwks, server) = spawn_gateway().await?;

    let token = TestTokenBuilder::new()
        .for_user("alice")
        .issued_by("https://evil.example.com/pool")
        .sign_rs256(TEST_KEY_A_PEM, TEST_KID_A);

    let response = list_files_with(&server, &token).await?;
    assert_eq!(response.status(), 401);

    Ok(())
}

#[tokio::test]
async fn test_rejects_expired_token() -> Result<()> {
    let (_jwks, server) = spawn_gateway().await?;

    let token = TestTokenBuilder::new()
        .for_user("alice")
        .issued_at(Utc::now().timestamp() - 7200)
        .expires_in(-3600)
        .sign_rs256(TEST_KEY_A_PEM, TEST_KID_A);

    let response = list_files_with(&server, &token).await?;
    assert_eq!(response.status(), 401);

    Ok(())
}

#[tokio::test]
async fn test_rejects_future_iat_token() -> Result<()> {
    let (_jwks, server) = spawn_gateway().await?;

    let token = TestTokenBuilder::new()
        .for_user("alice")
        .issued_at(Utc::now().timestamp() + 3600)
        .expires_in(7200)
        .sign_rs256(TEST_KEY_A_PEM, TEST_KID_A);

    let response = list_files_with(&server, &token).await?;
    assert_eq!(response.status(), 401);

    Ok(())
}

#[tokio::test]
async fn test_rejects_unknown_kid() -> Result<()> {
    let (_jwks, server) = spawn_gateway().await?;

    let token = TestTokenBuilder::new()
        .for_user("alice")
        .sign_rs256(TEST_KEY_B_PEM, TEST_KID_B);

    let response = list_files_with(&server, &token).await?;
    assert_eq!(response.status(), 401);

    Ok(())
}

/// A token signed by an unpublished key but naming a published kid.
#[tokio::test]
async fn test_rejects_forged_signature() -> Result<()> {
    let (_jwks, server) = spawn_gateway().await?;

    let token = TestTokenBuilder::new()
        .for_user("alice")
        .sign_rs256(TEST_KEY_B_PEM, TEST_KID_A);

    let response = list_files_with(&server, &token).await?;
    assert_eq!(response.status(), 401);

    Ok(())
}

#[tokio::test]
async fn test_rejects_symmetric_algorithm() -> Result<()> {
    let (_jwks, server) = spawn_gateway().await?;

    // HS256 keyed with the published modulus, the classic confusion attack
    let token = TestTokenBuilder::new()
        .for_user("alice")
        .sign_hs256(TEST_KEY_A_N.as_bytes(), TEST_KID_A);

    let response = list_files_with(&server, &token).await?;
    assert_eq!(response.status(), 401);

    Ok(())
}

#[tokio::test]
async fn test_rejects_unsigned_token() -> Result<()> {
    let (_jwks, server) = spawn_gateway().await?;

    let token = TestTokenBuilder::new().for_user("alice").unsigned(TEST_KID_A);

    let response = list_files_with(&server, &token).await?;
    assert_eq!(response.status(), 401);

    Ok(())
}

#[tokio::test]
async fn test_rejects_subject_with_path_separator() -> Result<()> {
    let (_jwks, server) = spawn_gateway().await?;

    let response = list_files_with(&server, &valid_token("alice/../bob")).await?;
    assert_eq!(response.status(), 401);
    assert_eq!(server.store().call_count(), 0);

    Ok(())
}

#[tokio::test]
async fn test_rejects_token_without_subject() -> Result<()> {
    let (_jwks, server) = spawn_gateway().await?;

    let token = TestTokenBuilder::new()
        .without_claim("sub")
        .sign_rs256(TEST_KEY_A_PEM, TEST_KID_A);

    let response = list_files_with(&server, &token).await?;
    assert_eq!(response.status(), 401);

    Ok(())
}

#[tokio::test]
async fn test_rejects_garbage_token() -> Result<()> {
    let (jwks, server) = spawn_gateway().await?;

    let response = list_files_with(&server, "not-a-jwt").await?;
    assert_eq!(response.status(), 401);
    // Rejected before any key lookup
    assert_eq!(jwks.fetch_count().await, 0);

    Ok(())
}

/// An unreachable identity provider fails closed.
#[tokio::test]
async fn test_jwks_unavailable_fails_closed() -> Result<()> {
    let jwks = TestJwksServer::unavailable().await;
    let server = TestGatewayServer::spawn(&jwks.jwks_url()).await?;

    let response = list_files_with(&server, &valid_token("alice")).await?;
    assert_eq!(response.status(), 401);
    assert_eq!(server.store().call_count(), 0);

    Ok(())
}

/// Keys are fetched once and then served from the cache.
#[tokio::test]
async fn test_jwks_fetched_once_for_repeated_requests() -> Result<()> {
    let (jwks, server) = spawn_gateway().await?;
    let token = valid_token("alice");

    for _ in 0..3 {
        let response = list_files_with(&server, &token).await?;
        assert_eq!(response.status(), 200);
    }

    assert_eq!(jwks.fetch_count().await, 1);

    Ok(())
}
