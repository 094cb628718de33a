//! Authentication middleware for protected routes.
//!
//! Verifies the bearer token before any handler runs and injects the
//! resulting [`VerifiedIdentity`](crate::auth::VerifiedIdentity) into request extensions. Rejected requests
//! never reach a handler, so they never touch storage.

use crate::auth::{AuthError, TokenVerifier};
use crate::errors::GatewayError;
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::instrument;

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    /// Token verifier with JWKS client.
    pub verifier: Arc<TokenVerifier>,
}

/// Authentication middleware that verifies bearer tokens.
///
/// # Authorization Header Format
///
/// ```text
/// Authorization: Bearer <token>
/// ```
///
/// # Response
///
/// - 401 with a plain-text body if the token is missing
/// - 401 with a generic body and `WWW-Authenticate` if it is invalid
/// - Otherwise continues with `VerifiedIdentity` in extensions
#[instrument(skip(state, req, next), name = "og.middleware.auth")]
pub async fn require_auth(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, GatewayError> {
    let authorization = match req.headers().get(AUTHORIZATION) {
        None => None,
        Some(value) => Some(value.to_str().map_err(|_| {
            tracing::debug!(target: "og.middleware.auth", "Authorization header is not valid ASCII");
            GatewayError::from(AuthError::MalformedToken)
        })?),
    };

    let identity = state.verifier.verify(authorization).await.map_err(|e| {
        tracing::debug!(target: "og.middleware.auth", reason = e.metric_label(), "Request rejected");
        GatewayError::from(e)
    })?;

    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}
