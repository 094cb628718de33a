//! Object Gateway configuration.
//!
//! Configuration is loaded from environment variables. The identity-provider
//! issuer and JWKS URL are derived from the Cognito region and user pool unless
//! overridden explicitly.

use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use std::collections::HashMap;
use std::env;
use thiserror::Error;

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3000";

/// Default root segment of every user namespace (`images/{sub}/...`).
pub const DEFAULT_NAMESPACE_ROOT: &str = "images";

/// Default lifetime of pre-signed URLs in seconds (5 minutes).
pub const DEFAULT_PRESIGNED_URL_TTL_SECONDS: u64 = 300;

/// Longest lifetime S3 accepts for a SigV4 pre-signed URL (7 days).
pub const MAX_PRESIGNED_URL_TTL_SECONDS: u64 = 604_800;

/// Default upper bound on direct image uploads (5 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;

/// Hard ceiling on `MAX_UPLOAD_BYTES`; uploads are buffered in memory.
pub const MAX_UPLOAD_BYTES_CEILING: u64 = 100 * 1024 * 1024;

/// Default timeout for a JWKS fetch in seconds.
pub const DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS: u64 = 5;

/// Maximum JWKS fetch timeout in seconds.
pub const MAX_JWKS_FETCH_TIMEOUT_SECONDS: u64 = 60;

/// Object Gateway configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:3000").
    pub bind_address: String,

    /// AWS region of the bucket and the Cognito user pool.
    pub aws_region: String,

    /// Cognito user pool ID, used to derive the issuer.
    pub cognito_user_pool_id: String,

    /// Expected audience / app client ID. `None` disables the audience check.
    pub cognito_client_id: Option<String>,

    /// Bucket holding all user objects.
    pub s3_bucket_name: String,

    /// Custom S3 endpoint (S3-compatible stores, local testing).
    pub s3_endpoint_url: Option<String>,

    /// Use path-style bucket addressing.
    pub s3_force_path_style: bool,

    /// Exact `iss` value tokens must carry.
    pub auth_issuer: String,

    /// URL of the identity provider's JWKS document.
    pub jwks_url: String,

    /// Upper bound on a single JWKS fetch, in seconds.
    pub jwks_fetch_timeout_seconds: u64,

    /// Clock skew tolerance in seconds for `iat` and `nbf`. Expiry is strict.
    pub jwt_clock_skew_seconds: i64,

    /// First path segment of every user namespace.
    pub namespace_root: String,

    /// Lifetime of generated pre-signed URLs, in seconds.
    pub presigned_url_ttl_seconds: u64,

    /// Largest accepted direct upload, in bytes.
    pub max_upload_bytes: usize,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),

    #[error("Invalid value for {var}: {reason}")]
    InvalidValue { var: &'static str, reason: String },
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let aws_region = required(vars, "AWS_REGION")?;
        let cognito_user_pool_id = required(vars, "COGNITO_USER_POOL_ID")?;
        let s3_bucket_name = required(vars, "S3_BUCKET_NAME")?;

        let cognito_client_id = optional(vars, "COGNITO_CLIENT_ID");
        let s3_endpoint_url = optional(vars, "S3_ENDPOINT_URL");

        let s3_force_path_style = match vars.get("S3_FORCE_PATH_STYLE").map(String::as_str) {
            None | Some("") => false,
            Some(v) if v.eq_ignore_ascii_case("true") || v == "1" => true,
            Some(v) if v.eq_ignore_ascii_case("false") || v == "0" => false,
            Some(v) => {
                return Err(ConfigError::InvalidValue {
                    var: "S3_FORCE_PATH_STYLE",
                    reason: format!("expected true or false, got '{}'", v),
                })
            }
        };

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let auth_issuer = optional(vars, "AUTH_ISSUER").unwrap_or_else(|| {
            format!(
                "https://cognito-idp.{}.amazonaws.com/{}",
                aws_region, cognito_user_pool_id
            )
        });

        let jwks_url = optional(vars, "JWKS_URL")
            .unwrap_or_else(|| format!("{}/.well-known/jwks.json", auth_issuer));

        // Parse JWT clock skew tolerance with validation
        let jwt_clock_skew_seconds = if let Some(value_str) = vars.get("JWT_CLOCK_SKEW_SECONDS") {
            let value: i64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be a valid integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value < 0 {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must not be negative, got {}",
                    value
                )));
            }

            if value > MAX_CLOCK_SKEW.as_secs() as i64 {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {}",
                    MAX_CLOCK_SKEW.as_secs(),
                    value
                )));
            }

            value
        } else {
            DEFAULT_CLOCK_SKEW.as_secs() as i64
        };

        let jwks_fetch_timeout_seconds = bounded_u64(
            vars,
            "JWKS_FETCH_TIMEOUT_SECONDS",
            DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS,
            MAX_JWKS_FETCH_TIMEOUT_SECONDS,
        )?;

        let presigned_url_ttl_seconds = bounded_u64(
            vars,
            "PRESIGNED_URL_TTL_SECONDS",
            DEFAULT_PRESIGNED_URL_TTL_SECONDS,
            MAX_PRESIGNED_URL_TTL_SECONDS,
        )?;

        let max_upload_bytes = bounded_u64(
            vars,
            "MAX_UPLOAD_BYTES",
            DEFAULT_MAX_UPLOAD_BYTES,
            MAX_UPLOAD_BYTES_CEILING,
        )?;
        let max_upload_bytes =
            usize::try_from(max_upload_bytes).map_err(|_| ConfigError::InvalidValue {
                var: "MAX_UPLOAD_BYTES",
                reason: "does not fit in memory on this platform".to_string(),
            })?;

        let namespace_root = vars
            .get("OBJECT_NAMESPACE_ROOT")
            .cloned()
            .unwrap_or_else(|| DEFAULT_NAMESPACE_ROOT.to_string());
        validate_namespace_root(&namespace_root)?;

        Ok(Config {
            bind_address,
            aws_region,
            cognito_user_pool_id,
            cognito_client_id,
            s3_bucket_name,
            s3_endpoint_url,
            s3_force_path_style,
            auth_issuer,
            jwks_url,
            jwks_fetch_timeout_seconds,
            jwt_clock_skew_seconds,
            namespace_root,
            presigned_url_ttl_seconds,
            max_upload_bytes,
        })
    }
}

fn required(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    vars.get(name)
        .filter(|v| !v.trim().is_empty())
        .cloned()
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

fn optional(vars: &HashMap<String, String>, name: &str) -> Option<String> {
    vars.get(name).filter(|v| !v.trim().is_empty()).cloned()
}

/// Parse a positive integer no larger than `max`, falling back to `default`.
fn bounded_u64(
    vars: &HashMap<String, String>,
    var: &'static str,
    default: u64,
    max: u64,
) -> Result<u64, ConfigError> {
    let Some(value_str) = vars.get(var) else {
        return Ok(default);
    };

    let value: u64 = value_str.parse().map_err(|e| ConfigError::InvalidValue {
        var,
        reason: format!(
            "must be a valid positive integer, got '{}': {}",
            value_str, e
        ),
    })?;

    if value == 0 {
        return Err(ConfigError::InvalidValue {
            var,
            reason: "must be greater than 0".to_string(),
        });
    }

    if value > max {
        return Err(ConfigError::InvalidValue {
            var,
            reason: format!("must not exceed {}, got {}", max, value),
        });
    }

    Ok(value)
}

/// The namespace root becomes the first key segment; it must be a single,
/// plain path segment.
fn validate_namespace_root(root: &str) -> Result<(), ConfigError> {
    let valid = !root.is_empty()
        && root != "."
        && root != ".."
        && root
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

    if valid {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            var: "OBJECT_NAMESPACE_ROOT",
            reason: format!("must be a single path segment, got '{}'", root),
        })
    }
}
