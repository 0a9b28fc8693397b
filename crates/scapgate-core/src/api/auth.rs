//! Optional HTTP basic authentication.
//!
//! When `[auth] enabled = true`, every route requires an
//! `Authorization: Basic ...` header carrying the configured credentials.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use constant_time_eq::constant_time_eq;
use tracing::debug;

use scapgate_config::{AuthConfig, Secret};

use super::request::ErrorBody;

/// Realm advertised in the `WWW-Authenticate` challenge.
pub const REALM: &str = "scapgate";

/// The single username/password pair the gateway accepts.
#[derive(Debug, Clone)]
pub struct BasicCredentials {
    username: String,
    password: Secret,
}

impl BasicCredentials {
    pub fn new(username: impl Into<String>, password: Secret) -> Self {
        Self {
            username: username.into(),
            password,
        }
    }

    /// Credentials to enforce, or `None` when authentication is disabled.
    pub fn from_config(config: &AuthConfig) -> Option<Self> {
        config
            .enabled
            .then(|| Self::new(config.username.clone(), config.password.clone()))
    }

    /// Check an `Authorization` header value.
    pub fn accepts(&self, authorization: &str) -> bool {
        let Some(encoded) = authorization.strip_prefix("Basic ") else {
            return false;
        };
        let Ok(decoded) = STANDARD.decode(encoded.trim()) else {
            return false;
        };
        let Ok(decoded) = String::from_utf8(decoded) else {
            return false;
        };
        let Some((username, password)) = decoded.split_once(':') else {
            return false;
        };

        let user_ok = constant_time_eq(username.as_bytes(), self.username.as_bytes());
        let pass_ok = constant_time_eq(password.as_bytes(), self.password.expose().as_bytes());
        user_ok & pass_ok
    }
}

/// Middleware rejecting requests without valid basic credentials.
pub async fn require_basic_auth(
    State(credentials): State<Arc<BasicCredentials>>,
    request: Request,
    next: Next,
) -> Response {
    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| credentials.accepts(value));

    if !authorized {
        debug!(path = %request.uri().path(), "Rejected unauthenticated request");
        return (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, format!("Basic realm=\"{REALM}\""))],
            Json(ErrorBody::new("authentication required")),
        )
            .into_response();
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_for(user: &str, pass: &str) -> String {
        format!("Basic {}", STANDARD.encode(format!("{user}:{pass}")))
    }

    fn credentials() -> BasicCredentials {
        BasicCredentials::new("scanner", Secret::new("pa:ss"))
    }

    #[test]
    fn test_accepts_matching_credentials() {
        assert!(credentials().accepts(&header_for("scanner", "pa:ss")));
    }

    #[test]
    fn test_rejects_wrong_or_malformed() {
        let creds = credentials();
        assert!(!creds.accepts(&header_for("scanner", "nope")));
        assert!(!creds.accepts(&header_for("root", "pa:ss")));
        assert!(!creds.accepts("Bearer abc"));
        assert!(!creds.accepts("Basic !!!not-base64"));
        assert!(!creds.accepts(&format!("Basic {}", STANDARD.encode("no-colon"))));
    }

    #[test]
    fn test_from_config_respects_enabled() {
        let mut config = AuthConfig {
            enabled: false,
            username: "scanner".to_string(),
            password: Secret::new("pw"),
        };
        assert!(BasicCredentials::from_config(&config).is_none());
        config.enabled = true;
        assert!(BasicCredentials::from_config(&config).is_some());
    }
}
