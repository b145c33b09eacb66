//! Request authentication layer
//!
//! Gates every route behind one of the configured schemes:
//! - `none`: everything passes
//! - `api_key`: a header (default `x-api-key`) must carry the configured key
//! - `bearer`: `Authorization: Bearer <token>`, checked when a token is configured
//! - `basic`: `Authorization: Basic <base64>`, checked against configured credentials

use axum::{
    http::{HeaderMap, Request, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::task::{Context, Poll};
use subtle::ConstantTimeEq;
use tower::{Layer, Service};
use tracing::warn;

/// Authentication scheme
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    /// No authentication
    #[default]
    None,
    /// Static key in a request header
    #[serde(alias = "api-key")]
    ApiKey,
    /// Bearer token
    Bearer,
    /// HTTP basic credentials
    Basic,
}

/// Authentication settings (`[auth]`)
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthSettings {
    #[serde(rename = "type", default)]
    pub auth_type: AuthType,
    #[serde(default = "default_api_key_header")]
    pub api_key_header: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub bearer_token: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

fn default_api_key_header() -> String {
    "x-api-key".to_string()
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            auth_type: AuthType::None,
            api_key_header: default_api_key_header(),
            api_key: None,
            bearer_token: None,
            username: None,
            password: None,
        }
    }
}

impl std::fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "***");
        f.debug_struct("AuthSettings")
            .field("auth_type", &self.auth_type)
            .field("api_key_header", &self.api_key_header)
            .field("api_key", &redact(&self.api_key))
            .field("bearer_token", &redact(&self.bearer_token))
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .finish()
    }
}

impl AuthSettings {
    /// Reject combinations that could never authenticate anyone.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.auth_type == AuthType::ApiKey && self.api_key.as_deref().map_or(true, str::is_empty)
        {
            return Err("auth type 'api_key' requires auth.api_key".to_string());
        }
        Ok(())
    }

    /// Check request headers against the configured scheme.
    ///
    /// Returns the rejection message on failure.
    pub fn check(&self, headers: &HeaderMap) -> std::result::Result<(), &'static str> {
        match self.auth_type {
            AuthType::None => Ok(()),
            AuthType::ApiKey => {
                let presented = header_str(headers, &self.api_key_header);
                match (presented, self.api_key.as_deref()) {
                    (Some(presented), Some(expected)) if secure_eq(presented, expected) => Ok(()),
                    _ => Err("Unauthorized: Invalid API key"),
                }
            }
            AuthType::Bearer => {
                let token = header_str(headers, "authorization")
                    .and_then(|v| v.strip_prefix("Bearer "))
                    .ok_or("Unauthorized: Missing or invalid Bearer token")?;
                match self.bearer_token.as_deref() {
                    Some(expected) if !secure_eq(token.trim(), expected) => {
                        Err("Unauthorized: Invalid Bearer token")
                    }
                    _ => Ok(()),
                }
            }
            AuthType::Basic => {
                let (username, password) = header_str(headers, "authorization")
                    .and_then(|v| v.strip_prefix("Basic "))
                    .and_then(decode_basic)
                    .ok_or("Unauthorized: Missing or invalid Basic auth")?;

                let user_ok = self
                    .username
                    .as_deref()
                    .map_or(true, |expected| secure_eq(&username, expected));
                let pass_ok = self
                    .password
                    .as_deref()
                    .map_or(true, |expected| secure_eq(&password, expected));
                if user_ok && pass_ok {
                    Ok(())
                } else {
                    Err("Unauthorized: Invalid credentials")
                }
            }
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn secure_eq(presented: &str, expected: &str) -> bool {
    presented.as_bytes().ct_eq(expected.as_bytes()).into()
}

fn decode_basic(encoded: &str) -> Option<(String, String)> {
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let (user, pass) = text.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

/// JSON error response for auth failures
#[derive(Debug, Serialize)]
struct AuthErrorResponse {
    error: &'static str,
}

/// Tower layer applying [`AuthSettings`] to every request
#[derive(Clone)]
pub struct AuthLayer {
    settings: Arc<AuthSettings>,
}

impl AuthLayer {
    pub fn new(settings: &AuthSettings) -> Self {
        Self {
            settings: Arc::new(settings.clone()),
        }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService {
            inner,
            settings: self.settings.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AuthService<S> {
    inner: S,
    settings: Arc<AuthSettings>,
}

type BoxFuture<T, E> =
    std::pin::Pin<Box<dyn std::future::Future<Output = std::result::Result<T, E>> + Send>>;

impl<S, B> Service<Request<B>> for AuthService<S>
where
    S: Service<Request<B>, Response = Response> + Send + Clone + 'static,
    S::Future: Send + 'static,
    B: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<Response, S::Error>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<B>) -> BoxFuture<Response, S::Error> {
        let verdict = self.settings.check(req.headers());
        let mut inner = self.inner.clone();

        Box::pin(async move {
            match verdict {
                Ok(()) => inner.call(req).await,
                Err(error) => {
                    warn!(path = %req.uri().path(), reason = error, "Request rejected");
                    Ok((StatusCode::UNAUTHORIZED, Json(AuthErrorResponse { error })).into_response())
                }
            }
        })
    }
}
