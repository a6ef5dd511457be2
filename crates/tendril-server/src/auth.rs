//! Bearer-token extraction and the pluggable identity boundary.
//!
//! Token verification itself is delegated: the server only knows how to
//! pull a bearer token out of the `Authorization` header and hand it to a
//! [`TokenVerifier`]. Production deployments put their identity provider
//! behind the trait; [`StaticTokenVerifier`] serves self-hosted setups and
//! tests from a token table in the configuration.

use std::{collections::HashMap, future::Future};

use axum::http::{header, HeaderMap};

use crate::error::ApiError;

/// Resolves a bearer token to a moderator/author id.
pub trait TokenVerifier: Send + Sync {
  /// `None` means invalid, expired, or unknown.
  fn verify<'a>(
    &'a self,
    token: &'a str,
  ) -> impl Future<Output = Option<String>> + Send + 'a;
}

/// Verifier backed by a fixed `token -> user id` table.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenVerifier {
  tokens: HashMap<String, String>,
}

impl StaticTokenVerifier {
  pub fn new(tokens: HashMap<String, String>) -> Self {
    Self { tokens }
  }
}

impl TokenVerifier for StaticTokenVerifier {
  async fn verify<'a>(&'a self, token: &'a str) -> Option<String> {
    self.tokens.get(token).cloned()
  }
}

/// Extract the bearer token from the `Authorization` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
  headers
    .get(header::AUTHORIZATION)?
    .to_str()
    .ok()?
    .strip_prefix("Bearer ")
}

/// Authenticate a moderator-facing request: 401 on a missing header and
/// 401 on a token the verifier rejects.
pub async fn require_user<V: TokenVerifier>(
  verifier: &V,
  headers: &HeaderMap,
) -> Result<String, ApiError> {
  let Some(token) = bearer_token(headers) else {
    return Err(ApiError::Unauthorized(
      "Missing or invalid Authorization header".into(),
    ));
  };
  verifier
    .verify(token)
    .await
    .ok_or_else(|| ApiError::Unauthorized("Invalid or expired token".into()))
}

/// Resolve an author id for submission routes. An absent or invalid token
/// demotes to anonymous rather than failing the request.
pub async fn optional_user<V: TokenVerifier>(
  verifier: &V,
  headers: &HeaderMap,
) -> Option<String> {
  let token = bearer_token(headers)?;
  verifier.verify(token).await
}
