//! HTTP surface for the Tendril story platform.
//!
//! Exposes an axum [`Router`] over any [`tendril_core::store::StoryStore`]
//! backend: bearer-token moderation endpoints and form-encoded submission
//! endpoints, wired so each accepted submission or rating runs the engine
//! pipeline and republishes the affected artifacts before the response is
//! sent. Transport concerns (TLS, CDN) are the deployment's business.

pub mod auth;
pub mod error;
pub mod handlers;

use std::{collections::HashMap, path::PathBuf, sync::Arc};

use axum::{
  extract::DefaultBodyLimit,
  routing::{get, post},
  Router,
};
use serde::Deserialize;
use tendril_core::store::StoryStore;
use tendril_engine::Engine;
use tendril_publish::{ArtifactStore, Publisher};

use auth::TokenVerifier;

pub use error::ApiError;

/// Submissions are form posts from readers; 20 KB is plenty for a page of
/// story text and four options.
pub const SUBMISSION_BODY_LIMIT: usize = 20 * 1024;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and the
/// `TENDRIL_*` environment.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  pub host:         String,
  pub port:         u16,
  pub store_path:   PathBuf,
  /// Root of the public artifact tree the static server/CDN origin serves.
  pub artifact_dir: PathBuf,
  pub site_title:   String,
  pub cdn_host:     Option<String>,
  /// Bearer token -> moderator id table for the static verifier.
  #[serde(default)]
  pub moderator_tokens: HashMap<String, String>,
}

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers. Built once at process
/// start; nothing global, nothing lazily initialised.
pub struct AppState<S, A, V> {
  pub engine:    Engine<S>,
  pub publisher: Arc<Publisher<S, A>>,
  pub verifier:  Arc<V>,
}

impl<S: Clone, A, V> Clone for AppState<S, A, V> {
  fn clone(&self) -> Self {
    Self {
      engine:    self.engine.clone(),
      publisher: Arc::clone(&self.publisher),
      verifier:  Arc::clone(&self.verifier),
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the full router for `state`.
pub fn router<S, A, V>(state: AppState<S, A, V>) -> Router
where
  S: StoryStore + Clone + Send + Sync + 'static,
  A: ArtifactStore + Send + Sync + 'static,
  V: TokenVerifier + Send + Sync + 'static,
{
  Router::new()
    .route("/moderation/assign", post(handlers::moderation::assign::<S, A, V>))
    .route(
      "/moderation/variant",
      get(handlers::moderation::current_variant::<S, A, V>),
    )
    .route("/moderation/rating", post(handlers::moderation::rate::<S, A, V>))
    .route("/moderation/report", post(handlers::moderation::report::<S, A, V>))
    .route("/submit/story", post(handlers::submit::story::<S, A, V>))
    .route("/submit/page", post(handlers::submit::page::<S, A, V>))
    .layer(DefaultBodyLimit::max(SUBMISSION_BODY_LIMIT))
    .with_state(state)
}

// ─── Integration tests ───────────────────────────────────────────────────────
