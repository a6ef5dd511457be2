//! The public object-store boundary.
//!
//! The publisher writes and deletes `text/html` blobs keyed by
//! deterministic paths. Deletes are idempotent: a missing artifact is a
//! no-op, never an error, so hide-and-retry under at-least-once delivery
//! is safe.

use std::{
  collections::HashMap,
  future::Future,
  path::PathBuf,
  sync::{Arc, Mutex},
};

use crate::Result;

/// Abstraction over the public artifact store.
pub trait ArtifactStore: Send + Sync {
  /// Persist an HTML document at `path`, replacing any previous content.
  fn save_html<'a>(
    &'a self,
    path: &'a str,
    contents: &'a str,
  ) -> impl Future<Output = Result<()>> + Send + 'a;

  /// Remove the artifact at `path`. Missing artifacts are a no-op.
  fn delete<'a>(
    &'a self,
    path: &'a str,
  ) -> impl Future<Output = Result<()>> + Send + 'a;

  /// Fetch an artifact's contents, if present.
  fn get<'a>(
    &'a self,
    path: &'a str,
  ) -> impl Future<Output = Result<Option<String>>> + Send + 'a;
}

// ─── Filesystem backend ──────────────────────────────────────────────────────

/// Artifacts as plain files under a root directory — the serving tree a
/// static web server or CDN origin points at.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
  root: PathBuf,
}

impl FsArtifactStore {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  fn resolve(&self, path: &str) -> PathBuf {
    self.root.join(path)
  }
}

impl ArtifactStore for FsArtifactStore {
  async fn save_html<'a>(&'a self, path: &'a str, contents: &'a str) -> Result<()> {
    let full = self.resolve(path);
    if let Some(parent) = full.parent() {
      tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&full, contents).await?;
    Ok(())
  }

  async fn delete<'a>(&'a self, path: &'a str) -> Result<()> {
    match tokio::fs::remove_file(self.resolve(path)).await {
      Ok(()) => Ok(()),
      Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
      Err(err) => Err(err.into()),
    }
  }

  async fn get<'a>(&'a self, path: &'a str) -> Result<Option<String>> {
    match tokio::fs::read_to_string(self.resolve(path)).await {
      Ok(contents) => Ok(Some(contents)),
      Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
      Err(err) => Err(err.into()),
    }
  }
}

// ─── In-memory backend ───────────────────────────────────────────────────────

/// A map-backed store — useful for testing.
#[derive(Debug, Clone, Default)]
pub struct MemoryArtifactStore {
  files: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryArtifactStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// All stored paths, sorted. Test convenience.
  pub fn paths(&self) -> Vec<String> {
    let mut paths: Vec<String> =
      self.files.lock().expect("artifact lock").keys().cloned().collect();
    paths.sort();
    paths
  }
}

impl ArtifactStore for MemoryArtifactStore {
  async fn save_html<'a>(&'a self, path: &'a str, contents: &'a str) -> Result<()> {
    self
      .files
      .lock()
      .expect("artifact lock")
      .insert(path.to_owned(), contents.to_owned());
    Ok(())
  }

  async fn delete<'a>(&'a self, path: &'a str) -> Result<()> {
    self.files.lock().expect("artifact lock").remove(path);
    Ok(())
  }

  async fn get<'a>(&'a self, path: &'a str) -> Result<Option<String>> {
    Ok(self.files.lock().expect("artifact lock").get(path).cloned())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn memory_store_roundtrip() {
    let store = MemoryArtifactStore::new();
    store.save_html("p/1a.html", "<html>").await.unwrap();
    assert_eq!(store.get("p/1a.html").await.unwrap().as_deref(), Some("<html>"));

    store.delete("p/1a.html").await.unwrap();
    assert_eq!(store.get("p/1a.html").await.unwrap(), None);
  }

  #[tokio::test]
  async fn deleting_a_missing_artifact_is_a_noop() {
    let store = MemoryArtifactStore::new();
    store.delete("p/404z.html").await.unwrap();
  }
}
