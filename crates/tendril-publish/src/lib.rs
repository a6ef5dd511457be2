//! The publisher: renders visible variants to static HTML artifacts.
//!
//! Driven by explicit [`VariantChange`] values — every create, update, or
//! delete of a variant record flows through
//! [`Publisher::handle_variant_write`]. Rendering itself is a pure
//! function of its inputs ([`html`]), so redundant delivery re-renders to
//! byte-identical output and no locking is needed.

#![allow(async_fn_in_trait)]

pub mod artifact;
pub mod html;
pub mod publisher;

use thiserror::Error;

pub use artifact::{ArtifactStore, FsArtifactStore, MemoryArtifactStore};
pub use publisher::{
  CacheInvalidator, Publisher, SiteConfig, VariantChange, VISIBILITY_THRESHOLD,
};

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Store(#[from] tendril_core::Error),

  #[error("artifact i/o error: {0}")]
  Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
