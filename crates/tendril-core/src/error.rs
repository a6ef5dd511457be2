//! Error types for `tendril-core`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  /// A concurrent writer created a page with the same number first.
  /// Callers re-enter the allocation loop on this error.
  #[error("page number {0} is already taken")]
  PageNumberTaken(u64),

  /// The submission was already processed by an earlier delivery.
  #[error("submission {0} is already processed")]
  SubmissionProcessed(Uuid),

  /// A concurrent writer linked the option to a target page first.
  #[error("option {0} is already linked to a target page")]
  OptionAlreadyLinked(Uuid),

  #[error("submission not found: {0}")]
  SubmissionNotFound(Uuid),

  #[error("page not found: {0}")]
  PageNotFound(Uuid),

  #[error("variant not found: {0}")]
  VariantNotFound(Uuid),

  #[error("option not found: {0}")]
  OptionNotFound(Uuid),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  /// Any other failure raised by a storage backend.
  #[error("store error: {0}")]
  Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Wrap an arbitrary backend failure.
  pub fn backend<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Error::Backend(Box::new(err))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
