//! Error type for `tendril-engine`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The allocation loop ran out of attempts. Fatal: surfaced to the
  /// operator rather than retried.
  #[error("page number allocation exhausted after {attempts} attempts")]
  PageNumbersExhausted { attempts: u32 },

  #[error(transparent)]
  Store(#[from] tendril_core::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
