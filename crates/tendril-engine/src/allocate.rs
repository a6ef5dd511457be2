//! Page-number allocation with exponential-range retry.
//!
//! Early pages get small, memorable addresses while the search range
//! doubles on every collision, which bounds the expected number of retries
//! independent of corpus size — no full index scan, no monotonic counter
//! serializing all writers. The probe alone cannot close the race between
//! two allocators landing on the same candidate; the store's conditional
//! create does, and callers re-enter this loop when they lose it.

use tendril_core::store::StoryStore;

use crate::{Engine, Error, Result};

/// Hard cap on allocation probes. Exhaustion is a fatal, typed error.
pub const MAX_ALLOCATION_ATTEMPTS: u32 = 64;

/// Candidate for attempt `depth`: uniform over `[1, 2^depth]`.
pub(crate) fn candidate_number(draw: f64, depth: u32) -> u64 {
  let max = 1u64 << depth.min(62);
  (draw * max as f64) as u64 + 1
}

impl<S: StoryStore> Engine<S> {
  /// Find a page number no existing page uses.
  ///
  /// The returned number is only a reservation attempt: the creating
  /// transaction re-checks it and fails with
  /// [`tendril_core::Error::PageNumberTaken`] if a concurrent writer got
  /// there first.
  pub async fn allocate_page_number(&self) -> Result<u64> {
    for depth in 0..MAX_ALLOCATION_ATTEMPTS {
      let candidate = candidate_number(self.draw(), depth);
      if !self.store().page_number_exists(candidate).await? {
        return Ok(candidate);
      }
    }

    Err(Error::PageNumbersExhausted { attempts: MAX_ALLOCATION_ATTEMPTS })
  }
}

#[cfg(test)]
mod tests {
  use tendril_store_sqlite::SqliteStore;

  use super::*;
  use crate::testing::{engine_with_draws, seed_story};

  #[test]
  fn candidate_range_follows_depth() {
    assert_eq!(candidate_number(0.0, 0), 1);
    assert_eq!(candidate_number(0.999, 0), 1);
    assert_eq!(candidate_number(0.0, 3), 1);
    assert_eq!(candidate_number(0.999, 3), 8);
    assert_eq!(candidate_number(0.5, 4), 9);
  }

  #[tokio::test]
  async fn allocates_first_free_number() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    for number in 1..=4 {
      seed_story(&store, number).await;
    }

    // 0.9 walks the widening ranges: 1 (taken), 2 (taken), 4 (taken),
    // then floor(0.9 * 8) + 1 = 8, which is free.
    let engine = engine_with_draws(store, vec![], 0.9);
    assert_eq!(engine.allocate_page_number().await.unwrap(), 8);
  }

  #[tokio::test]
  async fn never_returns_a_taken_number() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    for number in 1..=7 {
      seed_story(&store, number).await;
    }

    let engine = engine_with_draws(store, vec![], 0.6);
    for _ in 0..10 {
      let number = engine.allocate_page_number().await.unwrap();
      assert!(number >= 1);
      assert!(
        !engine.store().page_number_exists(number).await.unwrap(),
        "allocator returned taken number {number}"
      );
    }
  }

  #[tokio::test]
  async fn exhaustion_is_a_typed_error() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    seed_story(&store, 1).await;

    // Every draw of 0.0 proposes candidate 1, which is always taken.
    let engine = engine_with_draws(store, vec![], 0.0);
    let result = engine.allocate_page_number().await;
    assert!(matches!(
      result,
      Err(Error::PageNumbersExhausted { attempts: MAX_ALLOCATION_ATTEMPTS })
    ));
  }
}
