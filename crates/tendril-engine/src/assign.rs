//! Moderation job assignment.
//!
//! Candidate discovery is a two-sided range scan around a random pivot on
//! the variants' `rand_key` column: it approximates uniform sampling over
//! an append-only collection without a full table scan, and prefers
//! content nobody has rated yet. Variants are not locked — two moderators
//! may legitimately hold the same variant before any rating lands, since
//! ratings are append-only and aggregation is commutative.

use tendril_core::{
  graph::Variant,
  store::{CandidateQuery, PivotSide, StoryStore},
};

use crate::{Engine, Result};

/// The strict evaluation order: zero-rated at-or-above the pivot,
/// zero-rated below, any at-or-above, any below.
pub fn candidate_plan(pivot: f64) -> [CandidateQuery; 4] {
  [
    CandidateQuery { zero_rated_only: true, side: PivotSide::AtOrAbove, pivot },
    CandidateQuery { zero_rated_only: true, side: PivotSide::Below, pivot },
    CandidateQuery { zero_rated_only: false, side: PivotSide::AtOrAbove, pivot },
    CandidateQuery { zero_rated_only: false, side: PivotSide::Below, pivot },
  ]
}

impl<S: StoryStore> Engine<S> {
  /// Find a variant for `moderator_id` to rate and record the assignment.
  ///
  /// Returns the assigned variant, or `None` when the corpus has no
  /// candidate at all (in which case nothing is written).
  pub async fn assign_job(&self, moderator_id: &str) -> Result<Option<Variant>> {
    let pivot = self.draw();

    for query in candidate_plan(pivot) {
      let Some(variant) = self.store().next_moderation_candidate(query).await?
      else {
        continue;
      };

      self
        .store()
        .set_assignment(moderator_id, variant.variant_id)
        .await?;
      tracing::info!(
        moderator = moderator_id,
        variant = %variant.variant_id,
        zero_rated = query.zero_rated_only,
        "moderation job assigned"
      );
      return Ok(Some(variant));
    }

    Ok(None)
  }
}

#[cfg(test)]
mod tests {
  use tendril_core::store::StoryStore;
  use tendril_store_sqlite::SqliteStore;

  use super::*;
  use crate::testing::{engine_with_draws, seed_story};

  #[test]
  fn plan_order_is_zero_rated_first() {
    let plan = candidate_plan(0.4);
    assert!(plan[0].zero_rated_only && plan[0].side == PivotSide::AtOrAbove);
    assert!(plan[1].zero_rated_only && plan[1].side == PivotSide::Below);
    assert!(!plan[2].zero_rated_only && plan[2].side == PivotSide::AtOrAbove);
    assert!(!plan[3].zero_rated_only && plan[3].side == PivotSide::Below);
  }

  #[tokio::test]
  async fn empty_corpus_assigns_nothing() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let engine = engine_with_draws(store, vec![], 0.5);

    assert!(engine.assign_job("mod-1").await.unwrap().is_none());
    assert!(engine.store().get_assignment("mod-1").await.unwrap().is_none());
  }

  #[tokio::test]
  async fn prefers_zero_rated_variants() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let rated = seed_story(&store, 1).await;
    let unrated = seed_story(&store, 2).await;
    store
      .apply_rating(rated.variant.variant_id, true)
      .await
      .unwrap();

    // Pivot 0.9 lands above both rand keys (0.5), so the first plan step
    // misses and the second (zero-rated, below) finds the unrated one.
    let engine = engine_with_draws(store, vec![0.9], 0.5);
    let assigned = engine.assign_job("mod-1").await.unwrap().unwrap();
    assert_eq!(assigned.variant_id, unrated.variant.variant_id);

    let assignment = engine
      .store()
      .get_assignment("mod-1")
      .await
      .unwrap()
      .unwrap();
    assert_eq!(assignment.variant_id, Some(unrated.variant.variant_id));
  }

  #[tokio::test]
  async fn falls_back_to_rated_variants() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let only = seed_story(&store, 1).await;
    store
      .apply_rating(only.variant.variant_id, true)
      .await
      .unwrap();

    let engine = engine_with_draws(store, vec![0.2], 0.5);
    let assigned = engine.assign_job("mod-1").await.unwrap().unwrap();
    assert_eq!(assigned.variant_id, only.variant.variant_id);
  }

  #[tokio::test]
  async fn double_assignment_of_one_variant_is_accepted() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let only = seed_story(&store, 1).await;

    let engine = engine_with_draws(store, vec![], 0.2);
    let first = engine.assign_job("mod-1").await.unwrap().unwrap();
    let second = engine.assign_job("mod-2").await.unwrap().unwrap();
    assert_eq!(first.variant_id, only.variant.variant_id);
    assert_eq!(second.variant_id, only.variant.variant_id);
  }
}
