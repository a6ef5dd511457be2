//! Rating recording and aggregation.
//!
//! `record_rating` is triggered by the HTTP rating submission;
//! `apply_rating` by the rating document's creation. Keeping them separate
//! mirrors the event-driven original and keeps each idempotent concern
//! testable on its own; [`Engine::submit_rating`] chains them for call
//! sites that own the whole flow.

use chrono::Utc;
use tendril_core::{
  moderation::ModerationRating,
  store::{RatingOutcome, StoryStore},
};
use uuid::Uuid;

use crate::{Engine, Result};

impl<S: StoryStore> Engine<S> {
  /// Append a rating against the moderator's open assignment and clear
  /// the assignment. Returns `None` when the moderator has no open job.
  pub async fn record_rating(
    &self,
    moderator_id: &str,
    is_approved: bool,
  ) -> Result<Option<ModerationRating>> {
    let assignment = self.store().get_assignment(moderator_id).await?;
    let Some(variant_id) = assignment.and_then(|a| a.variant_id) else {
      return Ok(None);
    };

    let rating = ModerationRating {
      rating_id: Uuid::new_v4(),
      moderator_id: moderator_id.to_owned(),
      variant_id,
      is_approved,
      rated_at: Utc::now(),
    };
    self.store().record_rating(rating.clone()).await?;
    tracing::info!(
      moderator = moderator_id,
      variant = %variant_id,
      is_approved,
      "moderation rating recorded"
    );

    Ok(Some(rating))
  }

  /// Fold a rating into its variant's visibility aggregate. Returns the
  /// before/after states for the publisher, or `None` when the variant no
  /// longer exists.
  pub async fn apply_rating(
    &self,
    variant_id: Uuid,
    is_approved: bool,
  ) -> Result<Option<RatingOutcome>> {
    Ok(self.store().apply_rating(variant_id, is_approved).await?)
  }

  /// The full flow behind `POST /moderation/rating`: record, then fold.
  pub async fn submit_rating(
    &self,
    moderator_id: &str,
    is_approved: bool,
  ) -> Result<Option<RatingOutcome>> {
    let Some(rating) = self.record_rating(moderator_id, is_approved).await?
    else {
      return Ok(None);
    };
    self.apply_rating(rating.variant_id, is_approved).await
  }
}

#[cfg(test)]
mod tests {
  use tendril_core::store::StoryStore;
  use tendril_store_sqlite::SqliteStore;

  use crate::testing::{engine_with_draws, seed_story};

  #[tokio::test]
  async fn rating_without_a_job_is_none() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let engine = engine_with_draws(store, vec![], 0.5);
    assert!(engine.submit_rating("mod-1", true).await.unwrap().is_none());
  }

  #[tokio::test]
  async fn submit_rating_folds_and_clears_the_assignment() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let tree = seed_story(&store, 1).await;
    store
      .set_assignment("mod-1", tree.variant.variant_id)
      .await
      .unwrap();

    let engine = engine_with_draws(store, vec![], 0.5);
    let outcome = engine
      .submit_rating("mod-1", false)
      .await
      .unwrap()
      .unwrap();

    assert_eq!(outcome.before.visibility, 1.0);
    assert_eq!(outcome.after.visibility, 0.0);
    assert_eq!(outcome.after.moderation_rating_count, 1);

    // Assignment cleared: a second submission has no job.
    assert!(engine.submit_rating("mod-1", true).await.unwrap().is_none());

    // The counter and the rating documents converge.
    let ratings = engine
      .store()
      .list_variant_ratings(tree.variant.variant_id)
      .await
      .unwrap();
    assert_eq!(ratings.len() as u32, outcome.after.moderation_rating_count);
  }

  #[tokio::test]
  async fn ratings_from_two_moderators_both_land() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let tree = seed_story(&store, 1).await;
    store
      .set_assignment("mod-1", tree.variant.variant_id)
      .await
      .unwrap();
    store
      .set_assignment("mod-2", tree.variant.variant_id)
      .await
      .unwrap();

    let engine = engine_with_draws(store, vec![], 0.5);
    engine.submit_rating("mod-1", true).await.unwrap().unwrap();
    let outcome = engine.submit_rating("mod-2", false).await.unwrap().unwrap();

    assert_eq!(outcome.after.moderation_rating_count, 2);
    assert!((outcome.after.visibility - 0.5).abs() < 1e-9);
  }
}
