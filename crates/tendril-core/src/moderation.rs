//! Moderation types and the rating-fold arithmetic.
//!
//! Ratings are append-only; the variant carries a cached aggregate
//! (`visibility`, `moderation_rating_count`, `moderator_reputation_sum`)
//! that the store recomputes incrementally with [`fold_rating`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Records ─────────────────────────────────────────────────────────────────

/// A moderator's assignment row. A non-null `variant_id` means the
/// moderator has an open job; a moderator has at most one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeratorAssignment {
  pub moderator_id: String,
  pub variant_id:   Option<Uuid>,
  pub assigned_at:  DateTime<Utc>,
}

/// An approve/reject verdict on a variant. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationRating {
  pub rating_id:    Uuid,
  pub moderator_id: String,
  pub variant_id:   Uuid,
  pub is_approved:  bool,
  pub rated_at:     DateTime<Utc>,
}

/// A reader's flag on a variant, by public slug. Append-only; no further
/// processing is modelled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationReport {
  pub report_id:    Uuid,
  pub variant_slug: String,
  pub created_at:   DateTime<Utc>,
}

// ─── Rating fold ─────────────────────────────────────────────────────────────

/// The moderation aggregate carried on a variant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VariantStats {
  pub visibility:     f64,
  pub rating_count:   u32,
  pub reputation_sum: f64,
}

impl VariantStats {
  /// The state of a freshly created variant: visible, unrated.
  pub fn initial() -> Self {
    Self { visibility: 1.0, rating_count: 0, reputation_sum: 0.0 }
  }
}

/// Fold one rating into a variant's aggregate.
///
/// A reputation-weighted running average: each moderator currently
/// contributes weight 1, so `reputation_sum` tracks `rating_count` exactly.
/// The field is kept separate so a future non-uniform weighting can change
/// the contribution without changing the shape of this formula.
///
/// Order-independent up to floating point: the result depends only on the
/// accumulated sums, never on arrival order.
pub fn fold_rating(stats: VariantStats, is_approved: bool) -> VariantStats {
  let new_rating = if is_approved { 1.0 } else { 0.0 };

  let numerator = stats.visibility * stats.reputation_sum + new_rating;
  let denominator = f64::from(stats.rating_count) + 1.0;

  let visibility = if denominator == 0.0 {
    0.0
  } else {
    numerator / denominator
  };

  VariantStats {
    visibility,
    rating_count:   stats.rating_count + 1,
    reputation_sum: stats.reputation_sum + 1.0,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn approve_approve_reject_sequence() {
    let mut stats = VariantStats::initial();

    stats = fold_rating(stats, true);
    assert_eq!(stats.visibility, 1.0);
    assert_eq!(stats.rating_count, 1);
    assert_eq!(stats.reputation_sum, 1.0);

    stats = fold_rating(stats, true);
    assert_eq!(stats.visibility, 1.0);
    assert_eq!(stats.rating_count, 2);

    stats = fold_rating(stats, false);
    assert!((stats.visibility - 2.0 / 3.0).abs() < 1e-9);
    assert_eq!(stats.rating_count, 3);
    assert_eq!(stats.reputation_sum, 3.0);
  }

  #[test]
  fn single_reject_zeroes_visibility() {
    let stats = fold_rating(VariantStats::initial(), false);
    assert_eq!(stats.visibility, 0.0);
    assert_eq!(stats.rating_count, 1);
  }

  #[test]
  fn fold_is_order_independent() {
    let ratings = [true, false, true, true, false];

    let forward = ratings
      .iter()
      .fold(VariantStats::initial(), |s, &r| fold_rating(s, r));
    let reverse = ratings
      .iter()
      .rev()
      .fold(VariantStats::initial(), |s, &r| fold_rating(s, r));

    assert_eq!(forward.rating_count, reverse.rating_count);
    assert_eq!(forward.reputation_sum, reverse.reputation_sum);
    assert!((forward.visibility - reverse.visibility).abs() < 1e-9);
  }

  #[test]
  fn reputation_sum_tracks_rating_count() {
    let mut stats = VariantStats::initial();
    for approved in [true, false, false, true] {
      stats = fold_rating(stats, approved);
      assert_eq!(stats.reputation_sum, f64::from(stats.rating_count));
    }
  }
}
