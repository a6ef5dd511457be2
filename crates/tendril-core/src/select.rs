//! Weighted proportional choice.
//!
//! Used by the moderation assigner's candidate discovery and by the
//! reader-facing variant redirect. The selector is pure: the caller supplies
//! the uniform draw (see [`crate::random::RandomSource`]), which keeps every
//! path through this function reachable from a unit test.

/// Pick a label proportionally to its weight.
///
/// Non-finite and non-positive weights are ignored. Returns `None` when no
/// valid weight remains. `draw` must be uniform in `[0, 1)`; the running
/// threshold `draw * total` is walked down the pairs in input order and the
/// first pair that drives it to zero or below wins. If floating-point
/// rounding lets the loop fall through, the last valid label is returned,
/// so the result is never `None` when at least one valid pair exists.
pub fn select_weighted<'a, L>(pairs: &'a [(L, f64)], draw: f64) -> Option<&'a L> {
  let total: f64 = pairs
    .iter()
    .map(|(_, w)| *w)
    .filter(|w| w.is_finite() && *w > 0.0)
    .sum();

  if total <= 0.0 {
    return None;
  }

  let mut threshold = draw * total;
  let mut last_valid = None;

  for (label, weight) in pairs {
    if !weight.is_finite() || *weight <= 0.0 {
      continue;
    }
    last_valid = Some(label);
    threshold -= weight;
    if threshold <= 0.0 {
      return Some(label);
    }
  }

  last_valid
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn threshold_walk_picks_proportionally() {
    // total = 4, threshold = 0.9 * 4 = 3.6; a leaves 2.6, b drives it to 0.
    let pairs = [("a", 1.0), ("b", 3.0)];
    assert_eq!(select_weighted(&pairs, 0.9), Some(&"b"));
  }

  #[test]
  fn low_draw_picks_first() {
    let pairs = [("a", 1.0), ("b", 3.0)];
    assert_eq!(select_weighted(&pairs, 0.0), Some(&"a"));
    assert_eq!(select_weighted(&pairs, 0.2), Some(&"a"));
  }

  #[test]
  fn none_when_all_weights_invalid() {
    let pairs = [("a", 0.0), ("b", -1.0), ("c", f64::NAN), ("d", f64::INFINITY)];
    // Infinity is non-finite and filtered too.
    assert_eq!(select_weighted(&pairs, 0.5), None);
    assert_eq!(select_weighted::<&str>(&[], 0.5), None);
  }

  #[test]
  fn invalid_weights_are_skipped_not_counted() {
    let pairs = [("bad", f64::NAN), ("good", 2.0)];
    assert_eq!(select_weighted(&pairs, 0.99), Some(&"good"));
  }

  #[test]
  fn fallback_returns_last_valid_label() {
    // draw = 1.0 is outside the contract but exercises the rounding
    // fallback: the threshold never quite reaches zero.
    let pairs = [("a", 0.1), ("b", 0.2)];
    assert_eq!(select_weighted(&pairs, 1.0), Some(&"b"));
  }

  #[test]
  fn frequencies_converge_to_weight_share() {
    // Deterministic LCG stands in for the caller's random source.
    let mut state: u64 = 0x2545_F491_4F6C_DD1D;
    let mut lcg = move || {
      state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
      (state >> 11) as f64 / (1u64 << 53) as f64
    };

    let pairs = [("a", 1.0), ("b", 3.0)];
    let mut hits_b = 0u32;
    let rounds = 10_000;
    for _ in 0..rounds {
      if select_weighted(&pairs, lcg()) == Some(&"b") {
        hits_b += 1;
      }
    }

    // b should win about 75% of the time; allow a generous band.
    let share = f64::from(hits_b) / f64::from(rounds);
    assert!((share - 0.75).abs() < 0.02, "share was {share}");
  }
}
