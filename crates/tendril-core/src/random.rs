//! Uniform randomness as an injected capability.
//!
//! Production code draws from the operating system CSPRNG; tests inject a
//! scripted source so every random-dependent code path is deterministic.

use rand_core::{OsRng, RngCore as _};

/// A source of uniform draws in `[0, 1)`.
pub trait RandomSource: Send + Sync {
  fn draw(&self) -> f64;
}

/// Cryptographically strong source backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandomSource;

impl RandomSource for OsRandomSource {
  fn draw(&self) -> f64 {
    let mut rng = OsRng;
    // 53 random bits, the full precision of an f64 mantissa.
    (rng.next_u64() >> 11) as f64 / (1u64 << 53) as f64
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn os_source_stays_in_unit_interval() {
    let source = OsRandomSource;
    for _ in 0..1_000 {
      let value = source.draw();
      assert!((0.0..1.0).contains(&value), "draw out of range: {value}");
    }
  }
}
