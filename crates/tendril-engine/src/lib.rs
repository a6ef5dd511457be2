//! The Tendril pipeline engine.
//!
//! Every mutation in the system is triggered by an external event — a form
//! submission landing, a rating document appearing — and those triggers are
//! delivered at least once, concurrently. This crate models each trigger
//! handler as an explicit idempotent operation over a
//! [`tendril_core::store::StoryStore`]:
//!
//! - submission processing (the graph mutator, with page-number
//!   allocation), in [`mutate`] and [`allocate`];
//! - moderation job assignment, in [`assign`];
//! - rating recording and aggregation, in [`rate`].
//!
//! Handlers can therefore be driven directly by tests, with no live
//! trigger runtime.

use std::sync::Arc;

use tendril_core::{random::RandomSource, store::StoryStore};

pub mod allocate;
pub mod assign;
pub mod error;
pub mod mutate;
pub mod rate;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Error, Result};

/// The engine: a store plus the injected random source. Built once at
/// process start and shared by reference; there is no global state.
#[derive(Clone)]
pub struct Engine<S> {
  store:  S,
  random: Arc<dyn RandomSource>,
}

impl<S: StoryStore> Engine<S> {
  pub fn new(store: S, random: Arc<dyn RandomSource>) -> Self {
    Self { store, random }
  }

  pub fn store(&self) -> &S {
    &self.store
  }

  pub(crate) fn draw(&self) -> f64 {
    self.random.draw()
  }
}
