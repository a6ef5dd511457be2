//! Test doubles and fixtures shared by the engine's unit tests.

use std::{
  collections::VecDeque,
  sync::{Arc, Mutex},
};

use chrono::Utc;
use tendril_core::{
  random::RandomSource,
  store::{NewStoryTree, StoryStore, StoryTree},
  submission::{PageSubmission, StorySubmission},
};
use tendril_store_sqlite::SqliteStore;
use uuid::Uuid;

use crate::Engine;

/// A random source that replays a scripted prefix, then repeats a
/// fallback value forever.
pub struct ScriptedSource {
  values:   Mutex<VecDeque<f64>>,
  fallback: f64,
}

impl ScriptedSource {
  pub fn new(values: Vec<f64>, fallback: f64) -> Self {
    Self { values: Mutex::new(values.into()), fallback }
  }
}

impl RandomSource for ScriptedSource {
  fn draw(&self) -> f64 {
    self
      .values
      .lock()
      .expect("scripted source lock")
      .pop_front()
      .unwrap_or(self.fallback)
  }
}

pub fn engine_with_draws(
  store: SqliteStore,
  values: Vec<f64>,
  fallback: f64,
) -> Engine<SqliteStore> {
  Engine::new(store, Arc::new(ScriptedSource::new(values, fallback)))
}

pub fn story_submission(options: &[&str]) -> StorySubmission {
  StorySubmission {
    submission_id: Uuid::new_v4(),
    title:         "T".into(),
    content:       "C".into(),
    author_name:   "???".into(),
    author_id:     None,
    options:       options.iter().map(|s| s.to_string()).collect(),
    processed:     false,
    created_at:    Utc::now(),
  }
}

pub fn page_submission(
  incoming: Option<&str>,
  page_number: Option<u64>,
) -> PageSubmission {
  PageSubmission {
    submission_id: Uuid::new_v4(),
    incoming_option: incoming.map(str::to_owned),
    page_number,
    content: "Continuation".into(),
    author_name: "???".into(),
    author_id: None,
    options: vec!["Onward".into()],
    processed: false,
    created_at: Utc::now(),
  }
}

/// Save a story submission and materialise its tree at `number`, straight
/// through the store.
pub async fn seed_story(store: &SqliteStore, number: u64) -> StoryTree {
  let submission = story_submission(&["O1", "O2"]);
  store
    .save_story_submission(submission.clone())
    .await
    .unwrap();
  store
    .create_story_tree(NewStoryTree {
      submission_id: submission.submission_id,
      title:         submission.title,
      content:       submission.content,
      author_name:   submission.author_name,
      author_id:     None,
      options:       submission.options,
      page_number:   number,
      rand_key:      0.5,
    })
    .await
    .unwrap()
}
