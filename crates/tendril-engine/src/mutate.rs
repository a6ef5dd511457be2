//! The graph mutator: turning accepted submissions into story documents.
//!
//! Both handlers are idempotent under redelivery: the submission's
//! `processed` flag is checked up front and again inside the creating
//! transaction, so a retriggered invocation on an already-processed record
//! is a no-op. Malformed or dangling references mark the submission
//! processed with no graph mutation — the client has no further recourse,
//! so retrying would never help.

use tendril_core::{
  store::{NewPageTree, NewPageVariant, NewStoryTree, PageTree, StoryStore, StoryTree},
  submission::{IncomingOptionRef, PageSubmission},
  Error as StoreError,
};
use uuid::Uuid;

use crate::{allocate::MAX_ALLOCATION_ATTEMPTS, Engine, Error, Result};

impl<S: StoryStore> Engine<S> {
  /// Process a new-story submission: allocate a page number and create the
  /// story, root page, initial variant, and options in one atomic batch.
  ///
  /// Returns `None` when the submission was already processed.
  pub async fn process_story_submission(
    &self,
    submission_id: Uuid,
  ) -> Result<Option<StoryTree>> {
    let Some(submission) =
      self.store().get_story_submission(submission_id).await?
    else {
      return Err(StoreError::SubmissionNotFound(submission_id).into());
    };
    if submission.processed {
      return Ok(None);
    }

    for _ in 0..MAX_ALLOCATION_ATTEMPTS {
      let page_number = self.allocate_page_number().await?;
      let attempt = self
        .store()
        .create_story_tree(NewStoryTree {
          submission_id,
          title: submission.title.clone(),
          content: submission.content.clone(),
          author_name: submission.author_name.clone(),
          author_id: submission.author_id.clone(),
          options: submission.options.clone(),
          page_number,
          rand_key: self.draw(),
        })
        .await;

      match attempt {
        Ok(tree) => {
          tracing::info!(
            story = %tree.story.story_id,
            page = tree.page.number,
            "story created"
          );
          return Ok(Some(tree));
        }
        Err(StoreError::PageNumberTaken(number)) => {
          tracing::debug!(number, "page number lost a race, re-allocating");
        }
        Err(StoreError::SubmissionProcessed(_)) => return Ok(None),
        Err(err) => return Err(err.into()),
      }
    }

    Err(Error::PageNumbersExhausted { attempts: MAX_ALLOCATION_ATTEMPTS })
  }

  /// Process a continuation submission: resolve its target (incoming
  /// option or direct page number) and add the new page/variant.
  ///
  /// Returns `None` when the submission was already processed or was
  /// dropped as unresolvable.
  pub async fn process_page_submission(
    &self,
    submission_id: Uuid,
  ) -> Result<Option<PageTree>> {
    let Some(submission) =
      self.store().get_page_submission(submission_id).await?
    else {
      return Err(StoreError::SubmissionNotFound(submission_id).into());
    };
    if submission.processed {
      return Ok(None);
    }

    if let Some(raw) = submission.incoming_option.clone() {
      self.process_via_incoming_option(&submission, &raw).await
    } else if let Some(number) = submission.page_number {
      self.process_via_page_number(&submission, number).await
    } else {
      // Not enough context to do anything; the HTTP layer rejects this
      // shape, but redelivered legacy records still need the fence.
      self.drop_page_submission(&submission, "no target").await
    }
  }

  async fn process_via_incoming_option(
    &self,
    submission: &PageSubmission,
    raw: &str,
  ) -> Result<Option<PageTree>> {
    let Some(parsed) = IncomingOptionRef::parse(raw) else {
      return self.drop_page_submission(submission, "malformed option").await;
    };

    let Some(page) =
      self.store().find_page_by_number(parsed.page_number).await?
    else {
      return self.drop_page_submission(submission, "unknown page").await;
    };
    let Some(variant) = self
      .store()
      .find_variant_by_name(page.page_id, &parsed.variant_name)
      .await?
    else {
      return self.drop_page_submission(submission, "unknown variant").await;
    };
    let Some(option) = self
      .store()
      .find_option_by_position(variant.variant_id, parsed.option_position)
      .await?
    else {
      return self.drop_page_submission(submission, "unknown option").await;
    };

    // A prior submission may already have resolved this option; its
    // target page then gains a competing variant instead of a sibling
    // page.
    if let Some(target_id) = option.target_page_id {
      if self.store().get_page(target_id).await?.is_some() {
        return self.add_variant(submission, target_id).await;
      }
    }

    for _ in 0..MAX_ALLOCATION_ATTEMPTS {
      let page_number = self.allocate_page_number().await?;
      let attempt = self
        .store()
        .create_page_tree(NewPageTree {
          submission_id: submission.submission_id,
          story_id: page.story_id,
          incoming_option_id: option.option_id,
          page_number,
          content: submission.content.clone(),
          author_name: submission.author_name.clone(),
          author_id: submission.author_id.clone(),
          options: submission.options.clone(),
          rand_key: self.draw(),
        })
        .await;

      match attempt {
        Ok(tree) => {
          tracing::info!(page = tree.page.number, "page created");
          return Ok(Some(tree));
        }
        Err(StoreError::PageNumberTaken(number)) => {
          tracing::debug!(number, "page number lost a race, re-allocating");
        }
        // A concurrent submission linked the option while we allocated:
        // fall back to adding a variant on whatever it linked.
        Err(StoreError::OptionAlreadyLinked(_)) => {
          let refreshed = self.store().get_option(option.option_id).await?;
          let Some(target_id) =
            refreshed.and_then(|option| option.target_page_id)
          else {
            return self.drop_page_submission(submission, "option vanished").await;
          };
          return self.add_variant(submission, target_id).await;
        }
        Err(StoreError::SubmissionProcessed(_)) => return Ok(None),
        Err(err) => return Err(err.into()),
      }
    }

    Err(Error::PageNumbersExhausted { attempts: MAX_ALLOCATION_ATTEMPTS })
  }

  async fn process_via_page_number(
    &self,
    submission: &PageSubmission,
    number: u64,
  ) -> Result<Option<PageTree>> {
    let Some(page) = self.store().find_page_by_number(number).await? else {
      return self.drop_page_submission(submission, "unknown page").await;
    };
    self.add_variant(submission, page.page_id).await
  }

  async fn add_variant(
    &self,
    submission: &PageSubmission,
    page_id: Uuid,
  ) -> Result<Option<PageTree>> {
    let attempt = self
      .store()
      .add_page_variant(NewPageVariant {
        submission_id: submission.submission_id,
        page_id,
        content: submission.content.clone(),
        author_name: submission.author_name.clone(),
        author_id: submission.author_id.clone(),
        options: submission.options.clone(),
        rand_key: self.draw(),
      })
      .await;

    match attempt {
      Ok(tree) => {
        tracing::info!(
          page = tree.page.number,
          variant = %tree.variant.name,
          "variant added"
        );
        Ok(Some(tree))
      }
      Err(StoreError::SubmissionProcessed(_)) => Ok(None),
      Err(StoreError::PageNotFound(_)) => {
        self.drop_page_submission(submission, "page vanished").await
      }
      Err(err) => Err(err.into()),
    }
  }

  async fn drop_page_submission(
    &self,
    submission: &PageSubmission,
    reason: &str,
  ) -> Result<Option<PageTree>> {
    tracing::warn!(
      submission = %submission.submission_id,
      reason,
      "dropping page submission"
    );
    self
      .store()
      .mark_page_submission_processed(submission.submission_id)
      .await?;
    Ok(None)
  }
}

#[cfg(test)]
mod tests {
  use tendril_core::store::StoryStore;
  use tendril_store_sqlite::SqliteStore;

  use crate::testing::{
    engine_with_draws, page_submission, seed_story, story_submission,
  };

  #[tokio::test]
  async fn story_submission_materialises_the_full_tree() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let submission = story_submission(&["O1", "O2"]);
    store
      .save_story_submission(submission.clone())
      .await
      .unwrap();

    let engine = engine_with_draws(store, vec![], 0.3);
    let tree = engine
      .process_story_submission(submission.submission_id)
      .await
      .unwrap()
      .unwrap();

    assert_eq!(tree.story.title, "T");
    assert_eq!(tree.page.incoming_option_id, None);
    assert_eq!(tree.variant.name, "a");
    assert_eq!(tree.variant.visibility, 1.0);
    assert_eq!(tree.options.len(), 2);
    assert_eq!(tree.options[0].position, 0);
    assert_eq!(tree.options[1].position, 1);
    assert!(tree.options.iter().all(|o| o.target_page_id.is_none()));
  }

  #[tokio::test]
  async fn reprocessing_creates_zero_additional_documents() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let submission = story_submission(&["O1"]);
    store
      .save_story_submission(submission.clone())
      .await
      .unwrap();

    let engine = engine_with_draws(store, vec![], 0.3);
    let tree = engine
      .process_story_submission(submission.submission_id)
      .await
      .unwrap()
      .unwrap();

    let redelivered = engine
      .process_story_submission(submission.submission_id)
      .await
      .unwrap();
    assert!(redelivered.is_none());
    assert_eq!(
      engine
        .store()
        .story_variant_count(tree.story.story_id)
        .await
        .unwrap(),
      1
    );
  }

  #[tokio::test]
  async fn option_submission_creates_and_links_a_page() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let tree = seed_story(&store, 1).await;

    let submission = page_submission(Some("1-a-0"), None);
    store.save_page_submission(submission.clone()).await.unwrap();

    let engine = engine_with_draws(store, vec![], 0.7);
    let page_tree = engine
      .process_page_submission(submission.submission_id)
      .await
      .unwrap()
      .unwrap();

    assert_eq!(
      page_tree.page.incoming_option_id,
      Some(tree.options[0].option_id)
    );
    let option = engine
      .store()
      .get_option(tree.options[0].option_id)
      .await
      .unwrap()
      .unwrap();
    assert_eq!(option.target_page_id, Some(page_tree.page.page_id));
  }

  #[tokio::test]
  async fn second_submission_on_a_resolved_option_becomes_a_variant() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    seed_story(&store, 1).await;

    let first = page_submission(Some("1-a-0"), None);
    store.save_page_submission(first.clone()).await.unwrap();
    let second = page_submission(Some("1-a-0"), None);
    store.save_page_submission(second.clone()).await.unwrap();

    let engine = engine_with_draws(store, vec![], 0.7);
    let first_tree = engine
      .process_page_submission(first.submission_id)
      .await
      .unwrap()
      .unwrap();
    let second_tree = engine
      .process_page_submission(second.submission_id)
      .await
      .unwrap()
      .unwrap();

    // Same page, competing variant.
    assert_eq!(second_tree.page.page_id, first_tree.page.page_id);
    assert_eq!(second_tree.variant.name, "b");
  }

  #[tokio::test]
  async fn malformed_incoming_option_is_silently_dropped() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    seed_story(&store, 1).await;

    let submission = page_submission(Some("not a reference"), None);
    store.save_page_submission(submission.clone()).await.unwrap();

    let engine = engine_with_draws(store, vec![], 0.7);
    let result = engine
      .process_page_submission(submission.submission_id)
      .await
      .unwrap();
    assert!(result.is_none());

    let fetched = engine
      .store()
      .get_page_submission(submission.submission_id)
      .await
      .unwrap()
      .unwrap();
    assert!(fetched.processed, "dropped submissions must still be fenced");
  }

  #[tokio::test]
  async fn unknown_incoming_option_is_silently_dropped() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    seed_story(&store, 1).await;

    // Page 1 exists but has no variant "q".
    let submission = page_submission(Some("1-q-0"), None);
    store.save_page_submission(submission.clone()).await.unwrap();

    let engine = engine_with_draws(store, vec![], 0.7);
    assert!(engine
      .process_page_submission(submission.submission_id)
      .await
      .unwrap()
      .is_none());
  }

  #[tokio::test]
  async fn direct_page_number_adds_a_competing_variant() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let tree = seed_story(&store, 1).await;

    let submission = page_submission(None, Some(1));
    store.save_page_submission(submission.clone()).await.unwrap();

    let engine = engine_with_draws(store, vec![], 0.7);
    let page_tree = engine
      .process_page_submission(submission.submission_id)
      .await
      .unwrap()
      .unwrap();

    assert_eq!(page_tree.page.page_id, tree.page.page_id);
    assert_eq!(page_tree.variant.name, "b");
  }

  #[tokio::test]
  async fn unknown_direct_page_number_is_dropped() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    seed_story(&store, 1).await;

    let submission = page_submission(None, Some(99));
    store.save_page_submission(submission.clone()).await.unwrap();

    let engine = engine_with_draws(store, vec![], 0.7);
    assert!(engine
      .process_page_submission(submission.submission_id)
      .await
      .unwrap()
      .is_none());
  }
}
