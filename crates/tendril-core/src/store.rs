//! The `StoryStore` trait and supporting mutation/query types.
//!
//! The trait is implemented by storage backends (e.g.
//! `tendril-store-sqlite`). Higher layers (`tendril-engine`,
//! `tendril-publish`, `tendril-server`) depend on this abstraction, not on
//! any concrete backend.
//!
//! Multi-document mutations (`create_story_tree`, `create_page_tree`,
//! `add_page_variant`, `record_rating`, `apply_rating`) are atomic: the
//! backend commits all writes of one call or none of them, and re-checks
//! its preconditions (`processed` flag, page-number uniqueness, option
//! linkage) inside the same transaction. That is what makes the engine's
//! handlers safe under at-least-once delivery and concurrent invocation.

use std::future::Future;

use uuid::Uuid;

use crate::{
  graph::{Page, Story, StoryOption, Variant},
  moderation::{ModerationRating, ModerationReport, ModeratorAssignment},
  submission::{PageSubmission, StorySubmission},
  Result,
};

// ─── Mutation inputs ─────────────────────────────────────────────────────────

/// Everything needed to create a story from an accepted submission in one
/// atomic batch: story, root page, initial variant (`name = "a"`), options,
/// stats row, and the `processed` flip on the submission.
#[derive(Debug, Clone)]
pub struct NewStoryTree {
  pub submission_id: Uuid,
  pub title:         String,
  pub content:       String,
  pub author_name:   String,
  pub author_id:     Option<String>,
  pub options:       Vec<String>,
  /// Allocated by the engine; the backend must fail with
  /// [`crate::Error::PageNumberTaken`] if a concurrent writer got there
  /// first.
  pub page_number:   u64,
  pub rand_key:      f64,
}

/// Create a new page (and its first variant) behind an existing option, and
/// link `StoryOption::target_page_id` in the same batch.
#[derive(Debug, Clone)]
pub struct NewPageTree {
  pub submission_id:      Uuid,
  pub story_id:           Uuid,
  pub incoming_option_id: Uuid,
  pub page_number:        u64,
  pub content:            String,
  pub author_name:        String,
  pub author_id:          Option<String>,
  pub options:            Vec<String>,
  pub rand_key:           f64,
}

/// Add a competing variant to an existing page. The backend derives the
/// next base-26 name inside the transaction.
#[derive(Debug, Clone)]
pub struct NewPageVariant {
  pub submission_id: Uuid,
  pub page_id:       Uuid,
  pub content:       String,
  pub author_name:   String,
  pub author_id:     Option<String>,
  pub options:       Vec<String>,
  pub rand_key:      f64,
}

// ─── Mutation outputs ────────────────────────────────────────────────────────

/// The documents created for one story submission.
#[derive(Debug, Clone)]
pub struct StoryTree {
  pub story:   Story,
  pub page:    Page,
  pub variant: Variant,
  pub options: Vec<StoryOption>,
}

/// The documents created for one page submission.
#[derive(Debug, Clone)]
pub struct PageTree {
  pub page:    Page,
  pub variant: Variant,
  pub options: Vec<StoryOption>,
}

/// Before/after variant states from a rating fold, handed to the publisher.
#[derive(Debug, Clone)]
pub struct RatingOutcome {
  pub before: Variant,
  pub after:  Variant,
}

// ─── Candidate queries ───────────────────────────────────────────────────────

/// Which side of the random pivot a candidate scan covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PivotSide {
  /// `rand_key >= pivot`, ascending.
  AtOrAbove,
  /// `rand_key < pivot`, ascending.
  Below,
}

/// One step of the moderation assigner's query plan.
#[derive(Debug, Clone, Copy)]
pub struct CandidateQuery {
  /// Restrict to variants with no moderation ratings yet.
  pub zero_rated_only: bool,
  pub side:            PivotSide,
  pub pivot:           f64,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a Tendril story-graph store backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait StoryStore: Send + Sync {
  // ── Submissions ───────────────────────────────────────────────────────

  fn save_story_submission(
    &self,
    submission: StorySubmission,
  ) -> impl Future<Output = Result<()>> + Send + '_;

  fn get_story_submission(
    &self,
    submission_id: Uuid,
  ) -> impl Future<Output = Result<Option<StorySubmission>>> + Send + '_;

  /// Flip `processed` with no other effect — the silent-drop path for
  /// malformed or dangling submissions.
  fn mark_story_submission_processed(
    &self,
    submission_id: Uuid,
  ) -> impl Future<Output = Result<()>> + Send + '_;

  fn save_page_submission(
    &self,
    submission: PageSubmission,
  ) -> impl Future<Output = Result<()>> + Send + '_;

  fn get_page_submission(
    &self,
    submission_id: Uuid,
  ) -> impl Future<Output = Result<Option<PageSubmission>>> + Send + '_;

  fn mark_page_submission_processed(
    &self,
    submission_id: Uuid,
  ) -> impl Future<Output = Result<()>> + Send + '_;

  // ── Graph reads ───────────────────────────────────────────────────────

  fn get_story(
    &self,
    story_id: Uuid,
  ) -> impl Future<Output = Result<Option<Story>>> + Send + '_;

  fn get_page(
    &self,
    page_id: Uuid,
  ) -> impl Future<Output = Result<Option<Page>>> + Send + '_;

  /// Corpus-wide lookup by public page number (the collection-group query
  /// of the document-store original).
  fn find_page_by_number(
    &self,
    number: u64,
  ) -> impl Future<Output = Result<Option<Page>>> + Send + '_;

  /// Existence probe used by the page-number allocator.
  fn page_number_exists(
    &self,
    number: u64,
  ) -> impl Future<Output = Result<bool>> + Send + '_;

  fn get_variant(
    &self,
    variant_id: Uuid,
  ) -> impl Future<Output = Result<Option<Variant>>> + Send + '_;

  fn find_variant_by_name<'a>(
    &'a self,
    page_id: Uuid,
    name: &'a str,
  ) -> impl Future<Output = Result<Option<Variant>>> + Send + 'a;

  /// All variants of a page in base-26 name order.
  fn list_variants(
    &self,
    page_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Variant>>> + Send + '_;

  /// The page's first variant in name order, when any exists.
  fn first_variant(
    &self,
    page_id: Uuid,
  ) -> impl Future<Output = Result<Option<Variant>>> + Send + '_;

  fn get_option(
    &self,
    option_id: Uuid,
  ) -> impl Future<Output = Result<Option<StoryOption>>> + Send + '_;

  fn find_option_by_position(
    &self,
    variant_id: Uuid,
    position: u32,
  ) -> impl Future<Output = Result<Option<StoryOption>>> + Send + '_;

  /// All options of a variant in position order.
  fn list_options(
    &self,
    variant_id: Uuid,
  ) -> impl Future<Output = Result<Vec<StoryOption>>> + Send + '_;

  /// The story's indirect stats counter.
  fn story_variant_count(
    &self,
    story_id: Uuid,
  ) -> impl Future<Output = Result<u64>> + Send + '_;

  // ── Graph mutations (atomic batches) ──────────────────────────────────

  /// Fails with [`crate::Error::SubmissionProcessed`] when redelivered and
  /// [`crate::Error::PageNumberTaken`] when the allocated number lost a
  /// race.
  fn create_story_tree(
    &self,
    input: NewStoryTree,
  ) -> impl Future<Output = Result<StoryTree>> + Send + '_;

  /// Additionally fails with [`crate::Error::OptionAlreadyLinked`] when a
  /// concurrent submission resolved the same option first; callers fall
  /// back to [`StoryStore::add_page_variant`] on the option's target.
  fn create_page_tree(
    &self,
    input: NewPageTree,
  ) -> impl Future<Output = Result<PageTree>> + Send + '_;

  fn add_page_variant(
    &self,
    input: NewPageVariant,
  ) -> impl Future<Output = Result<PageTree>> + Send + '_;

  // ── Moderation ────────────────────────────────────────────────────────

  fn get_assignment<'a>(
    &'a self,
    moderator_id: &'a str,
  ) -> impl Future<Output = Result<Option<ModeratorAssignment>>> + Send + 'a;

  /// Record (or replace) the moderator's open assignment.
  fn set_assignment<'a>(
    &'a self,
    moderator_id: &'a str,
    variant_id: Uuid,
  ) -> impl Future<Output = Result<()>> + Send + 'a;

  /// Append the rating and clear the rating moderator's assignment in one
  /// batch (the at-most-one-job invariant).
  fn record_rating(
    &self,
    rating: ModerationRating,
  ) -> impl Future<Output = Result<()>> + Send + '_;

  /// Fold one rating into the variant's cached aggregate, serialized
  /// against concurrent folds on the same variant. Returns `None` when the
  /// variant no longer exists.
  fn apply_rating(
    &self,
    variant_id: Uuid,
    is_approved: bool,
  ) -> impl Future<Output = Result<Option<RatingOutcome>>> + Send + '_;

  /// One step of the assigner's plan: the first variant on the requested
  /// side of the pivot, ordered by `rand_key` ascending.
  fn next_moderation_candidate(
    &self,
    query: CandidateQuery,
  ) -> impl Future<Output = Result<Option<Variant>>> + Send + '_;

  fn list_variant_ratings(
    &self,
    variant_id: Uuid,
  ) -> impl Future<Output = Result<Vec<ModerationRating>>> + Send + '_;

  fn append_report(
    &self,
    report: ModerationReport,
  ) -> impl Future<Output = Result<()>> + Send + '_;
}
