//! Story graph types — stories, pages, variants, and options.
//!
//! A story owns pages; each page owns one or more competing variants; each
//! variant owns the options that branch to further pages. Page numbers are
//! the human-facing addresses and are unique across the whole corpus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Story ───────────────────────────────────────────────────────────────────

/// A story: a title and a pointer at its root page. Immutable after
/// creation except for the indirect stats counter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Story {
  pub story_id:     Uuid,
  pub title:        String,
  pub root_page_id: Uuid,
  pub created_at:   DateTime<Utc>,
}

// ─── Page ────────────────────────────────────────────────────────────────────

/// A single page of a story.
///
/// `number` is the public address (`/p/{number}{variant}.html`);
/// `incoming_option_id` points back at the option that led here, or `None`
/// for a story's root page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
  pub page_id:            Uuid,
  pub story_id:           Uuid,
  pub number:             u64,
  pub incoming_option_id: Option<Uuid>,
  pub created_at:         DateTime<Utc>,
}

// ─── Variant ─────────────────────────────────────────────────────────────────

/// One of several competing textual renditions of a page.
///
/// `visibility` is the crowd-moderated score in `[0, 1]` gating whether the
/// variant is rendered for readers. `rand_key` is a uniform draw fixed at
/// creation time; the moderation assigner range-scans around a random pivot
/// on this column to approximate uniform sampling without a full scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variant {
  pub variant_id:               Uuid,
  pub page_id:                  Uuid,
  /// Base-26 letter sequence: `a`, `b`, … `z`, `aa`, …
  pub name:                     String,
  pub content:                  String,
  pub author_id:                Option<String>,
  pub author_name:              String,
  pub visibility:               f64,
  pub moderation_rating_count:  u32,
  pub moderator_reputation_sum: f64,
  pub rand_key:                 f64,
  pub created_at:               DateTime<Utc>,
}

impl Variant {
  /// The public slug for this variant on a given page, e.g. `12b`.
  pub fn slug(&self, page_number: u64) -> String {
    variant_slug(page_number, &self.name)
  }
}

// ─── Option ──────────────────────────────────────────────────────────────────

/// A branch offered at the end of a variant. `target_page_id` stays `None`
/// until a reader's continuation submission resolves it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryOption {
  pub option_id:      Uuid,
  pub variant_id:     Uuid,
  pub content:        String,
  pub position:       u32,
  pub target_page_id: Option<Uuid>,
}

// ─── Slugs ───────────────────────────────────────────────────────────────────

/// Public slug of a variant: page number immediately followed by the
/// variant name, e.g. `12b`.
pub fn variant_slug(page_number: u64, variant_name: &str) -> String {
  format!("{page_number}{variant_name}")
}

/// Slug of an option: `{page}-{variant}-{position}`, e.g. `12-b-3`. This is
/// the compact form continuation submissions use to name their incoming
/// option.
pub fn option_slug(page_number: u64, variant_name: &str, position: u32) -> String {
  format!("{page_number}-{variant_name}-{position}")
}
