//! Encoding and decoding helpers between Rust domain types and the
//! plain-text representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings, UUIDs as hyphenated
//! lowercase strings, option lists as compact JSON arrays.

use chrono::{DateTime, Utc};
use tendril_core::{
  graph::{Page, Story, StoryOption, Variant},
  moderation::{ModerationRating, ModeratorAssignment},
  submission::{PageSubmission, StorySubmission},
  Error, Result,
};
use uuid::Uuid;

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> {
  Uuid::parse_str(s).map_err(Error::backend)
}

pub fn decode_uuid_opt(s: Option<String>) -> Result<Option<Uuid>> {
  s.as_deref().map(decode_uuid).transpose()
}

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(Error::backend)
}

pub fn encode_string_list(values: &[String]) -> Result<String> {
  Ok(serde_json::to_string(values)?)
}

pub fn decode_string_list(s: &str) -> Result<Vec<String>> {
  Ok(serde_json::from_str(s)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `stories` row.
pub struct RawStory {
  pub story_id:     String,
  pub title:        String,
  pub root_page_id: String,
  pub created_at:   String,
}

impl RawStory {
  pub fn into_story(self) -> Result<Story> {
    Ok(Story {
      story_id:     decode_uuid(&self.story_id)?,
      title:        self.title,
      root_page_id: decode_uuid(&self.root_page_id)?,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawPage {
  pub page_id:            String,
  pub story_id:           String,
  pub number:             i64,
  pub incoming_option_id: Option<String>,
  pub created_at:         String,
}

impl RawPage {
  pub fn into_page(self) -> Result<Page> {
    Ok(Page {
      page_id:            decode_uuid(&self.page_id)?,
      story_id:           decode_uuid(&self.story_id)?,
      number:             self.number as u64,
      incoming_option_id: decode_uuid_opt(self.incoming_option_id)?,
      created_at:         decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawVariant {
  pub variant_id:     String,
  pub page_id:        String,
  pub name:           String,
  pub content:        String,
  pub author_id:      Option<String>,
  pub author_name:    String,
  pub visibility:     f64,
  pub rating_count:   i64,
  pub reputation_sum: f64,
  pub rand_key:       f64,
  pub created_at:     String,
}

impl RawVariant {
  pub fn into_variant(self) -> Result<Variant> {
    Ok(Variant {
      variant_id:               decode_uuid(&self.variant_id)?,
      page_id:                  decode_uuid(&self.page_id)?,
      name:                     self.name,
      content:                  self.content,
      author_id:                self.author_id,
      author_name:              self.author_name,
      visibility:               self.visibility,
      moderation_rating_count:  self.rating_count as u32,
      moderator_reputation_sum: self.reputation_sum,
      rand_key:                 self.rand_key,
      created_at:               decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawOption {
  pub option_id:      String,
  pub variant_id:     String,
  pub content:        String,
  pub position:       i64,
  pub target_page_id: Option<String>,
}

impl RawOption {
  pub fn into_option(self) -> Result<StoryOption> {
    Ok(StoryOption {
      option_id:      decode_uuid(&self.option_id)?,
      variant_id:     decode_uuid(&self.variant_id)?,
      content:        self.content,
      position:       self.position as u32,
      target_page_id: decode_uuid_opt(self.target_page_id)?,
    })
  }
}

pub struct RawStorySubmission {
  pub submission_id: String,
  pub title:         String,
  pub content:       String,
  pub author_name:   String,
  pub author_id:     Option<String>,
  pub options:       String,
  pub processed:     bool,
  pub created_at:    String,
}

impl RawStorySubmission {
  pub fn into_submission(self) -> Result<StorySubmission> {
    Ok(StorySubmission {
      submission_id: decode_uuid(&self.submission_id)?,
      title:         self.title,
      content:       self.content,
      author_name:   self.author_name,
      author_id:     self.author_id,
      options:       decode_string_list(&self.options)?,
      processed:     self.processed,
      created_at:    decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawPageSubmission {
  pub submission_id:   String,
  pub incoming_option: Option<String>,
  pub page_number:     Option<i64>,
  pub content:         String,
  pub author_name:     String,
  pub author_id:       Option<String>,
  pub options:         String,
  pub processed:       bool,
  pub created_at:      String,
}

impl RawPageSubmission {
  pub fn into_submission(self) -> Result<PageSubmission> {
    Ok(PageSubmission {
      submission_id:   decode_uuid(&self.submission_id)?,
      incoming_option: self.incoming_option,
      page_number:     self.page_number.map(|n| n as u64),
      content:         self.content,
      author_name:     self.author_name,
      author_id:       self.author_id,
      options:         decode_string_list(&self.options)?,
      processed:       self.processed,
      created_at:      decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawAssignment {
  pub moderator_id: String,
  pub variant_id:   Option<String>,
  pub assigned_at:  String,
}

impl RawAssignment {
  pub fn into_assignment(self) -> Result<ModeratorAssignment> {
    Ok(ModeratorAssignment {
      moderator_id: self.moderator_id,
      variant_id:   decode_uuid_opt(self.variant_id)?,
      assigned_at:  decode_dt(&self.assigned_at)?,
    })
  }
}

pub struct RawRating {
  pub rating_id:    String,
  pub moderator_id: String,
  pub variant_id:   String,
  pub is_approved:  bool,
  pub rated_at:     String,
}

impl RawRating {
  pub fn into_rating(self) -> Result<ModerationRating> {
    Ok(ModerationRating {
      rating_id:    decode_uuid(&self.rating_id)?,
      moderator_id: self.moderator_id,
      variant_id:   decode_uuid(&self.variant_id)?,
      is_approved:  self.is_approved,
      rated_at:     decode_dt(&self.rated_at)?,
    })
  }
}
