//! Submission records and the incoming-option reference format.
//!
//! Submissions are write-once by the HTTP layer and mutated exactly once by
//! the engine: `processed` flips `false → true` and the record is never
//! deleted. The flag is the idempotency fence for at-least-once delivery.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Submissions ─────────────────────────────────────────────────────────────

/// A new-story form submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorySubmission {
  pub submission_id: Uuid,
  pub title:         String,
  pub content:       String,
  pub author_name:   String,
  pub author_id:     Option<String>,
  pub options:       Vec<String>,
  pub processed:     bool,
  pub created_at:    DateTime<Utc>,
}

/// A continuation (new-page) form submission.
///
/// Exactly one of `incoming_option` / `page_number` is set: the former
/// grows the graph through an option (`12-b-3`), the latter adds a
/// competing variant to an existing page (a rewrite).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageSubmission {
  pub submission_id:   Uuid,
  pub incoming_option: Option<String>,
  pub page_number:     Option<u64>,
  pub content:         String,
  pub author_name:     String,
  pub author_id:       Option<String>,
  pub options:         Vec<String>,
  pub processed:       bool,
  pub created_at:      DateTime<Utc>,
}

// ─── Incoming option references ──────────────────────────────────────────────

/// A parsed `{page}-{variant}-{position}` triplet naming an option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingOptionRef {
  pub page_number:     u64,
  pub variant_name:    String,
  pub option_position: u32,
}

impl IncomingOptionRef {
  /// Parse the compact triplet form, e.g. `12-b-3`.
  ///
  /// Any run of non-alphanumeric characters separates the parts, so
  /// `12-b-3` and `12.b.3` both parse. Returns `None` for anything that
  /// does not yield exactly a number, a letter sequence, and a number.
  pub fn parse(raw: &str) -> Option<Self> {
    let parts: Vec<&str> = raw
      .split(|c: char| !c.is_ascii_alphanumeric())
      .filter(|part| !part.is_empty())
      .collect();

    let [page, variant, position] = parts.as_slice() else {
      return None;
    };

    if !variant.bytes().all(|b| b.is_ascii_alphabetic()) {
      return None;
    }

    Some(IncomingOptionRef {
      page_number:     page.parse().ok()?,
      variant_name:    variant.to_ascii_lowercase(),
      option_position: position.parse().ok()?,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_compact_triplet() {
    let parsed = IncomingOptionRef::parse("12-b-3").unwrap();
    assert_eq!(parsed.page_number, 12);
    assert_eq!(parsed.variant_name, "b");
    assert_eq!(parsed.option_position, 3);
  }

  #[test]
  fn separator_characters_are_flexible() {
    assert_eq!(
      IncomingOptionRef::parse("7.aa.0"),
      Some(IncomingOptionRef {
        page_number:     7,
        variant_name:    "aa".into(),
        option_position: 0,
      })
    );
  }

  #[test]
  fn rejects_malformed_references() {
    assert_eq!(IncomingOptionRef::parse(""), None);
    assert_eq!(IncomingOptionRef::parse("12-b"), None);
    assert_eq!(IncomingOptionRef::parse("12-b-3-4"), None);
    assert_eq!(IncomingOptionRef::parse("x-b-3"), None);
    assert_eq!(IncomingOptionRef::parse("12-9-3"), None);
  }

  #[test]
  fn variant_names_are_lowercased() {
    let parsed = IncomingOptionRef::parse("3-B-1").unwrap();
    assert_eq!(parsed.variant_name, "b");
  }
}
