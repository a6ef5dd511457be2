//! [`SqliteStore`] — the SQLite implementation of [`StoryStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use tendril_core::{
  graph::{Page, Story, StoryOption, Variant},
  moderation::{
    fold_rating, ModerationRating, ModerationReport, ModeratorAssignment,
    VariantStats,
  },
  name::{next_variant_name, FIRST_VARIANT_NAME},
  store::{
    CandidateQuery, NewPageTree, NewPageVariant, NewStoryTree, PageTree,
    PivotSide, RatingOutcome, StoryStore, StoryTree,
  },
  submission::{PageSubmission, StorySubmission},
  Error, Result,
};

use crate::{
  encode::{
    encode_dt, encode_string_list, encode_uuid, RawAssignment, RawOption,
    RawPage, RawPageSubmission, RawRating, RawStory, RawStorySubmission,
    RawVariant,
  },
  schema::SCHEMA,
};

// ─── Row helpers ─────────────────────────────────────────────────────────────

const VARIANT_COLUMNS: &str = "variant_id, page_id, name, content, author_id, \
   author_name, visibility, rating_count, reputation_sum, rand_key, created_at";

const PAGE_COLUMNS: &str =
  "page_id, story_id, number, incoming_option_id, created_at";

const OPTION_COLUMNS: &str =
  "option_id, variant_id, content, position, target_page_id";

fn raw_variant(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawVariant> {
  Ok(RawVariant {
    variant_id:     row.get(0)?,
    page_id:        row.get(1)?,
    name:           row.get(2)?,
    content:        row.get(3)?,
    author_id:      row.get(4)?,
    author_name:    row.get(5)?,
    visibility:     row.get(6)?,
    rating_count:   row.get(7)?,
    reputation_sum: row.get(8)?,
    rand_key:       row.get(9)?,
    created_at:     row.get(10)?,
  })
}

fn raw_page(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawPage> {
  Ok(RawPage {
    page_id:            row.get(0)?,
    story_id:           row.get(1)?,
    number:             row.get(2)?,
    incoming_option_id: row.get(3)?,
    created_at:         row.get(4)?,
  })
}

fn raw_option(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawOption> {
  Ok(RawOption {
    option_id:      row.get(0)?,
    variant_id:     row.get(1)?,
    content:        row.get(2)?,
    position:       row.get(3)?,
    target_page_id: row.get(4)?,
  })
}

/// Insert one variant row. Used by every creation batch.
fn insert_variant(
  conn: &rusqlite::Connection,
  variant: &Variant,
) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT INTO variants (
       variant_id, page_id, name, content, author_id, author_name,
       visibility, rating_count, reputation_sum, rand_key, created_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
    rusqlite::params![
      encode_uuid(variant.variant_id),
      encode_uuid(variant.page_id),
      variant.name,
      variant.content,
      variant.author_id,
      variant.author_name,
      variant.visibility,
      i64::from(variant.moderation_rating_count),
      variant.moderator_reputation_sum,
      variant.rand_key,
      encode_dt(variant.created_at),
    ],
  )?;
  Ok(())
}

fn insert_options(
  conn: &rusqlite::Connection,
  options: &[StoryOption],
) -> rusqlite::Result<()> {
  for option in options {
    conn.execute(
      "INSERT INTO options (option_id, variant_id, content, position, target_page_id)
       VALUES (?1, ?2, ?3, ?4, ?5)",
      rusqlite::params![
        encode_uuid(option.option_id),
        encode_uuid(option.variant_id),
        option.content,
        i64::from(option.position),
        option.target_page_id.map(encode_uuid),
      ],
    )?;
  }
  Ok(())
}

fn page_number_taken(
  conn: &rusqlite::Connection,
  number: u64,
) -> rusqlite::Result<bool> {
  let taken: Option<bool> = conn
    .query_row(
      "SELECT 1 FROM pages WHERE number = ?1",
      rusqlite::params![number as i64],
      |_| Ok(true),
    )
    .optional()?;
  Ok(taken.unwrap_or(false))
}

/// Newest variant name on a page in base-26 order. Plain lexicographic
/// `ORDER BY name` would sort `z` after `aa`; length-first ordering keeps
/// the sequence correct past 26 variants.
fn latest_variant_name(
  conn: &rusqlite::Connection,
  page_id: &str,
) -> rusqlite::Result<Option<String>> {
  conn
    .query_row(
      "SELECT name FROM variants WHERE page_id = ?1
       ORDER BY length(name) DESC, name DESC LIMIT 1",
      rusqlite::params![page_id],
      |row| row.get(0),
    )
    .optional()
}

fn bump_story_stats(
  conn: &rusqlite::Connection,
  story_id: &str,
) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT INTO story_stats (story_id, variant_count) VALUES (?1, 1)
     ON CONFLICT (story_id) DO UPDATE SET variant_count = variant_count + 1",
    rusqlite::params![story_id],
  )?;
  Ok(())
}

/// Check a submission row inside the creating transaction. `Ok(Err(..))`
/// carries the domain outcome out of the closure.
fn check_submission_unprocessed(
  conn: &rusqlite::Connection,
  table: &str,
  submission_id: Uuid,
) -> rusqlite::Result<Result<()>> {
  let processed: Option<bool> = conn
    .query_row(
      &format!("SELECT processed FROM {table} WHERE submission_id = ?1"),
      rusqlite::params![encode_uuid(submission_id)],
      |row| row.get(0),
    )
    .optional()?;

  Ok(match processed {
    None => Err(Error::SubmissionNotFound(submission_id)),
    Some(true) => Err(Error::SubmissionProcessed(submission_id)),
    Some(false) => Ok(()),
  })
}

/// Build the option rows for a freshly created variant, positions `0..`.
fn build_options(variant_id: Uuid, contents: &[String]) -> Vec<StoryOption> {
  contents
    .iter()
    .enumerate()
    .map(|(position, content)| StoryOption {
      option_id:      Uuid::new_v4(),
      variant_id,
      content:        content.clone(),
      position:       position as u32,
      target_page_id: None,
    })
    .collect()
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Tendril story-graph store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted, and all
/// calls are serialized onto the connection's worker thread.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path)
      .await
      .map_err(Error::backend)?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory()
      .await
      .map_err(Error::backend)?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await
      .map_err(Error::backend)
  }
}

// ─── StoryStore impl ─────────────────────────────────────────────────────────

impl StoryStore for SqliteStore {
  // ── Submissions ───────────────────────────────────────────────────────

  async fn save_story_submission(
    &self,
    submission: StorySubmission,
  ) -> Result<()> {
    let options = encode_string_list(&submission.options)?;
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO story_submissions (
             submission_id, title, content, author_name, author_id,
             options, processed, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          rusqlite::params![
            encode_uuid(submission.submission_id),
            submission.title,
            submission.content,
            submission.author_name,
            submission.author_id,
            options,
            submission.processed,
            encode_dt(submission.created_at),
          ],
        )?;
        Ok(())
      })
      .await
      .map_err(Error::backend)
  }

  async fn get_story_submission(
    &self,
    submission_id: Uuid,
  ) -> Result<Option<StorySubmission>> {
    let id = encode_uuid(submission_id);
    let raw: Option<RawStorySubmission> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT submission_id, title, content, author_name, author_id,
                      options, processed, created_at
               FROM story_submissions WHERE submission_id = ?1",
              rusqlite::params![id],
              |row| {
                Ok(RawStorySubmission {
                  submission_id: row.get(0)?,
                  title:         row.get(1)?,
                  content:       row.get(2)?,
                  author_name:   row.get(3)?,
                  author_id:     row.get(4)?,
                  options:       row.get(5)?,
                  processed:     row.get(6)?,
                  created_at:    row.get(7)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await
      .map_err(Error::backend)?;

    raw.map(RawStorySubmission::into_submission).transpose()
  }

  async fn mark_story_submission_processed(
    &self,
    submission_id: Uuid,
  ) -> Result<()> {
    let id = encode_uuid(submission_id);
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE story_submissions SET processed = 1 WHERE submission_id = ?1",
          rusqlite::params![id],
        )?;
        Ok(())
      })
      .await
      .map_err(Error::backend)
  }

  async fn save_page_submission(
    &self,
    submission: PageSubmission,
  ) -> Result<()> {
    let options = encode_string_list(&submission.options)?;
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO page_submissions (
             submission_id, incoming_option, page_number, content,
             author_name, author_id, options, processed, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          rusqlite::params![
            encode_uuid(submission.submission_id),
            submission.incoming_option,
            submission.page_number.map(|n| n as i64),
            submission.content,
            submission.author_name,
            submission.author_id,
            options,
            submission.processed,
            encode_dt(submission.created_at),
          ],
        )?;
        Ok(())
      })
      .await
      .map_err(Error::backend)
  }

  async fn get_page_submission(
    &self,
    submission_id: Uuid,
  ) -> Result<Option<PageSubmission>> {
    let id = encode_uuid(submission_id);
    let raw: Option<RawPageSubmission> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT submission_id, incoming_option, page_number, content,
                      author_name, author_id, options, processed, created_at
               FROM page_submissions WHERE submission_id = ?1",
              rusqlite::params![id],
              |row| {
                Ok(RawPageSubmission {
                  submission_id:   row.get(0)?,
                  incoming_option: row.get(1)?,
                  page_number:     row.get(2)?,
                  content:         row.get(3)?,
                  author_name:     row.get(4)?,
                  author_id:       row.get(5)?,
                  options:         row.get(6)?,
                  processed:       row.get(7)?,
                  created_at:      row.get(8)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await
      .map_err(Error::backend)?;

    raw.map(RawPageSubmission::into_submission).transpose()
  }

  async fn mark_page_submission_processed(
    &self,
    submission_id: Uuid,
  ) -> Result<()> {
    let id = encode_uuid(submission_id);
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE page_submissions SET processed = 1 WHERE submission_id = ?1",
          rusqlite::params![id],
        )?;
        Ok(())
      })
      .await
      .map_err(Error::backend)
  }

  // ── Graph reads ───────────────────────────────────────────────────────

  async fn get_story(&self, story_id: Uuid) -> Result<Option<Story>> {
    let id = encode_uuid(story_id);
    let raw: Option<RawStory> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT story_id, title, root_page_id, created_at
               FROM stories WHERE story_id = ?1",
              rusqlite::params![id],
              |row| {
                Ok(RawStory {
                  story_id:     row.get(0)?,
                  title:        row.get(1)?,
                  root_page_id: row.get(2)?,
                  created_at:   row.get(3)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await
      .map_err(Error::backend)?;

    raw.map(RawStory::into_story).transpose()
  }

  async fn get_page(&self, page_id: Uuid) -> Result<Option<Page>> {
    let id = encode_uuid(page_id);
    let raw: Option<RawPage> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {PAGE_COLUMNS} FROM pages WHERE page_id = ?1"),
              rusqlite::params![id],
              raw_page,
            )
            .optional()?,
        )
      })
      .await
      .map_err(Error::backend)?;

    raw.map(RawPage::into_page).transpose()
  }

  async fn find_page_by_number(&self, number: u64) -> Result<Option<Page>> {
    let raw: Option<RawPage> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {PAGE_COLUMNS} FROM pages WHERE number = ?1"),
              rusqlite::params![number as i64],
              raw_page,
            )
            .optional()?,
        )
      })
      .await
      .map_err(Error::backend)?;

    raw.map(RawPage::into_page).transpose()
  }

  async fn page_number_exists(&self, number: u64) -> Result<bool> {
    self
      .conn
      .call(move |conn| Ok(page_number_taken(conn, number)?))
      .await
      .map_err(Error::backend)
  }

  async fn get_variant(&self, variant_id: Uuid) -> Result<Option<Variant>> {
    let id = encode_uuid(variant_id);
    let raw: Option<RawVariant> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {VARIANT_COLUMNS} FROM variants WHERE variant_id = ?1"
              ),
              rusqlite::params![id],
              raw_variant,
            )
            .optional()?,
        )
      })
      .await
      .map_err(Error::backend)?;

    raw.map(RawVariant::into_variant).transpose()
  }

  async fn find_variant_by_name<'a>(
    &'a self,
    page_id: Uuid,
    name: &'a str,
  ) -> Result<Option<Variant>> {
    let page = encode_uuid(page_id);
    let name = name.to_owned();
    let raw: Option<RawVariant> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {VARIANT_COLUMNS} FROM variants
                 WHERE page_id = ?1 AND name = ?2"
              ),
              rusqlite::params![page, name],
              raw_variant,
            )
            .optional()?,
        )
      })
      .await
      .map_err(Error::backend)?;

    raw.map(RawVariant::into_variant).transpose()
  }

  async fn list_variants(&self, page_id: Uuid) -> Result<Vec<Variant>> {
    let page = encode_uuid(page_id);
    let raws: Vec<RawVariant> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {VARIANT_COLUMNS} FROM variants WHERE page_id = ?1
           ORDER BY length(name), name"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![page], raw_variant)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(Error::backend)?;

    raws.into_iter().map(RawVariant::into_variant).collect()
  }

  async fn first_variant(&self, page_id: Uuid) -> Result<Option<Variant>> {
    let page = encode_uuid(page_id);
    let raw: Option<RawVariant> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {VARIANT_COLUMNS} FROM variants WHERE page_id = ?1
                 ORDER BY length(name), name LIMIT 1"
              ),
              rusqlite::params![page],
              raw_variant,
            )
            .optional()?,
        )
      })
      .await
      .map_err(Error::backend)?;

    raw.map(RawVariant::into_variant).transpose()
  }

  async fn get_option(&self, option_id: Uuid) -> Result<Option<StoryOption>> {
    let id = encode_uuid(option_id);
    let raw: Option<RawOption> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {OPTION_COLUMNS} FROM options WHERE option_id = ?1"
              ),
              rusqlite::params![id],
              raw_option,
            )
            .optional()?,
        )
      })
      .await
      .map_err(Error::backend)?;

    raw.map(RawOption::into_option).transpose()
  }

  async fn find_option_by_position(
    &self,
    variant_id: Uuid,
    position: u32,
  ) -> Result<Option<StoryOption>> {
    let variant = encode_uuid(variant_id);
    let raw: Option<RawOption> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {OPTION_COLUMNS} FROM options
                 WHERE variant_id = ?1 AND position = ?2"
              ),
              rusqlite::params![variant, i64::from(position)],
              raw_option,
            )
            .optional()?,
        )
      })
      .await
      .map_err(Error::backend)?;

    raw.map(RawOption::into_option).transpose()
  }

  async fn list_options(&self, variant_id: Uuid) -> Result<Vec<StoryOption>> {
    let variant = encode_uuid(variant_id);
    let raws: Vec<RawOption> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {OPTION_COLUMNS} FROM options WHERE variant_id = ?1
           ORDER BY position"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![variant], raw_option)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(Error::backend)?;

    raws.into_iter().map(RawOption::into_option).collect()
  }

  async fn story_variant_count(&self, story_id: Uuid) -> Result<u64> {
    let id = encode_uuid(story_id);
    let count: Option<i64> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT variant_count FROM story_stats WHERE story_id = ?1",
              rusqlite::params![id],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await
      .map_err(Error::backend)?;

    Ok(count.unwrap_or(0) as u64)
  }

  // ── Graph mutations ───────────────────────────────────────────────────

  async fn create_story_tree(&self, input: NewStoryTree) -> Result<StoryTree> {
    let now = Utc::now();
    let story_id = Uuid::new_v4();
    let page_id = Uuid::new_v4();
    let variant_id = Uuid::new_v4();

    let story = Story {
      story_id,
      title: input.title.clone(),
      root_page_id: page_id,
      created_at: now,
    };
    let page = Page {
      page_id,
      story_id,
      number: input.page_number,
      incoming_option_id: None,
      created_at: now,
    };
    let variant = Variant {
      variant_id,
      page_id,
      name: FIRST_VARIANT_NAME.to_string(),
      content: input.content.clone(),
      author_id: input.author_id.clone(),
      author_name: input.author_name.clone(),
      visibility: VariantStats::initial().visibility,
      moderation_rating_count: 0,
      moderator_reputation_sum: 0.0,
      rand_key: input.rand_key,
      created_at: now,
    };
    let options = build_options(variant_id, &input.options);

    let tree = StoryTree {
      story: story.clone(),
      page: page.clone(),
      variant: variant.clone(),
      options: options.clone(),
    };
    let submission_id = input.submission_id;
    let number = input.page_number;

    let outcome: Result<()> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        if let Err(err) =
          check_submission_unprocessed(&tx, "story_submissions", submission_id)?
        {
          return Ok(Err(err));
        }
        if page_number_taken(&tx, number)? {
          return Ok(Err(Error::PageNumberTaken(number)));
        }

        tx.execute(
          "INSERT INTO stories (story_id, title, root_page_id, created_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![
            encode_uuid(story.story_id),
            story.title,
            encode_uuid(story.root_page_id),
            encode_dt(story.created_at),
          ],
        )?;
        tx.execute(
          "INSERT INTO pages (page_id, story_id, number, incoming_option_id, created_at)
           VALUES (?1, ?2, ?3, NULL, ?4)",
          rusqlite::params![
            encode_uuid(page.page_id),
            encode_uuid(page.story_id),
            page.number as i64,
            encode_dt(page.created_at),
          ],
        )?;
        insert_variant(&tx, &variant)?;
        insert_options(&tx, &options)?;
        tx.execute(
          "INSERT INTO story_stats (story_id, variant_count) VALUES (?1, 1)",
          rusqlite::params![encode_uuid(story.story_id)],
        )?;
        tx.execute(
          "UPDATE story_submissions SET processed = 1 WHERE submission_id = ?1",
          rusqlite::params![encode_uuid(submission_id)],
        )?;

        tx.commit()?;
        Ok(Ok(()))
      })
      .await
      .map_err(Error::backend)?;

    outcome?;
    Ok(tree)
  }

  async fn create_page_tree(&self, input: NewPageTree) -> Result<PageTree> {
    let now = Utc::now();
    let page_id = Uuid::new_v4();
    let variant_id = Uuid::new_v4();

    let page = Page {
      page_id,
      story_id: input.story_id,
      number: input.page_number,
      incoming_option_id: Some(input.incoming_option_id),
      created_at: now,
    };
    let variant = Variant {
      variant_id,
      page_id,
      name: FIRST_VARIANT_NAME.to_string(),
      content: input.content.clone(),
      author_id: input.author_id.clone(),
      author_name: input.author_name.clone(),
      visibility: VariantStats::initial().visibility,
      moderation_rating_count: 0,
      moderator_reputation_sum: 0.0,
      rand_key: input.rand_key,
      created_at: now,
    };
    let options = build_options(variant_id, &input.options);

    let tree = PageTree {
      page: page.clone(),
      variant: variant.clone(),
      options: options.clone(),
    };
    let submission_id = input.submission_id;
    let option_id = input.incoming_option_id;
    let number = input.page_number;

    let outcome: Result<()> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        if let Err(err) =
          check_submission_unprocessed(&tx, "page_submissions", submission_id)?
        {
          return Ok(Err(err));
        }

        let target: Option<Option<String>> = tx
          .query_row(
            "SELECT target_page_id FROM options WHERE option_id = ?1",
            rusqlite::params![encode_uuid(option_id)],
            |row| row.get(0),
          )
          .optional()?;
        match target {
          None => return Ok(Err(Error::OptionNotFound(option_id))),
          Some(Some(_)) => return Ok(Err(Error::OptionAlreadyLinked(option_id))),
          Some(None) => {}
        }

        if page_number_taken(&tx, number)? {
          return Ok(Err(Error::PageNumberTaken(number)));
        }

        tx.execute(
          "INSERT INTO pages (page_id, story_id, number, incoming_option_id, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![
            encode_uuid(page.page_id),
            encode_uuid(page.story_id),
            page.number as i64,
            encode_uuid(option_id),
            encode_dt(page.created_at),
          ],
        )?;
        insert_variant(&tx, &variant)?;
        insert_options(&tx, &options)?;
        tx.execute(
          "UPDATE options SET target_page_id = ?1 WHERE option_id = ?2",
          rusqlite::params![encode_uuid(page.page_id), encode_uuid(option_id)],
        )?;
        bump_story_stats(&tx, &encode_uuid(page.story_id))?;
        tx.execute(
          "UPDATE page_submissions SET processed = 1 WHERE submission_id = ?1",
          rusqlite::params![encode_uuid(submission_id)],
        )?;

        tx.commit()?;
        Ok(Ok(()))
      })
      .await
      .map_err(Error::backend)?;

    outcome?;
    Ok(tree)
  }

  async fn add_page_variant(&self, input: NewPageVariant) -> Result<PageTree> {
    let now = Utc::now();
    let variant_id = Uuid::new_v4();
    let options = build_options(variant_id, &input.options);

    let submission_id = input.submission_id;
    let page_id = input.page_id;
    let page_key = encode_uuid(page_id);
    let options_for_insert = options.clone();
    let content = input.content.clone();
    let author_id = input.author_id.clone();
    let author_name = input.author_name.clone();
    let rand_key = input.rand_key;

    // The page row and the chosen name come back out of the transaction so
    // the returned tree reflects exactly what was committed.
    let outcome: Result<(RawPage, String)> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        if let Err(err) =
          check_submission_unprocessed(&tx, "page_submissions", submission_id)?
        {
          return Ok(Err(err));
        }

        let page: Option<RawPage> = tx
          .query_row(
            &format!("SELECT {PAGE_COLUMNS} FROM pages WHERE page_id = ?1"),
            rusqlite::params![page_key],
            raw_page,
          )
          .optional()?;
        let Some(page) = page else {
          return Ok(Err(Error::PageNotFound(page_id)));
        };

        let name = match latest_variant_name(&tx, &page.page_id)? {
          Some(latest) => next_variant_name(&latest),
          None => FIRST_VARIANT_NAME.to_string(),
        };

        let variant = Variant {
          variant_id,
          page_id,
          name: name.clone(),
          content: content.clone(),
          author_id: author_id.clone(),
          author_name: author_name.clone(),
          visibility: VariantStats::initial().visibility,
          moderation_rating_count: 0,
          moderator_reputation_sum: 0.0,
          rand_key,
          created_at: now,
        };
        insert_variant(&tx, &variant)?;
        insert_options(&tx, &options_for_insert)?;
        bump_story_stats(&tx, &page.story_id)?;
        tx.execute(
          "UPDATE page_submissions SET processed = 1 WHERE submission_id = ?1",
          rusqlite::params![encode_uuid(submission_id)],
        )?;

        tx.commit()?;
        Ok(Ok((page, name)))
      })
      .await
      .map_err(Error::backend)?;

    let (raw_page, name) = outcome?;
    let page = raw_page.into_page()?;

    Ok(PageTree {
      page,
      variant: Variant {
        variant_id,
        page_id,
        name,
        content: input.content,
        author_id: input.author_id,
        author_name: input.author_name,
        visibility: VariantStats::initial().visibility,
        moderation_rating_count: 0,
        moderator_reputation_sum: 0.0,
        rand_key,
        created_at: now,
      },
      options,
    })
  }

  // ── Moderation ────────────────────────────────────────────────────────

  async fn get_assignment<'a>(
    &'a self,
    moderator_id: &'a str,
  ) -> Result<Option<ModeratorAssignment>> {
    let id = moderator_id.to_owned();
    let raw: Option<RawAssignment> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT moderator_id, variant_id, assigned_at
               FROM moderators WHERE moderator_id = ?1",
              rusqlite::params![id],
              |row| {
                Ok(RawAssignment {
                  moderator_id: row.get(0)?,
                  variant_id:   row.get(1)?,
                  assigned_at:  row.get(2)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await
      .map_err(Error::backend)?;

    raw.map(RawAssignment::into_assignment).transpose()
  }

  async fn set_assignment<'a>(
    &'a self,
    moderator_id: &'a str,
    variant_id: Uuid,
  ) -> Result<()> {
    let id = moderator_id.to_owned();
    let variant = encode_uuid(variant_id);
    let now = encode_dt(Utc::now());
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO moderators (moderator_id, variant_id, assigned_at)
           VALUES (?1, ?2, ?3)
           ON CONFLICT (moderator_id) DO UPDATE
           SET variant_id = excluded.variant_id,
               assigned_at = excluded.assigned_at",
          rusqlite::params![id, variant, now],
        )?;
        Ok(())
      })
      .await
      .map_err(Error::backend)
  }

  async fn record_rating(&self, rating: ModerationRating) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO moderation_ratings
             (rating_id, moderator_id, variant_id, is_approved, rated_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![
            encode_uuid(rating.rating_id),
            rating.moderator_id,
            encode_uuid(rating.variant_id),
            rating.is_approved,
            encode_dt(rating.rated_at),
          ],
        )?;
        tx.execute(
          "UPDATE moderators SET variant_id = NULL WHERE moderator_id = ?1",
          rusqlite::params![rating.moderator_id],
        )?;
        tx.commit()?;
        Ok(())
      })
      .await
      .map_err(Error::backend)
  }

  async fn apply_rating(
    &self,
    variant_id: Uuid,
    is_approved: bool,
  ) -> Result<Option<RatingOutcome>> {
    let id = encode_uuid(variant_id);

    // Read, fold, and write in one transaction so concurrent ratings on
    // the same variant serialize instead of losing updates.
    let raw: Option<(RawVariant, VariantStats)> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let before: Option<RawVariant> = tx
          .query_row(
            &format!(
              "SELECT {VARIANT_COLUMNS} FROM variants WHERE variant_id = ?1"
            ),
            rusqlite::params![id],
            raw_variant,
          )
          .optional()?;
        let Some(before) = before else {
          return Ok(None);
        };

        let after = fold_rating(
          VariantStats {
            visibility:     before.visibility,
            rating_count:   before.rating_count as u32,
            reputation_sum: before.reputation_sum,
          },
          is_approved,
        );

        tx.execute(
          "UPDATE variants
           SET visibility = ?1, rating_count = ?2, reputation_sum = ?3
           WHERE variant_id = ?4",
          rusqlite::params![
            after.visibility,
            i64::from(after.rating_count),
            after.reputation_sum,
            id,
          ],
        )?;

        tx.commit()?;
        Ok(Some((before, after)))
      })
      .await
      .map_err(Error::backend)?;

    let Some((raw_before, after_stats)) = raw else {
      return Ok(None);
    };
    let before = raw_before.into_variant()?;
    let mut after = before.clone();
    after.visibility = after_stats.visibility;
    after.moderation_rating_count = after_stats.rating_count;
    after.moderator_reputation_sum = after_stats.reputation_sum;

    Ok(Some(RatingOutcome { before, after }))
  }

  async fn next_moderation_candidate(
    &self,
    query: CandidateQuery,
  ) -> Result<Option<Variant>> {
    let comparison = match query.side {
      PivotSide::AtOrAbove => ">=",
      PivotSide::Below => "<",
    };
    let rated_filter = if query.zero_rated_only {
      "rating_count = 0 AND "
    } else {
      ""
    };
    let sql = format!(
      "SELECT {VARIANT_COLUMNS} FROM variants
       WHERE {rated_filter}rand_key {comparison} ?1
       ORDER BY rand_key ASC LIMIT 1"
    );
    let pivot = query.pivot;

    let raw: Option<RawVariant> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![pivot], raw_variant)
            .optional()?,
        )
      })
      .await
      .map_err(Error::backend)?;

    raw.map(RawVariant::into_variant).transpose()
  }

  async fn list_variant_ratings(
    &self,
    variant_id: Uuid,
  ) -> Result<Vec<ModerationRating>> {
    let id = encode_uuid(variant_id);
    let raws: Vec<RawRating> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT rating_id, moderator_id, variant_id, is_approved, rated_at
           FROM moderation_ratings WHERE variant_id = ?1 ORDER BY rated_at",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id], |row| {
            Ok(RawRating {
              rating_id:    row.get(0)?,
              moderator_id: row.get(1)?,
              variant_id:   row.get(2)?,
              is_approved:  row.get(3)?,
              rated_at:     row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(Error::backend)?;

    raws.into_iter().map(RawRating::into_rating).collect()
  }

  async fn append_report(&self, report: ModerationReport) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO moderation_reports (report_id, variant_slug, created_at)
           VALUES (?1, ?2, ?3)",
          rusqlite::params![
            encode_uuid(report.report_id),
            report.variant_slug,
            encode_dt(report.created_at),
          ],
        )?;
        Ok(())
      })
      .await
      .map_err(Error::backend)
  }
}
