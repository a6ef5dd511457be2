//! SQL schema for the Tendril SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS stories (
    story_id     TEXT PRIMARY KEY,
    title        TEXT NOT NULL,
    root_page_id TEXT NOT NULL,
    created_at   TEXT NOT NULL
);

-- Indirect stats counter; the only thing about a story that changes.
CREATE TABLE IF NOT EXISTS story_stats (
    story_id      TEXT PRIMARY KEY REFERENCES stories(story_id),
    variant_count INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS pages (
    page_id            TEXT PRIMARY KEY,
    story_id           TEXT NOT NULL REFERENCES stories(story_id),
    number             INTEGER NOT NULL UNIQUE,  -- corpus-wide address
    incoming_option_id TEXT,                     -- NULL for root pages
    created_at         TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS variants (
    variant_id     TEXT PRIMARY KEY,
    page_id        TEXT NOT NULL REFERENCES pages(page_id),
    name           TEXT NOT NULL,                -- base-26: a, b, ... z, aa
    content        TEXT NOT NULL,
    author_id      TEXT,
    author_name    TEXT NOT NULL DEFAULT '',
    visibility     REAL NOT NULL DEFAULT 1,
    rating_count   INTEGER NOT NULL DEFAULT 0,
    reputation_sum REAL NOT NULL DEFAULT 0,
    rand_key       REAL NOT NULL,                -- assigner scan cursor
    created_at     TEXT NOT NULL,
    UNIQUE (page_id, name)
);

CREATE TABLE IF NOT EXISTS options (
    option_id      TEXT PRIMARY KEY,
    variant_id     TEXT NOT NULL REFERENCES variants(variant_id),
    content        TEXT NOT NULL,
    position       INTEGER NOT NULL,
    target_page_id TEXT REFERENCES pages(page_id),
    UNIQUE (variant_id, position)
);

-- Submissions are write-once and never deleted; `processed` flips
-- false -> true exactly once and fences redelivered triggers.
CREATE TABLE IF NOT EXISTS story_submissions (
    submission_id TEXT PRIMARY KEY,
    title         TEXT NOT NULL,
    content       TEXT NOT NULL,
    author_name   TEXT NOT NULL,
    author_id     TEXT,
    options       TEXT NOT NULL DEFAULT '[]',    -- JSON array of strings
    processed     INTEGER NOT NULL DEFAULT 0,
    created_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS page_submissions (
    submission_id   TEXT PRIMARY KEY,
    incoming_option TEXT,                        -- compact triplet, e.g. 12-b-3
    page_number     INTEGER,                     -- rewrite target
    content         TEXT NOT NULL,
    author_name     TEXT NOT NULL,
    author_id       TEXT,
    options         TEXT NOT NULL DEFAULT '[]',
    processed       INTEGER NOT NULL DEFAULT 0,
    created_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS moderators (
    moderator_id TEXT PRIMARY KEY,
    variant_id   TEXT,                           -- NULL: no open job
    assigned_at  TEXT NOT NULL
);

-- Ratings are strictly append-only.
-- No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS moderation_ratings (
    rating_id    TEXT PRIMARY KEY,
    moderator_id TEXT NOT NULL,
    variant_id   TEXT NOT NULL,
    is_approved  INTEGER NOT NULL,
    rated_at     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS moderation_reports (
    report_id    TEXT PRIMARY KEY,
    variant_slug TEXT NOT NULL,
    created_at   TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS variants_page_idx    ON variants(page_id);
CREATE INDEX IF NOT EXISTS variants_scan_idx    ON variants(rating_count, rand_key);
CREATE INDEX IF NOT EXISTS options_variant_idx  ON options(variant_id);
CREATE INDEX IF NOT EXISTS ratings_variant_idx  ON moderation_ratings(variant_id);

PRAGMA user_version = 1;
";
