//! Form-encoded submission endpoints.
//!
//! | Method | Path            | Notes |
//! |--------|-----------------|-------|
//! | `POST` | `/submit/story` | 201 with echoed normalized fields |
//! | `POST` | `/submit/page`  | Exactly one of `incoming_option` / `page`; 400 on bad targets |
//!
//! Title, author, and options are capped at 120 characters; content is
//! newline-normalized and capped at 10 000. A
//! missing or invalid bearer token demotes the author to anonymous. After
//! the submission record is saved the handler runs the engine pipeline
//! inline and publishes the created variant; redelivery stays safe
//! because processing is fenced on the record's `processed` flag.

use axum::{
  extract::State,
  http::{HeaderMap, StatusCode},
  response::IntoResponse,
  Form, Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tendril_core::{
  store::StoryStore,
  submission::{IncomingOptionRef, PageSubmission, StorySubmission},
};
use tendril_publish::{ArtifactStore, VariantChange};
use uuid::Uuid;

use crate::{
  auth::{optional_user, TokenVerifier},
  error::{ApiError, ApiResult},
  AppState,
};

const SHORT_FIELD_MAX: usize = 120;
const CONTENT_MAX: usize = 10_000;

// ─── Normalization ───────────────────────────────────────────────────────────

fn normalize_short(value: Option<String>, default: &str) -> String {
  let value = value.unwrap_or_default();
  let trimmed = value.trim();
  let base = if trimmed.is_empty() { default } else { trimmed };
  base.chars().take(SHORT_FIELD_MAX).collect()
}

fn normalize_content(value: Option<String>) -> String {
  value
    .unwrap_or_default()
    .replace("\r\n", "\n")
    .replace('\r', "\n")
    .chars()
    .take(CONTENT_MAX)
    .collect()
}

fn collect_options(raw: [Option<String>; 4]) -> Vec<String> {
  raw
    .into_iter()
    .flatten()
    .filter_map(|option| {
      let trimmed: String = option.trim().chars().take(SHORT_FIELD_MAX).collect();
      if trimmed.is_empty() { None } else { Some(trimmed) }
    })
    .collect()
}

// ─── New story ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StoryForm {
  pub title:   Option<String>,
  pub content: Option<String>,
  pub author:  Option<String>,
  pub option0: Option<String>,
  pub option1: Option<String>,
  pub option2: Option<String>,
  pub option3: Option<String>,
}

/// `POST /submit/story`
pub async fn story<S, A, V>(
  State(state): State<AppState<S, A, V>>,
  headers: HeaderMap,
  Form(form): Form<StoryForm>,
) -> ApiResult<impl IntoResponse>
where
  S: StoryStore + Clone + 'static,
  A: ArtifactStore + 'static,
  V: TokenVerifier + 'static,
{
  let title = normalize_short(form.title, "Untitled");
  let content = normalize_content(form.content);
  let author_name = normalize_short(form.author, "???");
  let options =
    collect_options([form.option0, form.option1, form.option2, form.option3]);
  let author_id = optional_user(state.verifier.as_ref(), &headers).await;

  let submission = StorySubmission {
    submission_id: Uuid::new_v4(),
    title: title.clone(),
    content: content.clone(),
    author_name: author_name.clone(),
    author_id,
    options: options.clone(),
    processed: false,
    created_at: Utc::now(),
  };
  state
    .engine
    .store()
    .save_story_submission(submission.clone())
    .await?;

  if let Some(tree) = state
    .engine
    .process_story_submission(submission.submission_id)
    .await?
  {
    state
      .publisher
      .handle_variant_write(&VariantChange::created(tree.variant))
      .await?;
  }

  Ok((
    StatusCode::CREATED,
    Json(json!({
      "id": submission.submission_id,
      "title": title,
      "content": content,
      "author": author_name,
      "options": options,
    })),
  ))
}

// ─── New page ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PageForm {
  pub incoming_option: Option<String>,
  pub page:            Option<String>,
  pub content:         Option<String>,
  pub author:          Option<String>,
  pub option0:         Option<String>,
  pub option1:         Option<String>,
  pub option2:         Option<String>,
  pub option3:         Option<String>,
}

/// The resolved target of a page submission.
enum PageTarget {
  IncomingOption(String),
  PageNumber(u64),
}

/// `POST /submit/page`
pub async fn page<S, A, V>(
  State(state): State<AppState<S, A, V>>,
  headers: HeaderMap,
  Form(form): Form<PageForm>,
) -> ApiResult<impl IntoResponse>
where
  S: StoryStore + Clone + 'static,
  A: ArtifactStore + 'static,
  V: TokenVerifier + 'static,
{
  let incoming_option = normalize_short(form.incoming_option, "");
  let page_str = normalize_short(form.page, "");

  let provided = [&incoming_option, &page_str]
    .iter()
    .filter(|value| !value.is_empty())
    .count();
  if provided != 1 {
    return Err(ApiError::BadRequest(
      "must provide exactly one of incoming option or page".into(),
    ));
  }

  let target = if !incoming_option.is_empty() {
    resolve_incoming_option(&state, &incoming_option).await?
  } else {
    resolve_direct_page(&state, &page_str).await?
  };

  let content = normalize_content(form.content);
  let author_name = normalize_short(form.author, "???");
  let options =
    collect_options([form.option0, form.option1, form.option2, form.option3]);
  let author_id = optional_user(state.verifier.as_ref(), &headers).await;

  let submission = PageSubmission {
    submission_id: Uuid::new_v4(),
    incoming_option: match &target {
      PageTarget::IncomingOption(reference) => Some(reference.clone()),
      PageTarget::PageNumber(_) => None,
    },
    page_number: match &target {
      PageTarget::IncomingOption(_) => None,
      PageTarget::PageNumber(number) => Some(*number),
    },
    content: content.clone(),
    author_name: author_name.clone(),
    author_id,
    options: options.clone(),
    processed: false,
    created_at: Utc::now(),
  };
  state
    .engine
    .store()
    .save_page_submission(submission.clone())
    .await?;

  if let Some(tree) = state
    .engine
    .process_page_submission(submission.submission_id)
    .await?
  {
    state
      .publisher
      .handle_variant_write(&VariantChange::created(tree.variant))
      .await?;
  }

  Ok((
    StatusCode::CREATED,
    Json(json!({
      "id": submission.submission_id,
      "incomingOption": submission.incoming_option,
      "pageNumber": submission.page_number,
      "content": content,
      "author": author_name,
      "options": options,
    })),
  ))
}

/// Validate an incoming-option reference at the HTTP boundary: malformed
/// and dangling references are client errors here, while the engine keeps
/// its own silent-drop fence for redelivered records.
async fn resolve_incoming_option<S, A, V>(
  state: &AppState<S, A, V>,
  reference: &str,
) -> ApiResult<PageTarget>
where
  S: StoryStore + Clone + 'static,
  A: ArtifactStore + 'static,
  V: TokenVerifier + 'static,
{
  let Some(parsed) = IncomingOptionRef::parse(reference) else {
    return Err(ApiError::BadRequest("invalid incoming option".into()));
  };

  let store = state.engine.store();
  let not_found =
    || ApiError::BadRequest("incoming option not found".into());

  let page = store
    .find_page_by_number(parsed.page_number)
    .await?
    .ok_or_else(not_found)?;
  let variant = store
    .find_variant_by_name(page.page_id, &parsed.variant_name)
    .await?
    .ok_or_else(not_found)?;
  store
    .find_option_by_position(variant.variant_id, parsed.option_position)
    .await?
    .ok_or_else(not_found)?;

  Ok(PageTarget::IncomingOption(reference.to_owned()))
}

async fn resolve_direct_page<S, A, V>(
  state: &AppState<S, A, V>,
  page_str: &str,
) -> ApiResult<PageTarget>
where
  S: StoryStore + Clone + 'static,
  A: ArtifactStore + 'static,
  V: TokenVerifier + 'static,
{
  let Ok(number) = page_str.parse::<u64>() else {
    return Err(ApiError::BadRequest("invalid page".into()));
  };

  state
    .engine
    .store()
    .find_page_by_number(number)
    .await?
    .ok_or_else(|| ApiError::BadRequest("page not found".into()))?;

  Ok(PageTarget::PageNumber(number))
}
