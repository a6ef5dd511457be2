//! Moderator-facing endpoints.
//!
//! | Method | Path                  | Notes |
//! |--------|-----------------------|-------|
//! | `POST` | `/moderation/assign`  | 201 on assignment, 404 when no candidate |
//! | `GET`  | `/moderation/variant` | The open assignment's variant, 404 when none |
//! | `POST` | `/moderation/rating`  | Body `{"isApproved": bool}`; folds and republishes |
//! | `POST` | `/moderation/report`  | Body `{"variant": "12b"}`; no auth, append-only |

use axum::{
  extract::{rejection::JsonRejection, State},
  http::{HeaderMap, StatusCode},
  response::IntoResponse,
  Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use tendril_core::{
  graph::variant_slug,
  moderation::ModerationReport,
  store::StoryStore,
};
use tendril_publish::{ArtifactStore, VariantChange};
use uuid::Uuid;

use crate::{
  auth::{require_user, TokenVerifier},
  error::{ApiError, ApiResult},
  AppState,
};

/// `POST /moderation/assign`
pub async fn assign<S, A, V>(
  State(state): State<AppState<S, A, V>>,
  headers: HeaderMap,
) -> ApiResult<impl IntoResponse>
where
  S: StoryStore + Clone + 'static,
  A: ArtifactStore + 'static,
  V: TokenVerifier + 'static,
{
  let moderator_id = require_user(state.verifier.as_ref(), &headers).await?;

  match state.engine.assign_job(&moderator_id).await? {
    Some(_) => Ok(StatusCode::CREATED),
    None => Err(ApiError::NotFound("No moderation candidate".into())),
  }
}

/// `GET /moderation/variant`
pub async fn current_variant<S, A, V>(
  State(state): State<AppState<S, A, V>>,
  headers: HeaderMap,
) -> ApiResult<Json<Value>>
where
  S: StoryStore + Clone + 'static,
  A: ArtifactStore + 'static,
  V: TokenVerifier + 'static,
{
  let moderator_id = require_user(state.verifier.as_ref(), &headers).await?;
  let store = state.engine.store();

  let assignment = store.get_assignment(&moderator_id).await?;
  let Some(variant_id) = assignment.and_then(|a| a.variant_id) else {
    return Err(ApiError::NotFound("No moderation job".into()));
  };
  let Some(variant) = store.get_variant(variant_id).await? else {
    return Err(ApiError::NotFound("Variant not found".into()));
  };
  let Some(page) = store.get_page(variant.page_id).await? else {
    return Err(ApiError::NotFound("Variant not found".into()));
  };

  let story_title = match store.get_story(page.story_id).await? {
    Some(story) => story.title,
    None => String::new(),
  };

  let mut options = Vec::new();
  for option in store.list_options(variant.variant_id).await? {
    let target_page_number = match option.target_page_id {
      Some(target_id) => store.get_page(target_id).await?.map(|p| p.number),
      None => None,
    };
    options.push(json!({
      "content": option.content,
      "targetPageNumber": target_page_number,
    }));
  }

  Ok(Json(json!({
    "slug": variant_slug(page.number, &variant.name),
    "content": variant.content,
    "storyTitle": story_title,
    "options": options,
  })))
}

/// `POST /moderation/rating`
pub async fn rate<S, A, V>(
  State(state): State<AppState<S, A, V>>,
  headers: HeaderMap,
  body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<impl IntoResponse>
where
  S: StoryStore + Clone + 'static,
  A: ArtifactStore + 'static,
  V: TokenVerifier + 'static,
{
  // The body check runs before auth: a malformed payload is 400 even
  // with a bad token.
  let is_approved = match body {
    Ok(Json(value)) => match value.get("isApproved") {
      Some(Value::Bool(flag)) => *flag,
      _ => {
        return Err(ApiError::BadRequest("Missing or invalid isApproved".into()))
      }
    },
    Err(_) => {
      return Err(ApiError::BadRequest("Missing or invalid isApproved".into()))
    }
  };

  let moderator_id = require_user(state.verifier.as_ref(), &headers).await?;

  let Some(outcome) = state.engine.submit_rating(&moderator_id, is_approved).await?
  else {
    return Err(ApiError::NotFound("No moderation job".into()));
  };

  state
    .publisher
    .handle_variant_write(&VariantChange::updated(
      outcome.before,
      outcome.after,
    ))
    .await?;

  Ok((StatusCode::CREATED, Json(json!({}))))
}

/// `POST /moderation/report`
pub async fn report<S, A, V>(
  State(state): State<AppState<S, A, V>>,
  body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<impl IntoResponse>
where
  S: StoryStore + Clone + 'static,
  A: ArtifactStore + 'static,
  V: TokenVerifier + 'static,
{
  let variant_slug = body
    .ok()
    .and_then(|Json(value)| {
      value.get("variant").and_then(Value::as_str).map(str::trim).and_then(
        |slug| {
          if slug.is_empty() {
            None
          } else {
            Some(slug.to_owned())
          }
        },
      )
    })
    .ok_or_else(|| ApiError::BadRequest("Missing or invalid variant".into()))?;

  state
    .engine
    .store()
    .append_report(ModerationReport {
      report_id: Uuid::new_v4(),
      variant_slug,
      created_at: Utc::now(),
    })
    .await?;

  Ok((StatusCode::CREATED, Json(json!({}))))
}
