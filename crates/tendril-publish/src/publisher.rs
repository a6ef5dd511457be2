//! [`Publisher`] — reacts to variant writes by (re)rendering or removing
//! the variant's public artifacts.

use std::sync::Arc;

use tendril_core::{
  graph::{variant_slug, Page, Variant},
  store::StoryStore,
};
use uuid::Uuid;

use crate::{
  artifact::ArtifactStore,
  html::{
    alts_path, build_alts_html, build_html, variant_path, AltVariant,
    OptionTarget, RenderOption, SiteMeta, VariantPage,
  },
  Result,
};

/// Variants at or above this visibility are rendered; below it their
/// artifacts are removed.
pub const VISIBILITY_THRESHOLD: f64 = 0.5;

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// One write to a variant record, as seen by the trigger: `before` is
/// `None` on create, `after` is `None` on delete.
#[derive(Debug, Clone)]
pub struct VariantChange {
  pub before: Option<Variant>,
  pub after:  Option<Variant>,
}

impl VariantChange {
  pub fn created(after: Variant) -> Self {
    Self { before: None, after: Some(after) }
  }

  pub fn updated(before: Variant, after: Variant) -> Self {
    Self { before: Some(before), after: Some(after) }
  }

  pub fn deleted(before: Variant) -> Self {
    Self { before: Some(before), after: None }
  }
}

/// Routing metadata passed in at construction.
#[derive(Debug, Clone)]
pub struct SiteConfig {
  pub site_title: String,
  /// Optional CDN host for cache invalidation, e.g. `www.example.org`.
  pub cdn_host:   Option<String>,
}

/// Optional side channel notified about changed artifact paths. Not
/// required for correctness.
pub trait CacheInvalidator: Send + Sync {
  fn invalidate(&self, paths: &[String]);
}

// ─── Publisher ───────────────────────────────────────────────────────────────

pub struct Publisher<S, A> {
  store:       S,
  artifacts:   A,
  site:        SiteMeta,
  cdn_host:    Option<String>,
  invalidator: Option<Arc<dyn CacheInvalidator>>,
}

impl<S: StoryStore, A: ArtifactStore> Publisher<S, A> {
  pub fn new(store: S, artifacts: A, config: SiteConfig) -> Self {
    Self {
      store,
      artifacts,
      site: SiteMeta { site_title: config.site_title },
      cdn_host: config.cdn_host,
      invalidator: None,
    }
  }

  pub fn with_invalidator(mut self, invalidator: Arc<dyn CacheInvalidator>) -> Self {
    self.invalidator = Some(invalidator);
    self
  }

  pub fn artifacts(&self) -> &A {
    &self.artifacts
  }

  /// Handle one write to a variant record.
  ///
  /// Deletes and hides (visibility below [`VISIBILITY_THRESHOLD`]) remove
  /// the rendered artifact; everything else re-renders the variant page
  /// and the page's alternatives fragment. Both directions are idempotent,
  /// so redundant delivery of the same change is safe.
  pub async fn handle_variant_write(&self, change: &VariantChange) -> Result<()> {
    match &change.after {
      None => {
        if let Some(before) = &change.before {
          self.remove(before).await?;
        }
        Ok(())
      }
      Some(after) if after.visibility < VISIBILITY_THRESHOLD => {
        self.remove(after).await
      }
      Some(after) => self.render(after).await,
    }
  }

  // ── Removal ───────────────────────────────────────────────────────────

  async fn remove(&self, variant: &Variant) -> Result<()> {
    // Without the owning page there is no path to derive, and therefore
    // nothing that could have been rendered.
    let Some(page) = self.store.get_page(variant.page_id).await? else {
      return Ok(());
    };

    let path = variant_path(page.number, &variant.name);
    self.artifacts.delete(&path).await?;
    tracing::info!(
      slug = %variant_slug(page.number, &variant.name),
      "variant artifact removed"
    );
    self.notify(&[path]);
    Ok(())
  }

  // ── Rendering ─────────────────────────────────────────────────────────

  async fn render(&self, variant: &Variant) -> Result<()> {
    let Some(page) = self.store.get_page(variant.page_id).await? else {
      return Ok(());
    };

    let story_title = match self.store.get_story(page.story_id).await? {
      Some(story) => story.title,
      None => String::new(),
    };

    let options = self.load_options(variant).await?;
    let parent_url = self.resolve_parent_url(&page).await?;
    let first_page_url = self.resolve_first_page_url(&page).await?;

    let rendering = VariantPage {
      page_number: page.number,
      variant_name: variant.name.clone(),
      content: variant.content.clone(),
      story_title,
      author_name: variant.author_name.clone(),
      show_title_heading: page.incoming_option_id.is_none(),
      parent_url,
      first_page_url,
      options,
    };

    let html = build_html(&self.site, &rendering);
    let path = variant_path(page.number, &variant.name);
    self.artifacts.save_html(&path, &html).await?;

    let alts = self.render_alts(&page).await?;
    tracing::info!(
      slug = %variant_slug(page.number, &variant.name),
      "variant rendered"
    );
    self.notify(&[path, alts]);
    Ok(())
  }

  async fn render_alts(&self, page: &Page) -> Result<String> {
    let visible: Vec<AltVariant> = self
      .store
      .list_variants(page.page_id)
      .await?
      .into_iter()
      .filter(|variant| variant.visibility >= VISIBILITY_THRESHOLD)
      .map(|variant| AltVariant { name: variant.name, content: variant.content })
      .collect();

    let html = build_alts_html(&self.site, page.number, &visible);
    let path = alts_path(page.number);
    self.artifacts.save_html(&path, &html).await?;
    Ok(path)
  }

  async fn load_options(&self, variant: &Variant) -> Result<Vec<RenderOption>> {
    let mut rendered = Vec::new();
    for option in self.store.list_options(variant.variant_id).await? {
      let target = match option.target_page_id {
        Some(target_id) => self.resolve_target(target_id).await?,
        None => None,
      };
      rendered.push(RenderOption {
        position: option.position,
        content: option.content,
        target,
      });
    }
    Ok(rendered)
  }

  async fn resolve_target(
    &self,
    target_page_id: Uuid,
  ) -> Result<Option<OptionTarget>> {
    let Some(target_page) = self.store.get_page(target_page_id).await? else {
      return Ok(None);
    };

    let visible: Vec<(String, f64)> = self
      .store
      .list_variants(target_page.page_id)
      .await?
      .into_iter()
      .filter(|variant| variant.visibility >= VISIBILITY_THRESHOLD)
      .map(|variant| (variant.name, variant.visibility))
      .collect();

    Ok(Some(OptionTarget {
      page_number:  target_page.number,
      variant_name: visible.first().map(|(name, _)| name.clone()),
      variants:     visible,
    }))
  }

  /// The page this one continues from, via its incoming option.
  async fn resolve_parent_url(&self, page: &Page) -> Result<Option<String>> {
    let Some(option_id) = page.incoming_option_id else {
      return Ok(None);
    };
    let Some(option) = self.store.get_option(option_id).await? else {
      return Ok(None);
    };
    let Some(parent_variant) =
      self.store.get_variant(option.variant_id).await?
    else {
      return Ok(None);
    };
    let Some(parent_page) =
      self.store.get_page(parent_variant.page_id).await?
    else {
      return Ok(None);
    };
    Ok(Some(format!(
      "/p/{}.html",
      variant_slug(parent_page.number, &parent_variant.name)
    )))
  }

  /// The story's first page, for continuation pages only.
  async fn resolve_first_page_url(&self, page: &Page) -> Result<Option<String>> {
    if page.incoming_option_id.is_none() {
      return Ok(None);
    }
    let Some(story) = self.store.get_story(page.story_id).await? else {
      return Ok(None);
    };
    let Some(root_page) = self.store.get_page(story.root_page_id).await? else {
      return Ok(None);
    };
    let Some(first_variant) =
      self.store.first_variant(root_page.page_id).await?
    else {
      return Ok(None);
    };
    Ok(Some(format!(
      "/p/{}.html",
      variant_slug(root_page.number, &first_variant.name)
    )))
  }

  fn notify(&self, paths: &[String]) {
    let Some(invalidator) = &self.invalidator else {
      return;
    };
    let prefixed: Vec<String> = paths
      .iter()
      .map(|path| match &self.cdn_host {
        Some(host) => format!("https://{host}/{path}"),
        None => format!("/{path}"),
      })
      .collect();
    invalidator.invalidate(&prefixed);
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex;

  use chrono::Utc;
  use tendril_core::{
    store::{NewPageVariant, NewStoryTree, StoryTree},
    submission::{PageSubmission, StorySubmission},
  };
  use tendril_store_sqlite::SqliteStore;
  use uuid::Uuid;

  use super::*;
  use crate::MemoryArtifactStore;

  fn publisher(
    store: SqliteStore,
  ) -> Publisher<SqliteStore, MemoryArtifactStore> {
    Publisher::new(
      store,
      MemoryArtifactStore::new(),
      SiteConfig { site_title: "Tendril".into(), cdn_host: None },
    )
  }

  async fn seed_story(store: &SqliteStore, number: u64) -> StoryTree {
    let submission = StorySubmission {
      submission_id: Uuid::new_v4(),
      title:         "T".into(),
      content:       "C".into(),
      author_name:   "???".into(),
      author_id:     None,
      options:       vec!["O1".into(), "O2".into()],
      processed:     false,
      created_at:    Utc::now(),
    };
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

  async fn add_variant(store: &SqliteStore, page_id: Uuid) -> Variant {
    let submission = PageSubmission {
      submission_id:   Uuid::new_v4(),
      incoming_option: None,
      page_number:     Some(1),
      content:         "Rewrite".into(),
      author_name:     "???".into(),
      author_id:       None,
      options:         vec![],
      processed:       false,
      created_at:      Utc::now(),
    };
    store.save_page_submission(submission.clone()).await.unwrap();
    store
      .add_page_variant(NewPageVariant {
        submission_id: submission.submission_id,
        page_id,
        content:       "Rewrite".into(),
        author_name:   "???".into(),
        author_id:     None,
        options:       vec![],
        rand_key:      0.5,
      })
      .await
      .unwrap()
      .variant
  }

  #[tokio::test]
  async fn creating_a_visible_variant_renders_page_and_alts() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let tree = seed_story(&store, 1).await;

    let publisher = publisher(store);
    publisher
      .handle_variant_write(&VariantChange::created(tree.variant.clone()))
      .await
      .unwrap();

    assert_eq!(
      publisher.artifacts().paths(),
      vec!["p/1-alts.html".to_string(), "p/1a.html".to_string()]
    );
    let html = publisher.artifacts().get("p/1a.html").await.unwrap().unwrap();
    assert!(html.contains("<h1>T</h1>"));
    assert!(html.contains("../new-page.html?option=1-a-0"));
  }

  #[tokio::test]
  async fn rendering_twice_is_byte_identical() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let tree = seed_story(&store, 1).await;

    let publisher = publisher(store);
    let change = VariantChange::created(tree.variant.clone());

    publisher.handle_variant_write(&change).await.unwrap();
    let first = publisher.artifacts().get("p/1a.html").await.unwrap().unwrap();
    publisher.handle_variant_write(&change).await.unwrap();
    let second = publisher.artifacts().get("p/1a.html").await.unwrap().unwrap();

    assert_eq!(first, second);
  }

  #[tokio::test]
  async fn dropping_below_threshold_removes_the_artifact() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let tree = seed_story(&store, 1).await;

    let publisher = publisher(store);
    publisher
      .handle_variant_write(&VariantChange::created(tree.variant.clone()))
      .await
      .unwrap();
    assert!(publisher.artifacts().get("p/1a.html").await.unwrap().is_some());

    let mut hidden = tree.variant.clone();
    hidden.visibility = 0.25;
    publisher
      .handle_variant_write(&VariantChange::updated(tree.variant.clone(), hidden))
      .await
      .unwrap();
    assert!(publisher.artifacts().get("p/1a.html").await.unwrap().is_none());
  }

  #[tokio::test]
  async fn deleting_removes_the_artifact_idempotently() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let tree = seed_story(&store, 1).await;

    let publisher = publisher(store);
    let delete = VariantChange::deleted(tree.variant.clone());
    // Never rendered; removal must still succeed, twice.
    publisher.handle_variant_write(&delete).await.unwrap();
    publisher.handle_variant_write(&delete).await.unwrap();
  }

  #[tokio::test]
  async fn hidden_variants_are_excluded_from_the_alts_fragment() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let tree = seed_story(&store, 1).await;
    let second = add_variant(&store, tree.page.page_id).await;

    // A single rejection drives the fresh variant's visibility to zero.
    store
      .apply_rating(second.variant_id, false)
      .await
      .unwrap();

    let publisher = publisher(store);
    publisher
      .handle_variant_write(&VariantChange::created(tree.variant.clone()))
      .await
      .unwrap();

    let alts = publisher
      .artifacts()
      .get("p/1-alts.html")
      .await
      .unwrap()
      .unwrap();
    assert!(alts.contains("/p/1a.html"));
    assert!(!alts.contains("/p/1b.html"));
  }

  #[tokio::test]
  async fn invalidator_receives_changed_paths() {
    struct Recorder(Mutex<Vec<String>>);
    impl CacheInvalidator for Recorder {
      fn invalidate(&self, paths: &[String]) {
        self.0.lock().unwrap().extend_from_slice(paths);
      }
    }

    let store = SqliteStore::open_in_memory().await.unwrap();
    let tree = seed_story(&store, 1).await;

    let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
    let publisher = Publisher::new(
      store,
      MemoryArtifactStore::new(),
      SiteConfig {
        site_title: "Tendril".into(),
        cdn_host:   Some("stories.example.org".into()),
      },
    )
    .with_invalidator(recorder.clone());

    publisher
      .handle_variant_write(&VariantChange::created(tree.variant.clone()))
      .await
      .unwrap();

    let seen = recorder.0.lock().unwrap().clone();
    assert!(seen.contains(&"https://stories.example.org/p/1a.html".to_string()));
    assert!(seen.contains(&"https://stories.example.org/p/1-alts.html".to_string()));
  }
}
