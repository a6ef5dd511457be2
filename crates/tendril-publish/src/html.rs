//! Pure HTML rendering for variant pages and their alternatives fragment.
//!
//! Everything in this module is a deterministic function of its inputs: no
//! timestamps, no randomness, no store access. Rendering the same inputs
//! twice produces byte-identical documents, which is what makes redundant
//! publishing safe.

use tendril_core::graph::{option_slug, variant_slug};

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// Site-wide routing metadata, fixed at publisher construction.
#[derive(Debug, Clone)]
pub struct SiteMeta {
  /// Shown as the brand and `<title>` prefix.
  pub site_title: String,
}

/// Everything needed to render one variant page.
#[derive(Debug, Clone)]
pub struct VariantPage {
  pub page_number:        u64,
  pub variant_name:       String,
  pub content:            String,
  pub story_title:        String,
  pub author_name:        String,
  /// Root pages show the story title as a heading; continuations don't.
  pub show_title_heading: bool,
  pub parent_url:         Option<String>,
  pub first_page_url:     Option<String>,
  pub options:            Vec<RenderOption>,
}

/// One option link at the foot of a variant page.
#[derive(Debug, Clone)]
pub struct RenderOption {
  pub position: u32,
  pub content:  String,
  /// Resolved target, when a continuation already exists.
  pub target:   Option<OptionTarget>,
}

/// Where a resolved option leads, plus the weighted variant list the
/// reader redirect chooses from.
#[derive(Debug, Clone)]
pub struct OptionTarget {
  pub page_number:  u64,
  /// First visible variant of the target page; `None` when the target has
  /// no visible variant yet.
  pub variant_name: Option<String>,
  /// `(name, weight)` per visible variant, weight = visibility.
  pub variants:     Vec<(String, f64)>,
}

/// One entry of the alternatives fragment.
#[derive(Debug, Clone)]
pub struct AltVariant {
  pub name:    String,
  pub content: String,
}

// ─── Paths ───────────────────────────────────────────────────────────────────

/// Artifact path of a rendered variant page.
pub fn variant_path(page_number: u64, variant_name: &str) -> String {
  format!("p/{page_number}{variant_name}.html")
}

/// Artifact path of a page's alternatives fragment.
pub fn alts_path(page_number: u64) -> String {
  format!("p/{page_number}-alts.html")
}

// ─── Escaping and inline markup ──────────────────────────────────────────────

/// Escape HTML special characters to prevent injection.
pub fn escape_html(text: &str) -> String {
  text
    .replace('&', "&amp;")
    .replace('<', "&lt;")
    .replace('>', "&gt;")
    .replace('"', "&quot;")
    .replace('\'', "&#039;")
}

/// The restricted inline-markdown subset: `**bold**`/`__bold__` and
/// `*em*`/`_em_`, applied after escaping.
fn render_inline_markdown(text: &str) -> String {
  let escaped = escape_html(text);
  let bolded = replace_delimited(&escaped, "**", "strong");
  let bolded = replace_delimited(&bolded, "__", "strong");
  let emphasized = replace_delimited(&bolded, "*", "em");
  replace_delimited(&emphasized, "_", "em")
}

/// Replace non-greedy `{delim}…{delim}` spans with `<tag>…</tag>`.
fn replace_delimited(text: &str, delim: &str, tag: &str) -> String {
  let mut out = String::with_capacity(text.len());
  let mut rest = text;
  while let Some(start) = rest.find(delim) {
    let after_open = &rest[start + delim.len()..];
    let Some(len) = after_open.find(delim) else {
      break;
    };
    out.push_str(&rest[..start]);
    out.push('<');
    out.push_str(tag);
    out.push('>');
    out.push_str(&after_open[..len]);
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
    rest = &after_open[len + delim.len()..];
  }
  out.push_str(rest);
  out
}

fn build_paragraphs(content: &str) -> String {
  content
    .replace("\r\n", "\n")
    .replace('\r', "\n")
    .split('\n')
    .map(|line| format!("<p>{}</p>", render_inline_markdown(line)))
    .collect()
}

// ─── Fragments ───────────────────────────────────────────────────────────────

fn build_option_item(page: &VariantPage, option: &RenderOption) -> String {
  let slug = option_slug(page.page_number, &page.variant_name, option.position);
  let (href, variants_attr) = match &option.target {
    Some(target) => {
      let name = target.variant_name.as_deref().unwrap_or("");
      let href = format!("/p/{}{}.html", target.page_number, name);
      let attr = build_variants_attr(target);
      (href, attr)
    }
    None => (format!("../new-page.html?option={slug}"), String::new()),
  };

  let content = render_inline_markdown(&option.content);
  format!(
    "<li><a class=\"variant-link\" data-link-id=\"{slug}\" \
     href=\"{href}\"{variants_attr}>{content}</a></li>"
  )
}

/// The declarative weighted list the reader redirect consumes:
/// `data-variants="12a:1,12b:0.75"`.
fn build_variants_attr(target: &OptionTarget) -> String {
  if target.variants.is_empty() {
    return String::new();
  }
  let list = target
    .variants
    .iter()
    .map(|(name, weight)| {
      format!("{}:{}", variant_slug(target.page_number, name), weight)
    })
    .collect::<Vec<_>>()
    .join(",");
  format!(" data-variants=\"{}\"", escape_html(&list))
}

fn build_head(site: &SiteMeta, story_title: &str) -> String {
  let head_title = if story_title.is_empty() {
    escape_html(&site.site_title)
  } else {
    format!("{} - {}", escape_html(&site.site_title), escape_html(story_title))
  };
  format!(
    "  <head>\n    <meta charset=\"UTF-8\" />\n    <meta name=\"viewport\" \
     content=\"width=device-width, initial-scale=1\" />\n    \
     <title>{head_title}</title>\n    <link rel=\"icon\" \
     href=\"/favicon.ico\" />\n    <link rel=\"stylesheet\" \
     href=\"/tendril.css\" />\n  </head>"
  )
}

fn build_header(site: &SiteMeta) -> String {
  format!(
    "    <header class=\"site-header\">\n      <a class=\"brand\" \
     href=\"/\">{}</a>\n      <nav class=\"nav-inline\" \
     aria-label=\"Primary\">\n        <a href=\"/new-story.html\">New \
     story</a>\n        <a href=\"/mod.html\">Moderate</a>\n      \
     </nav>\n    </header>",
    escape_html(&site.site_title)
  )
}

fn build_link_paragraph(url: Option<&str>, label: &str) -> String {
  match url {
    Some(url) => format!("<p><a href=\"{url}\">{label}</a></p>"),
    None => String::new(),
  }
}

fn build_author(author_name: &str) -> String {
  if author_name.is_empty() {
    return String::new();
  }
  format!("<p>By {}</p>", escape_html(author_name))
}

fn build_page_nav(page_number: u64) -> String {
  let previous = page_number.saturating_sub(1);
  let next = page_number + 1;
  format!(
    "<p class=\"page-nav\"><a href=\"/p/{previous}a.html\">\u{25c0}</a> \
     {page_number} <a href=\"/p/{next}a.html\">\u{25b6}</a></p>"
  )
}

fn build_report(page_number: u64, variant_name: &str) -> String {
  let slug = variant_slug(page_number, variant_name);
  format!(
    "<p><a id=\"reportLink\" href=\"#\" \
     data-variant=\"{slug}\">\u{2691} Report</a></p>"
  )
}

// ─── Documents ───────────────────────────────────────────────────────────────

/// Render the primary HTML document for one variant.
pub fn build_html(site: &SiteMeta, page: &VariantPage) -> String {
  let title_heading = if page.show_title_heading && !page.story_title.is_empty()
  {
    format!("<h1>{}</h1>", escape_html(&page.story_title))
  } else {
    String::new()
  };
  let paragraphs = build_paragraphs(&page.content);
  let items: String = page
    .options
    .iter()
    .map(|option| build_option_item(page, option))
    .collect();
  let author = build_author(&page.author_name);
  let parent = build_link_paragraph(page.parent_url.as_deref(), "Back");
  let first = build_link_paragraph(page.first_page_url.as_deref(), "First page");
  let rewrite = format!(
    "<p><a href=\"../new-page.html?page={}\">Rewrite</a> <a \
     href=\"./{}-alts.html\">Other variants</a></p>",
    page.page_number, page.page_number
  );
  let nav = build_page_nav(page.page_number);
  let report = build_report(page.page_number, &page.variant_name);

  let main = format!(
    "    <main>{title_heading}{paragraphs}<ol>{items}</ol>\
     {author}{parent}{first}{rewrite}{nav}{report}</main>"
  );

  format!(
    "<!doctype html>\n<html lang=\"en\">\n{}\n  <body>\n{}\n{}\n    <script \
     src=\"/variantRedirect.js\"></script>\n    <script \
     src=\"/report.js\"></script>\n  </body>\n</html>\n",
    build_head(site, &page.story_title),
    build_header(site),
    main,
  )
}

/// Render the alternatives fragment: every visible variant of the page,
/// linked by its first five words.
pub fn build_alts_html(
  site: &SiteMeta,
  page_number: u64,
  variants: &[AltVariant],
) -> String {
  let items: String = variants
    .iter()
    .map(|variant| {
      let words = variant
        .content
        .split_whitespace()
        .take(5)
        .collect::<Vec<_>>()
        .join(" ");
      format!(
        "<li><a href=\"/p/{}{}.html\">{}</a></li>",
        page_number,
        variant.name,
        escape_html(&words)
      )
    })
    .collect();

  format!(
    "<!doctype html>\n<html lang=\"en\">\n{}\n  <body>\n{}\n    \
     <main><ol>{items}</ol></main>\n  </body>\n</html>\n",
    build_head(site, ""),
    build_header(site),
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  fn site() -> SiteMeta {
    SiteMeta { site_title: "Tendril".into() }
  }

  fn simple_page() -> VariantPage {
    VariantPage {
      page_number:        12,
      variant_name:       "b".into(),
      content:            "Once upon a time.\nThe end.".into(),
      story_title:        "A Tale".into(),
      author_name:        "someone".into(),
      show_title_heading: true,
      parent_url:         Some("/p/11a.html".into()),
      first_page_url:     None,
      options:            vec![
        RenderOption {
          position: 0,
          content:  "Go *left*".into(),
          target:   None,
        },
        RenderOption {
          position: 1,
          content:  "Go right".into(),
          target:   Some(OptionTarget {
            page_number:  13,
            variant_name: Some("a".into()),
            variants:     vec![("a".into(), 1.0), ("b".into(), 0.75)],
          }),
        },
      ],
    }
  }

  #[test]
  fn rendering_is_deterministic() {
    let page = simple_page();
    assert_eq!(build_html(&site(), &page), build_html(&site(), &page));
  }

  #[test]
  fn unresolved_options_link_to_the_editor() {
    let html = build_html(&site(), &simple_page());
    assert!(html.contains("href=\"../new-page.html?option=12-b-0\""));
    assert!(html.contains("data-link-id=\"12-b-0\""));
  }

  #[test]
  fn resolved_options_carry_the_weighted_variant_list() {
    let html = build_html(&site(), &simple_page());
    assert!(html.contains("href=\"/p/13a.html\""));
    assert!(html.contains("data-variants=\"13a:1,13b:0.75\""));
  }

  #[test]
  fn content_is_escaped_and_inline_markdown_rendered() {
    let mut page = simple_page();
    page.content = "a <script> & **bold**".into();
    let html = build_html(&site(), &page);
    assert!(html.contains("a &lt;script&gt; &amp; <strong>bold</strong>"));
    assert!(html.contains("Go <em>left</em>"));
  }

  #[test]
  fn continuations_hide_the_title_heading() {
    let mut page = simple_page();
    page.show_title_heading = false;
    let html = build_html(&site(), &page);
    assert!(!html.contains("<h1>"));
    assert!(html.contains("<title>Tendril - A Tale</title>"));
  }

  #[test]
  fn alts_fragment_uses_the_first_five_words() {
    let variants = vec![
      AltVariant {
        name:    "a".into(),
        content: "one two three four five six seven".into(),
      },
      AltVariant { name: "b".into(), content: "short".into() },
    ];
    let html = build_alts_html(&site(), 12, &variants);
    assert!(html.contains("<a href=\"/p/12a.html\">one two three four five</a>"));
    assert!(html.contains("<a href=\"/p/12b.html\">short</a>"));
    assert!(!html.contains("six"));
  }

  #[test]
  fn artifact_paths_are_deterministic() {
    assert_eq!(variant_path(12, "b"), "p/12b.html");
    assert_eq!(alts_path(12), "p/12-alts.html");
  }
}
