//! Link rewriting: point an anchor's href at the chosen variant.

use crate::{choose, parse_variant_list};

/// The result of rewriting one link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrittenLink {
  /// New href with the final path segment replaced by `{chosen}.html`.
  pub href:   String,
  /// Value for the `data-chosen-variant` attribute.
  pub chosen: String,
}

/// Replace the final path segment of `href` with `{chosen}.html`,
/// preserving any query string or fragment.
pub fn rewrite_href(href: &str, chosen: &str) -> String {
  let suffix_start = href
    .find(|c| c == '?' || c == '#')
    .unwrap_or(href.len());
  let (path, suffix) = href.split_at(suffix_start);

  let replaced = match path.rfind('/') {
    Some(slash) => format!("{}/{}.html", &path[..slash], chosen),
    None => format!("{chosen}.html"),
  };

  format!("{replaced}{suffix}")
}

/// The whole per-link flow: parse the attribute, pick a variant with the
/// supplied uniform draw, rewrite the href. Returns `None` when the
/// attribute is empty, malformed, or carries no positive weight — the
/// link then keeps its static target.
pub fn rewrite_link(href: &str, attr: &str, draw: f64) -> Option<RewrittenLink> {
  let variants = parse_variant_list(attr);
  if variants.is_empty() {
    return None;
  }
  let chosen = choose(&variants, draw)?.to_owned();

  Some(RewrittenLink { href: rewrite_href(href, &chosen), chosen })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn replaces_the_final_path_segment() {
    assert_eq!(rewrite_href("/p/13a.html", "13b"), "/p/13b.html");
    assert_eq!(rewrite_href("/deep/nested/7a.html", "7c"), "/deep/nested/7c.html");
  }

  #[test]
  fn preserves_query_and_fragment() {
    assert_eq!(
      rewrite_href("/p/13a.html?from=12", "13b"),
      "/p/13b.html?from=12"
    );
    assert_eq!(rewrite_href("/p/13a.html#top", "13b"), "/p/13b.html#top");
  }

  #[test]
  fn bare_relative_hrefs_are_replaced_entirely() {
    assert_eq!(rewrite_href("13a.html", "13b"), "13b.html");
  }

  #[test]
  fn rewrite_link_picks_and_records_a_variant() {
    let link = rewrite_link("/p/13a.html", "13a:1,13b:3", 0.9).unwrap();
    assert_eq!(link.chosen, "13b");
    assert_eq!(link.href, "/p/13b.html");
  }

  #[test]
  fn rewrite_link_leaves_weightless_links_alone() {
    assert_eq!(rewrite_link("/p/13a.html", "", 0.5), None);
    assert_eq!(rewrite_link("/p/13a.html", "13a:0,13b:0", 0.5), None);
  }
}
