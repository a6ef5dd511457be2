//! Parsing of the declarative `data-variants` attribute.
//!
//! Two forms are accepted: the compact `slug:weight,slug:weight` string
//! and a JSON array of `{"slug": …, "w": …}` objects. Parsing is
//! tolerant: malformed input yields an empty list rather than an error,
//! since a reader-facing link must degrade to its static href.

use serde::Deserialize;

/// One competing variant of a link target.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedVariant {
  pub slug:   String,
  /// Non-finite or non-positive weights are carried through and filtered
  /// by the selector.
  pub weight: f64,
}

#[derive(Deserialize)]
struct JsonVariant {
  slug: Option<String>,
  w:    Option<f64>,
}

/// Parse a `data-variants` attribute value.
pub fn parse_variant_list(attr: &str) -> Vec<WeightedVariant> {
  let trimmed = attr.trim();
  if trimmed.is_empty() {
    return Vec::new();
  }

  if trimmed.starts_with('[') || trimmed.starts_with('{') {
    parse_json(trimmed)
  } else {
    parse_compact(trimmed)
  }
}

fn parse_json(trimmed: &str) -> Vec<WeightedVariant> {
  let Ok(entries) = serde_json::from_str::<Vec<JsonVariant>>(trimmed) else {
    return Vec::new();
  };

  entries
    .into_iter()
    .filter_map(|entry| {
      let slug = entry.slug?;
      if slug.is_empty() {
        return None;
      }
      Some(WeightedVariant {
        slug,
        weight: entry.w.unwrap_or(f64::NAN),
      })
    })
    .collect()
}

fn parse_compact(trimmed: &str) -> Vec<WeightedVariant> {
  trimmed
    .split(',')
    .filter_map(|pair| {
      let (slug, weight) = match pair.split_once(':') {
        Some((slug, raw)) => {
          (slug.trim(), raw.trim().parse::<f64>().unwrap_or(f64::NAN))
        }
        // A bare slug defaults to weight 1.
        None => (pair.trim(), 1.0),
      };
      if slug.is_empty() {
        return None;
      }
      Some(WeightedVariant { slug: slug.to_owned(), weight })
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_the_compact_form() {
    let variants = parse_variant_list("12a:3,12b:1");
    assert_eq!(variants.len(), 2);
    assert_eq!(variants[0].slug, "12a");
    assert_eq!(variants[0].weight, 3.0);
    assert_eq!(variants[1].slug, "12b");
    assert_eq!(variants[1].weight, 1.0);
  }

  #[test]
  fn bare_slugs_default_to_weight_one() {
    let variants = parse_variant_list("12a,12b:2");
    assert_eq!(variants[0].weight, 1.0);
    assert_eq!(variants[1].weight, 2.0);
  }

  #[test]
  fn unparseable_weights_become_nan() {
    let variants = parse_variant_list("12a:lots");
    assert_eq!(variants.len(), 1);
    assert!(variants[0].weight.is_nan());
  }

  #[test]
  fn parses_the_json_form() {
    let variants =
      parse_variant_list(r#"[{"slug":"12a","w":3},{"slug":"12b","w":0.5}]"#);
    assert_eq!(variants.len(), 2);
    assert_eq!(variants[0].slug, "12a");
    assert_eq!(variants[0].weight, 3.0);
    assert_eq!(variants[1].weight, 0.5);
  }

  #[test]
  fn json_entries_without_slugs_are_dropped() {
    let variants = parse_variant_list(r#"[{"w":3},{"slug":"12b"}]"#);
    assert_eq!(variants.len(), 1);
    assert_eq!(variants[0].slug, "12b");
    assert!(variants[0].weight.is_nan());
  }

  #[test]
  fn garbage_yields_an_empty_list() {
    assert!(parse_variant_list("").is_empty());
    assert!(parse_variant_list("   ").is_empty());
    assert!(parse_variant_list("[not json").is_empty());
    assert!(parse_variant_list(",,,").is_empty());
  }
}
