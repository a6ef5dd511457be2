//! The reader-facing variant redirect.
//!
//! A rendered option link carries a declarative weighted variant list in
//! its `data-variants` attribute. Once per page load, before the link is
//! clickable, the client picks one variant proportionally to its weight
//! and rewrites the link's final path segment to point at it, recording
//! the choice in `data-chosen-variant`. No network call is involved.
//!
//! This crate is the pure core of that behaviour: attribute parsing,
//! weighted choice (via [`tendril_core::select`]), and link rewriting.
//! The caller supplies the uniform draw, which must come from a
//! cryptographically strong generator
//! ([`tendril_core::random::OsRandomSource`] in production).

pub mod parse;
pub mod rewrite;

pub use parse::{parse_variant_list, WeightedVariant};
pub use rewrite::{rewrite_href, rewrite_link, RewrittenLink};

/// The input attribute on anchor elements.
pub const VARIANTS_ATTRIBUTE: &str = "data-variants";

/// The output attribute recording the selected slug.
pub const CHOSEN_ATTRIBUTE: &str = "data-chosen-variant";

/// Pick a slug from the parsed list, proportionally to weight.
pub fn choose(variants: &[WeightedVariant], draw: f64) -> Option<&str> {
  let pairs: Vec<(&str, f64)> = variants
    .iter()
    .map(|variant| (variant.slug.as_str(), variant.weight))
    .collect();
  tendril_core::select::select_weighted(&pairs, draw).copied()
}
