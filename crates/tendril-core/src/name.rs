//! Base-26 variant name sequence: `a`, `b`, … `z`, `aa`, `ab`, …
//!
//! Names only ever use lowercase `a`–`z`. Incrementing past all-`z` carries
//! into a longer name (`zz` → `aaa`).

/// The name of the first variant on any page.
pub const FIRST_VARIANT_NAME: &str = "a";

/// The name following `name` in the sequence. Anything that is not a
/// non-empty lowercase letter sequence restarts at `a`.
pub fn next_variant_name(name: &str) -> String {
  if name.is_empty() || !name.bytes().all(|b| b.is_ascii_lowercase()) {
    return FIRST_VARIANT_NAME.to_string();
  }

  let mut letters: Vec<u8> = name.bytes().collect();
  for i in (0..letters.len()).rev() {
    if letters[i] < b'z' {
      letters[i] += 1;
      return String::from_utf8(letters).expect("ascii letters");
    }
    letters[i] = b'a';
  }

  // Every position carried: grow by one.
  "a".repeat(name.len() + 1)
}

/// Ordering key for variant names: shorter names sort before longer ones,
/// ties broken lexicographically. Plain string order would put `z` after
/// `aa` and break the sequence past 26 variants.
pub fn name_sequence_key(name: &str) -> (usize, &str) {
  (name.len(), name)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn increments_within_a_width() {
    assert_eq!(next_variant_name("a"), "b");
    assert_eq!(next_variant_name("y"), "z");
    assert_eq!(next_variant_name("ba"), "bb");
  }

  #[test]
  fn carries_into_wider_names() {
    assert_eq!(next_variant_name("z"), "aa");
    assert_eq!(next_variant_name("az"), "ba");
    assert_eq!(next_variant_name("zz"), "aaa");
  }

  #[test]
  fn garbage_restarts_at_a() {
    assert_eq!(next_variant_name(""), "a");
    assert_eq!(next_variant_name("A1"), "a");
  }

  #[test]
  fn sequence_key_orders_z_before_aa() {
    assert!(name_sequence_key("z") < name_sequence_key("aa"));
    assert!(name_sequence_key("aa") < name_sequence_key("ab"));
  }
}
