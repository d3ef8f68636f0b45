//! Identifier generation for rooms, documents, and slugs.

use rand::Rng;
use uuid::Uuid;

/// Alphabet for public room slugs: lowercase letters and digits that stay
/// unambiguous when a link is read aloud or retyped.
const SLUG_ALPHABET: &[u8] = b"abcdefhjknpstxyz23456789";

/// Length of a generated slug.
const SLUG_LEN: usize = 20;

/// Generate a fresh document identifier.
pub fn new_doc_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Generate a fresh internal room identifier.
///
/// Room ids carry an `rp_` prefix so they are recognizable in stored keys.
pub fn new_room_id() -> String {
    format!("rp_{}", Uuid::new_v4().simple())
}

/// Generate a candidate public slug.
///
/// Uniqueness is not guaranteed here; callers must detect a registry
/// conflict and retry with a fresh candidate.
pub fn new_slug() -> String {
    let mut rng = rand::rng();
    (0..SLUG_LEN)
        .map(|_| SLUG_ALPHABET[rng.random_range(0..SLUG_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs_use_the_restricted_alphabet() {
        let slug = new_slug();
        assert_eq!(slug.len(), SLUG_LEN);
        assert!(slug.bytes().all(|b| SLUG_ALPHABET.contains(&b)));
    }

    #[test]
    fn room_ids_are_prefixed_and_unique() {
        let a = new_room_id();
        let b = new_room_id();
        assert!(a.starts_with("rp_"));
        assert_ne!(a, b);
    }

    #[test]
    fn doc_ids_are_unique() {
        assert_ne!(new_doc_id(), new_doc_id());
    }
}
