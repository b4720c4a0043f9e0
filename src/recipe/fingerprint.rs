//! Deterministic cache-key derivation for recipe requests.
//! Key: blake3 hash of (fruit | style | vegetables | dietary restrictions),
//! each field trimmed and lower-cased, missing optionals as empty strings.

use super::RecipeRequest;

/// Compute the fingerprint for a request.
///
/// Pure and stable across process restarts: no randomness, no time
/// dependence. Two requests differing only in letter case or surrounding
/// whitespace in any field produce the same key; semantically different
/// requests produce different keys.
pub fn generate_key(request: &RecipeRequest) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(normalize(&request.fruit).as_bytes());
    hasher.update(b"|");
    hasher.update(request.style.as_str().as_bytes());
    hasher.update(b"|");
    hasher.update(normalize(request.vegetables.as_deref().unwrap_or("")).as_bytes());
    hasher.update(b"|");
    hasher.update(normalize(request.dietary_restrictions.as_deref().unwrap_or("")).as_bytes());
    hasher.finalize().to_hex().to_string()
}

fn normalize(field: &str) -> String {
    field.trim().to_lowercase()
}
