//! Normalized fingerprints for default-value detection.
//!
//! Script fields round-trip through the instance with incidental whitespace
//! and casing differences, so values are normalized (trim, lowercase, all
//! whitespace stripped) before hashing. The tag embeds the normalized
//! length, letting [`matches`] reject clear mismatches without computing a
//! digest.

use sha2::{Digest, Sha256};

const TAG: &str = "sha256";

fn normalize(text: &str) -> String {
    text.trim()
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

/// Tagged digest of the normalized text: `sha256:<len>:<hex>`.
pub fn hash(text: &str) -> String {
    let normalized = normalize(text);
    let digest = Sha256::digest(normalized.as_bytes());
    format!("{}:{}:{:x}", TAG, normalized.len(), digest)
}

/// Whether `text` normalizes to the value `tag` was computed from.
///
/// Returns `false` without computing a digest when the tag's length
/// segment disagrees with the normalized candidate, and for any string
/// that is not a tag produced by [`hash`].
pub fn matches(text: &str, tag: &str) -> bool {
    let mut parts = tag.splitn(3, ':');
    let (Some(prefix), Some(length), Some(digest)) = (parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    if prefix != TAG {
        return false;
    }
    let Ok(length) = length.parse::<usize>() else {
        return false;
    };

    let normalized = normalize(text);
    if normalized.len() != length {
        return false;
    }
    format!("{:x}", Sha256::digest(normalized.as_bytes())) == digest
}
