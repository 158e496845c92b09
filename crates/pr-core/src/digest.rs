use sha2::{Digest, Sha256};

/// SHA-256 hex digest of the content's UTF-8 bytes. Two versions with equal
/// content always share a digest, which is what makes duplicate submissions
/// detectable.
pub fn content_digest(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Abbreviated digest used in human-facing change descriptions.
pub fn short_digest(digest: &str) -> &str {
    &digest[..digest.len().min(8)]
}
