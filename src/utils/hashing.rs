//! Stable hashing for block and chunk IDs.

use sha2::{Digest, Sha256};

/// Stable short id for a span of content.
///
/// Hashes the line range plus the first 1000 chars of content (char-boundary
/// safe) so the id survives metadata-only changes downstream.
pub fn stable_hash(content: &str, start_line: usize, end_line: usize) -> String {
    let content_prefix: String = content.chars().take(1000).collect();
    let hash_input = format!("{start_line}-{end_line}:{content_prefix}");
    let mut hasher = Sha256::new();
    hasher.update(hash_input.as_bytes());
    let result = hasher.finalize();
    format!("{result:x}")[..16].to_string()
}
