//! Output rendering: metadata mode and legacy embedded-overlap mode.
//!
//! Chunking happens once; this stage only formats. It never changes chunk
//! count, boundaries, or body content, which is what keeps the two modes
//! boundary-invariant. The equivalence law ties them together: joining the
//! non-empty parts `[previous_content, body, next_content]` with a blank
//! line yields exactly the legacy string for the same chunk.

use serde_json::{Map, Value};

use crate::chunk::Chunk;
use crate::utils::join_nonempty;

/// Metadata keys never shown to RAG consumers (raw statistics and
/// diagnostics); prefixes cover the families.
const EXCLUDED_KEYS: &[&str] = &["char_count", "line_count", "word_count", "size_bytes", "item_count", "preamble_type", "preview", "total_chunks"];
const EXCLUDED_PREFIXES: &[&str] = &["avg_", "execution_", "preamble."];

/// Render every chunk in the requested mode.
pub fn render_chunks(chunks: &[Chunk], include_metadata: bool, debug: bool) -> Vec<String> {
    chunks
        .iter()
        .map(|chunk| {
            if include_metadata {
                render_with_metadata(chunk, debug)
            } else {
                render_legacy(chunk)
            }
        })
        .collect()
}

fn render_with_metadata(chunk: &Chunk, debug: bool) -> String {
    let value = serde_json::to_value(&chunk.metadata).unwrap_or_else(|_| Value::Object(Map::new()));
    let mut map = match value {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    if !debug {
        filter_metadata_for_rag(&mut map);
    }
    map.insert("start_line".to_string(), Value::from(chunk.start_line));
    map.insert("end_line".to_string(), Value::from(chunk.end_line));

    let json = serde_json::to_string_pretty(&Value::Object(map))
        .unwrap_or_else(|_| "{}".to_string());
    format!("<metadata>\n{json}\n</metadata>\n{}", chunk.content)
}

fn render_legacy(chunk: &Chunk) -> String {
    let previous = chunk.metadata.previous_content.as_deref().unwrap_or("");
    let next = chunk.metadata.next_content.as_deref().unwrap_or("");
    join_nonempty("\n\n", &[previous, &chunk.content, next])
}

fn filter_metadata_for_rag(map: &mut Map<String, Value>) {
    map.retain(|key, value| {
        if EXCLUDED_KEYS.contains(&key.as_str()) {
            return false;
        }
        if EXCLUDED_PREFIXES.iter().any(|prefix| key.starts_with(prefix)) {
            return false;
        }
        // Hierarchy plumbing is for filters, not for search payloads.
        if key == "is_leaf" || key == "is_root" {
            return false;
        }
        // False flags carry no signal.
        if value == &Value::Bool(false) {
            return false;
        }
        true
    });
}
