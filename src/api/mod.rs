//! Tool-invoke entry point.
//!
//! One function takes a JSON parameter map and returns rendered strings.
//! Chunking and rendering are separate stages: the chunking path never sees
//! `include_metadata`, so boundaries are invariant to the rendering mode.

use serde::Deserialize;
use serde_json::Value;

use crate::config::ChunkConfig;
use crate::error::ChunkerError;
use crate::{hierarchy, render, MarkdownChunker};

/// Recognized tool parameters, with the documented defaults. Unknown keys
/// in the map are ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolRequest {
    pub input_text: String,
    pub max_chunk_size: usize,
    pub chunk_overlap: usize,
    pub strategy: String,
    pub include_metadata: bool,
    pub enable_hierarchy: bool,
    pub debug: bool,
    pub leaf_only: bool,
}

impl Default for ToolRequest {
    fn default() -> Self {
        Self {
            input_text: String::new(),
            max_chunk_size: 4096,
            chunk_overlap: 200,
            strategy: "auto".to_string(),
            include_metadata: true,
            enable_hierarchy: false,
            debug: false,
            leaf_only: false,
        }
    }
}

impl ToolRequest {
    fn to_config(&self) -> ChunkConfig {
        ChunkConfig {
            max_chunk_size: self.max_chunk_size,
            overlap_size: self.chunk_overlap,
            strategy_override: self.strategy.clone(),
            validate_invariants: true,
            strict_mode: false,
            ..ChunkConfig::default()
        }
    }
}

/// Entry point for hosts: never fails. An unrecoverable error becomes a
/// single string naming the failure kind.
pub fn invoke(params: &Value) -> Vec<String> {
    match try_invoke(params) {
        Ok(rendered) => rendered,
        Err(err) => {
            tracing::warn!(error = %err, "chunking request failed");
            vec![format!("Error ({}): {err}", err.kind())]
        }
    }
}

/// Entry point with a typed error for strict callers.
pub fn try_invoke(params: &Value) -> Result<Vec<String>, ChunkerError> {
    let request: ToolRequest =
        serde_json::from_value(params.clone()).map_err(|err| ChunkerError::InvalidConfig {
            reason: format!("bad tool parameters: {err}"),
        })?;
    run(&request)
}

/// Run a parsed request through the pipeline and render the output.
pub fn run(request: &ToolRequest) -> Result<Vec<String>, ChunkerError> {
    // Empty input is an empty result, not an error, at the tool boundary.
    if request.input_text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let chunker = MarkdownChunker::new(request.to_config())?;

    // Stage 1: chunking. Does not depend on include_metadata.
    let mut chunks = if request.enable_hierarchy {
        chunker.chunk_hierarchical(&request.input_text)?.chunks
    } else {
        chunker.chunk(&request.input_text)?.chunks
    };

    hierarchy::apply_metadata_defaults(&mut chunks);
    if request.enable_hierarchy {
        chunks = hierarchy::filter_output(chunks, request.debug, request.leaf_only);
    }

    // Stage 2: rendering. Only formatting from here on.
    Ok(render::render_chunks(&chunks, request.include_metadata, request.debug))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_input_returns_empty_list() {
        let out = invoke(&json!({ "input_text": "" }));
        assert!(out.is_empty());
        let out = invoke(&json!({ "input_text": "   \n " }));
        assert!(out.is_empty());
    }

    #[test]
    fn defaults_apply_when_params_are_minimal() {
        let out = invoke(&json!({ "input_text": "# Title\n\nHello world." }));
        assert_eq!(out.len(), 1);
        assert!(out[0].starts_with("<metadata>\n"));
        assert!(out[0].ends_with("# Title\n\nHello world."));
    }

    #[test]
    fn unknown_strategy_becomes_failure_string() {
        let out = invoke(&json!({ "input_text": "# A\n\nbody", "strategy": "quantum" }));
        assert_eq!(out.len(), 1);
        assert!(out[0].starts_with("Error (strategy_not_found)"), "got: {}", out[0]);
    }

    #[test]
    fn unknown_parameters_are_ignored() {
        let out = invoke(&json!({
            "input_text": "# A\n\nbody text",
            "future_flag": true,
            "api_key": "not-a-secret"
        }));
        assert_eq!(out.len(), 1);
        assert!(!out[0].starts_with("Error"));
    }

    #[test]
    fn legacy_mode_has_no_metadata_wrapper() {
        let out = invoke(&json!({
            "input_text": "# Title\n\nHello world.",
            "include_metadata": false
        }));
        assert_eq!(out, vec!["# Title\n\nHello world.".to_string()]);
    }

    #[test]
    fn hierarchy_mode_excludes_root_by_default() {
        let source = "# Top\n\nintro\n\n## A\n\nalpha\n\n## B\n\nbeta\n";
        let normal = invoke(&json!({
            "input_text": source,
            "enable_hierarchy": true
        }));
        for rendered in &normal {
            assert!(!rendered.contains("\"is_root\": true"));
        }

        let debug = invoke(&json!({
            "input_text": source,
            "enable_hierarchy": true,
            "debug": true
        }));
        assert!(debug.len() > normal.len());
        assert!(debug.iter().any(|r| r.contains("\"is_root\": true")));
    }

    #[test]
    fn leaf_only_restricts_hierarchy_output() {
        let source = "# Top\n\nintro\n\n## A\n\nalpha\n\n## B\n\nbeta\n";
        let all = invoke(&json!({ "input_text": source, "enable_hierarchy": true }));
        let leaves = invoke(&json!({
            "input_text": source,
            "enable_hierarchy": true,
            "leaf_only": true
        }));
        assert!(leaves.len() <= all.len());
        assert!(!leaves.is_empty());
    }

    #[test]
    fn indexable_is_stamped_in_hierarchy_mode() {
        let source = "# Top\n\nintro\n\n## A\n\nalpha\n\n## B\n\nbeta\n";
        let out = invoke(&json!({ "input_text": source, "enable_hierarchy": true }));
        assert!(out.iter().any(|r| r.contains("\"indexable\": true")));
    }

    #[test]
    fn bad_parameter_type_is_reported() {
        let out = invoke(&json!({ "input_text": "# A\n\nbody", "max_chunk_size": "big" }));
        assert_eq!(out.len(), 1);
        assert!(out[0].starts_with("Error (invalid_config)"));
    }
}
