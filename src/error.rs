//! Error taxonomy for the chunking pipeline.

use thiserror::Error;

/// All failure modes of the pipeline, grouped into four families:
/// input validation, strategy execution, data loss, and output validation.
#[derive(Debug, Error)]
pub enum ChunkerError {
    // --- Input validation ---
    #[error("input is empty")]
    EmptyInput,

    #[error("invalid encoding: {reason}")]
    InvalidEncoding { reason: String },

    // --- Strategy execution ---
    #[error("unknown strategy '{name}'")]
    StrategyNotFound { name: String },

    #[error("strategy '{strategy}' failed on content starting with {preview:?}")]
    StrategyFailed {
        strategy: String,
        preview: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("no strategy can handle this content")]
    NoStrategyCanHandle,

    // --- Data loss ---
    #[error("missing content: {missing_blocks} block(s), {missing_chars} char(s) lost")]
    MissingContent {
        missing_blocks: usize,
        missing_chars: usize,
    },

    #[error("incomplete coverage: recall {recall:.3} below threshold, {gap_count} line gap(s)")]
    IncompleteCoverage { recall: f64, gap_count: usize },

    // --- Output validation ---
    #[error("invalid chunk {index}: {reason}")]
    InvalidChunk { index: usize, reason: String },

    #[error("invalid metadata: missing required field '{field}'")]
    InvalidMetadata { field: String },

    // --- Configuration ---
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl ChunkerError {
    /// Short machine-readable kind, used for user-visible failure strings.
    pub fn kind(&self) -> &'static str {
        match self {
            ChunkerError::EmptyInput => "empty_input",
            ChunkerError::InvalidEncoding { .. } => "invalid_encoding",
            ChunkerError::StrategyNotFound { .. } => "strategy_not_found",
            ChunkerError::StrategyFailed { .. } => "strategy_failed",
            ChunkerError::NoStrategyCanHandle => "no_strategy_can_handle",
            ChunkerError::MissingContent { .. } => "missing_content",
            ChunkerError::IncompleteCoverage { .. } => "incomplete_coverage",
            ChunkerError::InvalidChunk { .. } => "invalid_chunk",
            ChunkerError::InvalidMetadata { .. } => "invalid_metadata",
            ChunkerError::InvalidConfig { .. } => "invalid_config",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_name_the_failure() {
        let err = ChunkerError::StrategyNotFound { name: "bogus".to_string() };
        assert!(err.to_string().contains("bogus"));
        assert_eq!(err.kind(), "strategy_not_found");
    }

    #[test]
    fn strategy_failed_carries_cause() {
        use std::error::Error;

        let err = ChunkerError::StrategyFailed {
            strategy: "structural".to_string(),
            preview: "# Intro".to_string(),
            source: anyhow::anyhow!("section tree was empty").into(),
        };
        assert!(err.source().is_some());
        assert!(err.to_string().contains("structural"));
    }

    #[test]
    fn incomplete_coverage_reports_recall() {
        let err = ChunkerError::IncompleteCoverage { recall: 0.5, gap_count: 3 };
        assert!(err.to_string().contains("0.500"));
    }
}
