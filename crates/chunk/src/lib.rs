//! # Text chunking
//!
//! Recursive character splitting ahead of embedding. Long documents are cut
//! into segments of at most `max_length` characters, preferring paragraph
//! breaks, then line breaks, then spaces, then sentence punctuation (ASCII,
//! full-width and ideographic), and finally a hard character cut. Consecutive
//! segments of the same source text share up to `overlap` characters.
//!
//! ```
//! use chunk::chunk;
//!
//! let short = vec!["fits in one piece".to_string()];
//! assert_eq!(chunk(&short, 2000), short);
//!
//! let long = vec!["lorem ipsum ".repeat(400)];
//! let pieces = chunk(&long, 2000);
//! assert!(pieces.len() > 1);
//! assert!(pieces.iter().all(|p| p.chars().count() <= 2000));
//! ```
//!
//! Lengths are measured in Unicode scalar values, never bytes, so CJK input
//! is bounded the same way as ASCII.

mod splitter;

pub use splitter::TextSplitter;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Characters shared between consecutive chunks of one source text.
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;

/// Maximum chunk length applied to tenant-scoped ingestion.
pub const TENANT_MAX_LENGTH: usize = 2000;

/// Boundaries tried in priority order. The trailing empty separator is the
/// hard character cut.
pub const DEFAULT_SEPARATORS: &[&str] = &[
    "\n\n", "\n", " ", ".", ",", "\u{200b}", "\u{ff0c}", "\u{3001}", "\u{ff0e}", "\u{3002}", "",
];

/// Errors raised when a chunking configuration cannot be used as given.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChunkConfigError {
    #[error("max_length must be >= 1")]
    ZeroLength,
    #[error("separator list must not be empty")]
    NoSeparators,
}

/// Splitter configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// Maximum characters per chunk.
    #[serde(default = "default_max_length")]
    pub max_length: usize,
    /// Characters carried over between neighbouring chunks.
    #[serde(default = "default_overlap")]
    pub overlap: usize,
    /// Boundary strings in priority order.
    #[serde(default = "default_separators")]
    pub separators: Vec<String>,
}

impl ChunkConfig {
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length,
            ..Self::default()
        }
    }

    pub fn with_overlap(mut self, overlap: usize) -> Self {
        self.overlap = overlap;
        self
    }

    pub fn with_separators<I, S>(mut self, separators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.separators = separators.into_iter().map(Into::into).collect();
        self
    }

    /// Strict validation for configs loaded from files.
    ///
    /// [`TextSplitter::new`] never fails: it clamps instead.
    pub fn validate(&self) -> Result<(), ChunkConfigError> {
        if self.max_length == 0 {
            return Err(ChunkConfigError::ZeroLength);
        }
        if self.separators.is_empty() {
            return Err(ChunkConfigError::NoSeparators);
        }
        Ok(())
    }
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_length: default_max_length(),
            overlap: default_overlap(),
            separators: default_separators(),
        }
    }
}

fn default_max_length() -> usize {
    TENANT_MAX_LENGTH
}

fn default_overlap() -> usize {
    DEFAULT_CHUNK_OVERLAP
}

fn default_separators() -> Vec<String> {
    DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect()
}

/// Split every text with the default separators and overlap, flattening the
/// chunks in reading order.
pub fn chunk<S: AsRef<str>>(texts: &[S], max_length: usize) -> Vec<String> {
    chunk_with_config(texts, &ChunkConfig::new(max_length))
}

/// Same as [`chunk`] with an explicit configuration.
pub fn chunk_with_config<S: AsRef<str>>(texts: &[S], cfg: &ChunkConfig) -> Vec<String> {
    let splitter = TextSplitter::new(cfg.clone());
    let out: Vec<String> = texts
        .iter()
        .flat_map(|text| splitter.split_text(text.as_ref()))
        .collect();
    tracing::debug!(
        inputs = texts.len(),
        chunks = out.len(),
        max_length = cfg.max_length,
        "chunked texts"
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_inputs_pass_through_in_order() {
        let texts = ["alpha", "  padded  ", ""];
        let out = chunk(&texts, 10);
        assert_eq!(out, vec!["alpha", "  padded  ", ""]);
    }

    #[test]
    fn chunks_from_different_texts_do_not_mix() {
        let a = "a ".repeat(30);
        let b = "b ".repeat(30);
        let out = chunk(&[a, b], 20);
        let first_b = out.iter().position(|c| c.contains('b')).unwrap();
        assert!(out[..first_b].iter().all(|c| !c.contains('b')));
        assert!(out[first_b..].iter().all(|c| !c.contains('a')));
    }

    #[test]
    fn config_defaults_follow_tenant_ingestion() {
        let cfg = ChunkConfig::default();
        assert_eq!(cfg.max_length, 2000);
        assert_eq!(cfg.overlap, 100);
        assert_eq!(cfg.separators.last().map(String::as_str), Some(""));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_rejects_unusable_configs() {
        assert_eq!(
            ChunkConfig::new(0).validate(),
            Err(ChunkConfigError::ZeroLength)
        );
        let no_seps = ChunkConfig::new(10).with_separators(Vec::<String>::new());
        assert_eq!(no_seps.validate(), Err(ChunkConfigError::NoSeparators));
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let cfg: ChunkConfig = serde_json::from_str(r#"{"max_length": 512}"#).unwrap();
        assert_eq!(cfg.max_length, 512);
        assert_eq!(cfg.overlap, DEFAULT_CHUNK_OVERLAP);
        assert_eq!(cfg.separators.len(), DEFAULT_SEPARATORS.len());
    }
}
