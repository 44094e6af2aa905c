//! Model descriptor types

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Capability/category tag attached to a model, e.g. `"vision"`,
/// `"embeddings"`, `"reranker"`.
pub type Label = String;

/// Describes one model entry in the catalog, independent of whether it has
/// been downloaded yet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelDescriptor {
    /// Gateway-facing name, e.g. `"Llama-3.1-8B-Instruct-GGUF"`.
    pub name: String,
    /// Upstream repo id, e.g. `"org/repo"`.
    pub checkpoint: String,
    /// Adapter recipe tag, e.g. `"llamabox"` or `"npu"`.
    pub recipe: String,
    pub labels: BTreeSet<Label>,
    pub mmproj: Option<String>,
    pub max_prompt_length: Option<u32>,
    pub size_estimate: Option<u64>,
}

impl ModelDescriptor {
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}

/// Split a `repo_id[:variant]` checkpoint into the hub repo id and the
/// optional tag after the colon (typically a quantization variant like
/// `"Q4_0"`).
pub fn split_checkpoint(checkpoint: &str) -> (&str, Option<&str>) {
    match checkpoint.split_once(':') {
        Some((repo, variant)) => (repo, Some(variant)),
        None => (checkpoint, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> ModelDescriptor {
        ModelDescriptor {
            name: "Test-Model".to_string(),
            checkpoint: "org/repo".to_string(),
            recipe: "llamabox".to_string(),
            labels: BTreeSet::from(["chat".to_string()]),
            mmproj: None,
            max_prompt_length: Some(4096),
            size_estimate: Some(1_000_000),
        }
    }

    #[test]
    fn has_label_true_for_present_label() {
        assert!(descriptor().has_label("chat"));
    }

    #[test]
    fn has_label_false_for_absent_label() {
        assert!(!descriptor().has_label("vision"));
    }

    #[test]
    fn split_checkpoint_separates_variant_suffix() {
        assert_eq!(split_checkpoint("org/repo:Q4_0"), ("org/repo", Some("Q4_0")));
    }

    #[test]
    fn split_checkpoint_without_variant_returns_none() {
        assert_eq!(split_checkpoint("org/repo"), ("org/repo", None));
    }
}
