//! Scorer and trainer configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Which model backs the scorer adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScorerBackend {
    /// Retrained classifier once one is published, else the transformer
    #[default]
    Auto,
    /// Classifier retrained from the feedback queue
    Artifact,
    /// Pretrained transformer from Hugging Face
    Transformer,
    /// Word-list scorer
    Lexicon,
}

/// Scorer adapter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScorerConfig {
    /// Backend to load
    #[serde(default)]
    pub backend: ScorerBackend,

    /// Directory holding the versioned classifier artifacts
    #[serde(default = "default_models_dir")]
    pub models_dir: PathBuf,

    /// Category treated as non-toxic by the artifact scorer
    #[serde(default = "default_neutral_label")]
    pub neutral_label: String,

    /// Inputs per model call
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Transformer backend settings
    #[serde(default)]
    pub transformer: TransformerConfig,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            backend: ScorerBackend::default(),
            models_dir: default_models_dir(),
            neutral_label: default_neutral_label(),
            batch_size: default_batch_size(),
            transformer: TransformerConfig::default(),
        }
    }
}

/// Transformer backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformerConfig {
    /// Hugging Face repository id
    #[serde(default = "default_repo_id")]
    pub repo_id: String,

    /// Repository revision
    #[serde(default = "default_revision")]
    pub revision: String,

    /// Local directory with config.json, tokenizer.json and
    /// model.safetensors; skips the download when set
    #[serde(default)]
    pub local_dir: Option<PathBuf>,

    /// Label whose probability is the toxicity score
    #[serde(default = "default_toxic_label")]
    pub toxic_label: String,

    /// Maximum tokens per input
    #[serde(default = "default_max_length")]
    pub max_length: usize,

    /// Inference device
    #[serde(default)]
    pub device: DeviceSpec,
}

impl Default for TransformerConfig {
    fn default() -> Self {
        Self {
            repo_id: default_repo_id(),
            revision: default_revision(),
            local_dir: None,
            toxic_label: default_toxic_label(),
            max_length: default_max_length(),
            device: DeviceSpec::default(),
        }
    }
}

/// Device type for inference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeviceSpec {
    /// CPU inference (always available)
    #[default]
    Cpu,
    /// CUDA GPU 0
    Cuda,
    /// Metal (Apple Silicon)
    Metal,
}

/// Trainer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainerConfig {
    /// Vocabulary size cap for the TF-IDF extractor
    #[serde(default = "default_max_features")]
    pub max_features: usize,

    /// Gradient descent iterations
    #[serde(default = "default_max_iter")]
    pub max_iter: usize,

    /// Inverse regularisation strength
    #[serde(default = "default_c")]
    pub c: f64,

    /// Gradient descent step size
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,

    /// Stop once the largest gradient component falls below this
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    /// Features reported per class in the metrics snapshot
    #[serde(default = "default_top_features")]
    pub top_features: usize,

    /// Artifact versions kept on disk after a swap
    #[serde(default = "default_versions_retained")]
    pub versions_retained: usize,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            max_features: default_max_features(),
            max_iter: default_max_iter(),
            c: default_c(),
            learning_rate: default_learning_rate(),
            tolerance: default_tolerance(),
            top_features: default_top_features(),
            versions_retained: default_versions_retained(),
        }
    }
}

fn default_models_dir() -> PathBuf {
    PathBuf::from("./models")
}

fn default_neutral_label() -> String {
    "Neutral".to_string()
}

fn default_batch_size() -> usize {
    8
}

fn default_repo_id() -> String {
    "textdetox/bert-multilingual-toxicity-classifier".to_string()
}

fn default_revision() -> String {
    "main".to_string()
}

fn default_toxic_label() -> String {
    "LABEL_1".to_string()
}

fn default_max_length() -> usize {
    512
}

fn default_max_features() -> usize {
    1000
}

fn default_max_iter() -> usize {
    1000
}

fn default_c() -> f64 {
    1.0
}

fn default_learning_rate() -> f64 {
    0.5
}

fn default_tolerance() -> f64 {
    1e-6
}

fn default_top_features() -> usize {
    5
}

fn default_versions_retained() -> usize {
    3
}
