//! Pretrained BERT toxicity classifier via Candle

use async_trait::async_trait;
use candle_core::{DType, Device, Module, Tensor, D};
use candle_nn::{Linear, VarBuilder};
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use commentguard_core::{Error, Result};
use hf_hub::{api::sync::Api, Repo, RepoType};
use std::path::PathBuf;
use tokenizers::{Tokenizer, TruncationParams};
use tracing::{debug, info};

use crate::config::{DeviceSpec, TransformerConfig};
use crate::scorer::Scorer;

/// BERT sequence classifier whose toxic-label probability is the score
pub struct TransformerScorer {
    name: String,
    tokenizer: Tokenizer,
    model: BertModel,
    pooler: Linear,
    classifier: Linear,
    device: Device,
    toxic_index: Option<usize>,
}

struct ModelFiles {
    config: PathBuf,
    tokenizer: PathBuf,
    weights: PathBuf,
}

impl TransformerScorer {
    /// Load the model from a local directory or the Hugging Face hub
    pub fn load(config: &TransformerConfig) -> Result<Self> {
        let files = Self::resolve_files(config)?;

        let raw_config = std::fs::read_to_string(&files.config)
            .map_err(|e| Error::scorer_unavailable(format!("Failed to read model config: {}", e)))?;
        let bert_config: BertConfig = serde_json::from_str(&raw_config)
            .map_err(|e| Error::scorer_unavailable(format!("Failed to parse model config: {}", e)))?;
        let labels = Self::labels(&raw_config)?;
        let toxic_index = Self::toxic_index(&labels, &config.toxic_label);

        let max_length = config.max_length.max(2);
        let mut tokenizer = Tokenizer::from_file(&files.tokenizer)
            .map_err(|e| Error::scorer_unavailable(format!("Failed to load tokenizer: {}", e)))?;
        Self::truncate_to(&mut tokenizer, max_length)?;

        let device = Self::create_device(config.device)?;
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[files.weights], DType::F32, &device)
                .map_err(|e| Error::scorer_unavailable(format!("Failed to load weights: {}", e)))?
        };

        let hidden = bert_config.hidden_size;
        let model = BertModel::load(vb.pp("bert"), &bert_config)
            .map_err(|e| Error::scorer_unavailable(format!("Failed to load BERT model: {}", e)))?;
        let pooler = candle_nn::linear(hidden, hidden, vb.pp("bert.pooler.dense"))
            .map_err(|e| Error::scorer_unavailable(format!("Failed to load pooler: {}", e)))?;
        let classifier = candle_nn::linear(hidden, labels.len(), vb.pp("classifier"))
            .map_err(|e| Error::scorer_unavailable(format!("Failed to load classifier head: {}", e)))?;

        info!(
            repo = %config.repo_id,
            labels = labels.len(),
            toxic_index = ?toxic_index,
            "Loaded transformer toxicity model"
        );

        Ok(Self {
            name: "transformer".to_string(),
            tokenizer,
            model,
            pooler,
            classifier,
            device,
            toxic_index,
        })
    }

    fn resolve_files(config: &TransformerConfig) -> Result<ModelFiles> {
        if let Some(dir) = &config.local_dir {
            let files = ModelFiles {
                config: dir.join("config.json"),
                tokenizer: dir.join("tokenizer.json"),
                weights: dir.join("model.safetensors"),
            };
            for path in [&files.config, &files.tokenizer, &files.weights] {
                if !path.exists() {
                    return Err(Error::scorer_unavailable(format!(
                        "Model file not found: {:?}",
                        path
                    )));
                }
            }
            return Ok(files);
        }

        let api = Api::new()
            .map_err(|e| Error::scorer_unavailable(format!("Failed to initialize HF API: {}", e)))?;
        let repo = api.repo(Repo::with_revision(
            config.repo_id.clone(),
            RepoType::Model,
            config.revision.clone(),
        ));
        let get = |file: &str| {
            repo.get(file).map_err(|e| {
                Error::scorer_unavailable(format!("Failed to download {} from HF: {}", file, e))
            })
        };

        Ok(ModelFiles {
            config: get("config.json")?,
            tokenizer: get("tokenizer.json")?,
            weights: get("model.safetensors")?,
        })
    }

    /// Labels in class-index order from the `id2label` map
    fn labels(raw_config: &str) -> Result<Vec<String>> {
        let value: serde_json::Value = serde_json::from_str(raw_config)?;
        let Some(map) = value.get("id2label").and_then(|v| v.as_object()) else {
            return Ok(vec!["LABEL_0".to_string(), "LABEL_1".to_string()]);
        };

        let mut labels = vec![String::new(); map.len()];
        for (id, label) in map {
            let index: usize = id
                .parse()
                .map_err(|_| Error::scorer_unavailable(format!("Bad id2label key '{}'", id)))?;
            let slot = labels.get_mut(index).ok_or_else(|| {
                Error::scorer_unavailable(format!("id2label index {} out of range", index))
            })?;
            *slot = label.as_str().unwrap_or_default().to_string();
        }
        Ok(labels)
    }

    /// Index of the toxic label, else the second class, else none
    fn toxic_index(labels: &[String], toxic_label: &str) -> Option<usize> {
        labels
            .iter()
            .position(|l| l == toxic_label)
            .or(if labels.len() > 1 { Some(1) } else { None })
    }

    /// Truncate encodings to `max_length` tokens, special tokens included
    fn truncate_to(tokenizer: &mut Tokenizer, max_length: usize) -> Result<()> {
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length,
                ..Default::default()
            }))
            .map_err(|e| Error::scorer_unavailable(format!("Failed to set truncation: {}", e)))?;
        Ok(())
    }

    fn create_device(spec: DeviceSpec) -> Result<Device> {
        match spec {
            DeviceSpec::Cpu => Ok(Device::Cpu),
            DeviceSpec::Cuda => Device::new_cuda(0)
                .map_err(|e| Error::scorer_unavailable(format!("Failed to create CUDA device: {}", e))),
            DeviceSpec::Metal => Device::new_metal(0)
                .map_err(|e| Error::scorer_unavailable(format!("Failed to create Metal device: {}", e))),
        }
    }

    fn score_text(&self, text: &str) -> Result<f32> {
        let Some(toxic_index) = self.toxic_index else {
            return Ok(0.0);
        };

        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| Error::scoring(format!("Tokenization failed: {}", e)))?;
        let ids = encoding.get_ids();

        let probs = self
            .forward(ids, encoding.get_type_ids())
            .map_err(|e| Error::scoring(format!("Model forward pass failed: {}", e)))?;
        debug!(tokens = ids.len(), "Scored text with transformer");

        Ok(probs.get(toxic_index).copied().unwrap_or(0.0))
    }

    fn forward(&self, ids: &[u32], type_ids: &[u32]) -> candle_core::Result<Vec<f32>> {
        let input_ids = Tensor::new(ids, &self.device)?.unsqueeze(0)?;
        let token_type_ids = Tensor::new(type_ids, &self.device)?.unsqueeze(0)?;

        let hidden = self.model.forward(&input_ids, &token_type_ids, None)?;
        let cls = hidden.get(0)?.get(0)?.unsqueeze(0)?;
        let pooled = self.pooler.forward(&cls)?.tanh()?;
        let logits = self.classifier.forward(&pooled)?;
        let probs = candle_nn::ops::softmax(&logits, D::Minus1)?;

        Ok(probs.get(0)?.to_vec1::<f32>()?)
    }
}

#[async_trait]
impl Scorer for TransformerScorer {
    async fn score(&self, texts: &[String]) -> Result<Vec<f32>> {
        texts.iter().map(|t| self.score_text(t)).collect()
    }

    fn name(&self) -> &str {
        &self.name
    }
}
