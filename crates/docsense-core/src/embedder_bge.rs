//! BGE-small sentence embeddings through Candle.
//!
//! Downloads `BAAI/bge-small-en-v1.5` from the HuggingFace hub on first
//! use, mean-pools the encoder output over the attention mask, and
//! L2-normalizes the pooled vector. Inputs are truncated to the model's
//! 512-token window and processed in order-preserving batches.

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config};
use hf_hub::api::sync::Api;
use tokenizers::{PaddingParams, Tokenizer, TruncationParams};

use crate::embedder::EmbedderBackend;
use crate::error::{CoreError, Result};

/// HuggingFace model id.
pub const BGE_MODEL_ID: &str = "BAAI/bge-small-en-v1.5";

/// Output dimension of the BGE-small encoder.
pub const BGE_DIM: usize = 384;

/// Maximum input sequence length.
const MAX_SEQ_LEN: usize = 512;

/// Batch size for embedding calls.
const EMBED_BATCH: usize = 64;

/// Sentence encoder backed by the BGE-small model.
pub struct BgeEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
}

impl std::fmt::Debug for BgeEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BgeEmbedder").finish_non_exhaustive()
    }
}

fn unavailable<E: std::fmt::Display>(err: E) -> CoreError {
    CoreError::EmbedderUnavailable(err.to_string())
}

impl BgeEmbedder {
    /// Fetch model artifacts from the hub and initialize the encoder.
    pub fn load() -> Result<Self> {
        let device = Device::Cpu;
        let api = Api::new().map_err(unavailable)?;
        let repo = api.model(BGE_MODEL_ID.to_string());

        let config_path = repo.get("config.json").map_err(unavailable)?;
        let tokenizer_path = repo.get("tokenizer.json").map_err(unavailable)?;
        let weights_path = repo.get("model.safetensors").map_err(unavailable)?;

        let config: Config = serde_json::from_str(
            &std::fs::read_to_string(config_path).map_err(unavailable)?,
        )
        .map_err(unavailable)?;

        let mut tokenizer = Tokenizer::from_file(tokenizer_path).map_err(unavailable)?;
        tokenizer
            .with_padding(Some(PaddingParams::default()))
            .with_truncation(Some(TruncationParams {
                max_length: MAX_SEQ_LEN,
                ..Default::default()
            }))
            .map_err(unavailable)?;

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, &device)
                .map_err(unavailable)?
        };
        let model = BertModel::load(vb, &config).map_err(unavailable)?;

        Ok(Self {
            model,
            tokenizer,
            device,
        })
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(unavailable)?;

        let ids: Vec<Vec<u32>> = encodings.iter().map(|e| e.get_ids().to_vec()).collect();
        let masks: Vec<Vec<u32>> = encodings
            .iter()
            .map(|e| e.get_attention_mask().to_vec())
            .collect();

        let token_ids = Tensor::new(ids, &self.device).map_err(unavailable)?;
        let attention_mask = Tensor::new(masks, &self.device).map_err(unavailable)?;
        let token_type_ids = token_ids.zeros_like().map_err(unavailable)?;

        let hidden = self
            .model
            .forward(&token_ids, &token_type_ids, Some(&attention_mask))
            .map_err(unavailable)?;

        // Mean-pool over the sequence, weighted by the attention mask.
        let mask = attention_mask
            .to_dtype(DType::F32)
            .map_err(unavailable)?
            .unsqueeze(2)
            .map_err(unavailable)?;
        let summed = hidden
            .broadcast_mul(&mask)
            .map_err(unavailable)?
            .sum(1)
            .map_err(unavailable)?;
        let counts = mask.sum(1).map_err(unavailable)?;
        let pooled = summed.broadcast_div(&counts).map_err(unavailable)?;

        let norm = pooled
            .sqr()
            .map_err(unavailable)?
            .sum_keepdim(1)
            .map_err(unavailable)?
            .sqrt()
            .map_err(unavailable)?;
        let normalized = pooled.broadcast_div(&norm).map_err(unavailable)?;

        normalized.to_vec2::<f32>().map_err(unavailable)
    }
}

impl EmbedderBackend for BgeEmbedder {
    fn dim(&self) -> usize {
        BGE_DIM
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(EMBED_BATCH) {
            vectors.extend(self.embed_batch(batch)?);
        }
        Ok(vectors)
    }

    fn name(&self) -> &'static str {
        "bge-small"
    }
}
