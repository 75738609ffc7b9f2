//! # Sentence embeddings
//!
//! Text → vector embedding using the all-MiniLM-L6-v2 sentence transformer,
//! run through Candle (pure Rust ML framework) on CPU. Model weights are
//! fetched from the Hugging Face Hub on first use and cached locally.
//!
//! Output vectors are mean-pooled over tokens and L2-normalized, so the inner
//! product of two embeddings is their cosine similarity — which is exactly
//! what [`crate::vector_store::VectorStore`] ranks by. Embedding is
//! deterministic: identical input text yields identical vectors.

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config, DTYPE};
use hf_hub::{Repo, RepoType, api::sync::Api};
use std::error::Error;
use tokenizers::Tokenizer;
use tracing::debug;

/// Output dimension of all-MiniLM-L6-v2. The vector store is opened with
/// this dimension so every embedding it sees lines up.
pub const EMBEDDING_DIM: usize = 384;

const MODEL_ID: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// CPU sentence embedder.
///
/// Construction downloads (or reuses the cached) model config, tokenizer, and
/// safetensors weights, then keeps the loaded model around for the process
/// lifetime — embedding a chunk is cheap once loading is done.
pub struct Embedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
}

impl Embedder {
    /// Load the model from the Hugging Face Hub (or the local cache).
    ///
    /// # Errors
    /// Fails if the hub is unreachable with no cached copy, or if the model
    /// files cannot be parsed.
    pub fn load() -> Result<Self, Box<dyn Error>> {
        let device = Device::Cpu;
        let repo = Repo::with_revision(MODEL_ID.to_string(), RepoType::Model, "main".to_string());
        let api_repo = Api::new()?.repo(repo);

        let config_filename = api_repo.get("config.json")?;
        let tokenizer_filename = api_repo.get("tokenizer.json")?;
        let weights_filename = api_repo.get("model.safetensors")?;
        debug!("Model files resolved for {MODEL_ID}");

        let config: Config = serde_json::from_str(&std::fs::read_to_string(config_filename)?)?;
        let tokenizer = Tokenizer::from_file(tokenizer_filename)
            .map_err(|e| format!("Failed to load tokenizer: {}", e))?;
        let vb =
            unsafe { VarBuilder::from_mmaped_safetensors(&[weights_filename], DTYPE, &device)? };
        let model = BertModel::load(vb, &config)?;

        Ok(Self {
            model,
            tokenizer,
            device,
        })
    }

    /// The dimension of every vector this embedder produces.
    pub fn dimension(&self) -> usize {
        EMBEDDING_DIM
    }

    /// Embed one text into a normalized 384-d vector.
    ///
    /// Input longer than the model's 512-token window is truncated by the
    /// tokenizer.
    ///
    /// # Errors
    /// Propagates tokenization and model inference errors.
    pub fn encode(&self, text: &str) -> Result<Vec<f32>, Box<dyn Error>> {
        let tokens = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| format!("Tokenization error: {}", e))?;

        let token_ids = Tensor::new(tokens.get_ids(), &self.device)?.unsqueeze(0)?;
        let token_type_ids = Tensor::new(tokens.get_type_ids(), &self.device)?.unsqueeze(0)?;

        let output = self.model.forward(&token_ids, &token_type_ids, None)?;
        let pooled = self.mean_pool(&output, tokens.get_attention_mask())?;
        let normalized = l2_normalize(&pooled)?;

        Ok(normalized.to_vec1::<f32>()?)
    }

    /// Embed a batch of texts in order, calling `progress` after each one.
    ///
    /// The ingest pipeline uses the callback to drive its progress bar; pass
    /// `|_| {}` when nobody is watching.
    pub fn encode_batch(
        &self,
        texts: &[String],
        mut progress: impl FnMut(usize),
    ) -> Result<Vec<Vec<f32>>, Box<dyn Error>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for (i, text) in texts.iter().enumerate() {
            vectors.push(self.encode(text)?);
            progress(i + 1);
        }
        Ok(vectors)
    }

    /// Mean pooling over token embeddings, weighted by the attention mask so
    /// padding does not dilute the average.
    fn mean_pool(
        &self,
        embeddings: &Tensor,
        attention_mask: &[u32],
    ) -> Result<Tensor, Box<dyn Error>> {
        // embeddings: [1, seq_len, hidden]; mask must broadcast as [1, seq_len, 1].
        let mask = Tensor::new(attention_mask, &self.device)?
            .to_dtype(DType::F32)?
            .unsqueeze(0)?
            .unsqueeze(2)?;

        let masked = embeddings.broadcast_mul(&mask)?;
        let sum = masked.sum(1)?;
        let count = mask.sum(1)?.clamp(1f32, f32::INFINITY)?;
        let mean = sum.broadcast_div(&count)?;

        Ok(mean.squeeze(0)?)
    }
}

/// Scale a vector to unit length.
fn l2_normalize(tensor: &Tensor) -> Result<Tensor, Box<dyn Error>> {
    let norm = tensor.sqr()?.sum_all()?.sqrt()?;
    Ok(tensor.broadcast_div(&norm)?)
}
