//! Model memory sizing.
//!
//! The planner only needs "how many GiB does this model take at this context
//! length", behind [`MemoryCalculator`]. [`GgufEstimator`] is the default
//! implementation, driven by the cached Hugging Face config of the base
//! model:
//!
//! ```text
//! weights  = artifact size            (or params × bytes-per-weight)
//! kv_cache = 2 × layers × kv_heads × head_dim × context × 2 bytes (FP16 K+V)
//! compute  = batch × (vocab + context) × 4 bytes
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gpu::device::bytes_to_gib;
use crate::planner::catalog::ModelProfile;

#[derive(Error, Debug)]
pub enum CalculatorError {
    #[error("Model {0} has no cached architecture config")]
    MissingConfig(String),

    #[error("Invalid architecture config: {0}")]
    InvalidConfig(#[from] serde_json::Error),

    #[error("Cannot size model {model}: {reason}")]
    Unsizable { model: String, reason: String },
}

/// Memory needed to serve a model at one context length.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MemoryBreakdown {
    pub model_size_gib: f64,
    pub kv_cache_size_gib: f64,
    pub compute_buffer_gib: f64,
    pub total_size_gib: f64,
}

impl MemoryBreakdown {
    pub fn new(model_size_gib: f64, kv_cache_size_gib: f64, compute_buffer_gib: f64) -> Self {
        Self {
            model_size_gib,
            kv_cache_size_gib,
            compute_buffer_gib,
            total_size_gib: model_size_gib + kv_cache_size_gib + compute_buffer_gib,
        }
    }
}

/// Computes the memory a model needs at a given total context length.
pub trait MemoryCalculator {
    fn calculate(
        &self,
        model: &ModelProfile,
        context_length: u32,
    ) -> Result<MemoryBreakdown, CalculatorError>;
}

/// The subset of a Hugging Face `config.json` the estimate needs.
#[derive(Debug, Clone, Deserialize)]
struct ArchitectureConfig {
    num_hidden_layers: u64,
    num_attention_heads: u64,
    hidden_size: u64,
    vocab_size: u64,
    num_key_value_heads: Option<u64>,
    head_dim: Option<u64>,
}

impl ArchitectureConfig {
    fn head_dim(&self) -> u64 {
        self.head_dim
            .unwrap_or(self.hidden_size / self.num_attention_heads)
    }

    fn kv_heads(&self) -> u64 {
        self.num_key_value_heads.unwrap_or(self.num_attention_heads)
    }

    /// KV cache bytes per token of context (FP16, K+V, all layers).
    /// `None` when the product overflows.
    fn kv_bytes_per_token(&self) -> Option<u64> {
        // K and V, 2 bytes each.
        let per_layer = self.kv_heads().checked_mul(self.head_dim())?.checked_mul(4)?;
        per_layer.checked_mul(self.num_hidden_layers)
    }

    /// Rough dense-transformer parameter count. `None` on overflow.
    fn estimated_params(&self) -> Option<u64> {
        let blocks = 12u64
            .checked_mul(self.num_hidden_layers)?
            .checked_mul(self.hidden_size)?
            .checked_mul(self.hidden_size)?;
        let embeddings = 2u64.checked_mul(self.vocab_size)?.checked_mul(self.hidden_size)?;
        blocks.checked_add(embeddings)
    }
}

/// Architecture-driven estimate for GGUF models served by llama.cpp.
#[derive(Debug, Clone)]
pub struct GgufEstimator {
    batch_size: u32,
}

impl GgufEstimator {
    pub fn new(batch_size: u32) -> Self {
        Self { batch_size }
    }
}

impl Default for GgufEstimator {
    fn default() -> Self {
        Self::new(512)
    }
}

impl MemoryCalculator for GgufEstimator {
    fn calculate(
        &self,
        model: &ModelProfile,
        context_length: u32,
    ) -> Result<MemoryBreakdown, CalculatorError> {
        let raw = model
            .cached_config
            .clone()
            .ok_or_else(|| CalculatorError::MissingConfig(model.filename.clone()))?;
        let arch: ArchitectureConfig = serde_json::from_value(raw)?;

        let unsizable = |reason: &str| CalculatorError::Unsizable {
            model: model.filename.clone(),
            reason: reason.to_string(),
        };
        if arch.num_attention_heads == 0 || arch.num_hidden_layers == 0 {
            return Err(unsizable("zero layers or attention heads"));
        }

        let overflow = || unsizable("architecture figures overflow a byte count");

        let weight_bytes = if model.size_bytes > 0 {
            model.size_bytes
        } else if model.bytes_per_weight > 0.0 {
            let params = arch.estimated_params().ok_or_else(overflow)?;
            // Float to int casts saturate.
            (params as f64 * model.bytes_per_weight) as u64
        } else {
            return Err(unsizable("neither size nor bytes-per-weight known"));
        };

        let context = u64::from(context_length);
        let kv_bytes = arch
            .kv_bytes_per_token()
            .and_then(|per_token| per_token.checked_mul(context))
            .ok_or_else(overflow)?;
        let compute_bytes = arch
            .vocab_size
            .checked_add(context)
            .and_then(|tokens| tokens.checked_mul(u64::from(self.batch_size)))
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(overflow)?;

        Ok(MemoryBreakdown::new(
            bytes_to_gib(weight_bytes),
            bytes_to_gib(kv_bytes),
            bytes_to_gib(compute_bytes),
        ))
    }
}
