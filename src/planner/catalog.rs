//! Model catalog.
//!
//! The catalog is an owned store handed to the planner, loaded from a JSON
//! file of the form `{"models": [ ... ]}`.
//!
//! Launcher catalogs (`{"sakura": [ ... ]}`) load too. Their `size` field has
//! no stated unit and is not read, so those entries carry no `size_bytes`
//! and the estimator derives weight memory from `bpw` instead.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Catalog file not found: {0}")]
    FileNotFound(String),

    #[error("Invalid catalog: {0}")]
    InvalidFormat(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Descriptor of one downloadable model artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelProfile {
    /// Repository the artifact is published under.
    pub repo: String,

    /// GGUF file name; the catalog lookup key.
    pub filename: String,

    #[serde(default)]
    pub sha256: String,

    /// Artifact size in bytes.
    #[serde(default)]
    pub size_bytes: u64,

    /// Declared minimum GPU memory in GiB (0 = none declared).
    #[serde(default)]
    pub minimal_gpu_memory_gib: u32,

    /// Hugging Face id of the base model.
    #[serde(default, rename = "base_model_hf")]
    pub base_model_id: String,

    /// Bytes per weight after quantization.
    #[serde(default, rename = "bpw")]
    pub bytes_per_weight: f64,

    /// Cached Hugging Face `config.json` of the base model.
    #[serde(default, rename = "config_cache")]
    pub cached_config: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(alias = "sakura")]
    models: Vec<ModelProfile>,
}

/// Lookup of model profiles by file name.
#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    models: Vec<ModelProfile>,
}

impl ModelCatalog {
    pub fn new(models: Vec<ModelProfile>) -> Self {
        Self { models }
    }

    pub fn from_json(data: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_json::from_str(data)?;
        for model in file.models.iter().filter(|m| m.size_bytes == 0) {
            warn!(
                model = %model.filename,
                bpw = model.bytes_per_weight,
                "Model has no size_bytes, weight memory will be estimated from bytes-per-weight"
            );
        }
        Ok(Self::new(file.models))
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        if !path.exists() {
            return Err(CatalogError::FileNotFound(path.display().to_string()));
        }
        let catalog = Self::from_json(&std::fs::read_to_string(path)?)?;
        info!(path = %path.display(), models = catalog.len(), "Loaded model catalog");
        Ok(catalog)
    }

    /// Find a model by file name.
    pub fn get(&self, name: &str) -> Option<&ModelProfile> {
        self.models.iter().find(|m| m.filename == name)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModelProfile> {
        self.models.iter()
    }
}
