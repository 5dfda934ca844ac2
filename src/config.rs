//! Runtime configuration for vram-planner.
//!
//! Configuration is loaded from a JSON file or constructed programmatically.
//! Probe program paths, search bounds and selector behaviour live here.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

/// Command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(name = "vram-planner", about = "GPU detection and VRAM capacity planning for LLM servers")]
pub struct Cli {
    /// Path to configuration file (JSON).
    #[arg(short, long, default_value = "vram-planner.json")]
    pub config: PathBuf,

    /// Model catalog file, overriding the configured one.
    #[arg(long)]
    pub catalog: Option<PathBuf>,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(long)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Detect GPUs and print the canonical device map and selection list.
    Detect,

    /// Check whether a GPU can host a model.
    Check {
        /// Device label as printed by `detect` (or a canonical key).
        #[arg(long)]
        gpu: String,

        /// Model file name from the catalog.
        #[arg(long)]
        model: String,

        /// Total context length (needs --parallel too).
        #[arg(long, requires = "parallel")]
        context: Option<u32>,

        /// Number of parallel slots (needs --context too).
        #[arg(long, requires = "context")]
        parallel: Option<u32>,
    },

    /// Recommend the largest context/parallelism that fits a GPU.
    Recommend {
        #[arg(long)]
        gpu: String,

        #[arg(long)]
        model: String,
    },

    /// Print the environment variables binding a launch to a GPU.
    Env {
        #[arg(long)]
        gpu: String,

        /// Position of the GPU in the selection list.
        #[arg(long)]
        index: usize,

        /// Ordinal entered by hand, overriding --index.
        #[arg(long)]
        manual_index: Option<usize>,
    },
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Probe settings.
    pub detection: DetectionConfig,

    /// Recommendation search settings.
    pub planner: PlannerConfig,

    /// Runtime selector settings.
    pub selector: SelectorConfig,

    /// Model catalog location.
    pub catalog: CatalogConfig,
}

/// Probe program locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// nvidia-smi executable.
    pub nvidia_smi: String,

    /// PowerShell executable (Windows probes).
    pub powershell: String,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            nvidia_smi: "nvidia-smi".to_string(),
            powershell: "powershell".to_string(),
        }
    }
}

/// Recommendation search bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Highest parallelism tried.
    pub max_parallel: u32,

    /// Tokens of context guaranteed to each parallel slot.
    pub context_per_slot: u32,

    /// Prompt batch size handed to the memory calculator.
    pub batch_size: u32,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_parallel: 16,
            context_per_slot: 1536,
            batch_size: 512,
        }
    }
}

/// Runtime selector behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Also export `CUDA_DEVICE_ORDER=PCI_BUS_ID` so CUDA numbers devices
    /// the same way the detection pass did.
    pub pci_bus_order: bool,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            pci_bus_order: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Path to the model catalog (JSON).
    pub path: PathBuf,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("models.json"),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file, falling back to defaults for missing fields.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if path.exists() {
            let data = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&data)?;
            Ok(config)
        } else {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            Ok(Config::default())
        }
    }
}
