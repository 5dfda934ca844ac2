//! Recommendation search: the largest parallelism that fits.
//!
//! Each parallel slot is guaranteed `context_per_slot` tokens, so trying
//! parallelism `p` means sizing the model at `context_per_slot × p`. The
//! candidates are walked from the ceiling down and the first fit wins:
//!
//! ```text
//! p = 16 → ctx 24576 → 25.3 GiB  > 24 GiB   ✗
//! p = 15 → ctx 23040 → 23.9 GiB  ≤ 24 GiB   ✓  → {23040, 15}
//! ```
//!
//! When nothing fits, the floor `{context_per_slot, 1}` is returned so the
//! ability check can report the shortfall.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::PlannerConfig;
use crate::planner::calculator::{CalculatorError, MemoryCalculator};
use crate::planner::catalog::ModelProfile;

/// Total context length and number of parallel slots for a server launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendedConfig {
    pub context_length: u32,
    pub parallelism: u32,
}

impl RecommendedConfig {
    pub fn floor(config: &PlannerConfig) -> Self {
        Self {
            context_length: config.context_per_slot,
            parallelism: 1,
        }
    }

    /// Context available to each slot.
    pub fn context_per_slot(&self) -> u32 {
        self.context_length / self.parallelism.max(1)
    }

    /// llama.cpp server arguments for this configuration.
    pub fn server_args(&self) -> Vec<String> {
        vec![
            "-c".to_string(),
            self.context_length.to_string(),
            "-np".to_string(),
            self.parallelism.to_string(),
        ]
    }
}

/// Find the largest parallelism whose memory need fits `available_gib`.
///
/// Calculator failures are returned to the caller, which owns the fallback.
pub fn recommend_config(
    calculator: &dyn MemoryCalculator,
    model: &ModelProfile,
    available_gib: f64,
    config: &PlannerConfig,
) -> Result<RecommendedConfig, CalculatorError> {
    for parallelism in (1..=config.max_parallel).rev() {
        let Some(context_length) = config.context_per_slot.checked_mul(parallelism) else {
            debug!(parallelism, "Context length overflows, skipping");
            continue;
        };
        let required = calculator.calculate(model, context_length)?;

        if required.total_size_gib <= available_gib {
            let best = RecommendedConfig {
                context_length,
                parallelism,
            };
            info!(
                context_length,
                parallelism,
                required_gib = required.total_size_gib,
                available_gib,
                "Recommended config"
            );
            return Ok(best);
        }
        debug!(
            context_length,
            parallelism,
            required_gib = required.total_size_gib,
            "Config does not fit"
        );
    }

    Ok(RecommendedConfig::floor(config))
}
