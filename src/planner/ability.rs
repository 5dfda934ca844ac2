//! Fit / no-fit decisions for a device and a model.
//!
//! Devices with a live free-memory reading are judged dynamically: the
//! calculator sizes the model at the requested (or recommended) context and
//! the requirement is compared with free memory. Devices without one are
//! judged statically against the model's declared minimum. A calculator
//! failure in dynamic mode falls back to the static test.

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::PlannerConfig;
use crate::gpu::device::{bytes_to_gib, Ability, Device, Vendor, GIB};
use crate::gpu::registry::DeviceRegistry;
use crate::planner::calculator::{CalculatorError, MemoryBreakdown, MemoryCalculator};
use crate::planner::catalog::{ModelCatalog, ModelProfile};
use crate::planner::recommend::{recommend_config, RecommendedConfig};

#[derive(Error, Debug)]
pub enum PlanError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    #[error("unknown model: {0}")]
    UnknownModel(String),

    #[error(transparent)]
    Calculator(#[from] CalculatorError),
}

/// A recommended configuration together with what it costs.
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub device: String,
    pub model: String,
    pub available_gib: f64,
    pub config: RecommendedConfig,
    pub memory: MemoryBreakdown,
}

/// Decides whether devices can host models.
pub struct CapacityPlanner<C: MemoryCalculator> {
    config: PlannerConfig,
    catalog: ModelCatalog,
    calculator: C,
}

impl<C: MemoryCalculator> CapacityPlanner<C> {
    pub fn new(config: PlannerConfig, catalog: ModelCatalog, calculator: C) -> Self {
        Self {
            config,
            catalog,
            calculator,
        }
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    /// Check a device (by label) against a model, optionally at a given
    /// `(context_length, parallelism)`. The verdict is cached on the device.
    pub fn check_ability(
        &self,
        registry: &mut DeviceRegistry,
        label: &str,
        model_name: &str,
        context_length: Option<u32>,
        parallelism: Option<u32>,
    ) -> Ability {
        let Some(device) = registry.resolve_mut(label) else {
            let known: Vec<&str> = registry.devices().keys().map(String::as_str).collect();
            error!(label, ?known, "GPU not found");
            return Ability::incapable(format!("device not found: {label}"));
        };

        let ability = if !matches!(device.vendor, Vendor::Nvidia | Vendor::Amd) {
            Ability::incapable(format!(
                "unsupported vendor {}: only NVIDIA and AMD GPUs are supported",
                device.vendor
            ))
        } else if device.has_live_memory() {
            self.check_dynamic(device, model_name, context_length.zip(parallelism))
        } else {
            check_static(device, self.catalog.get(model_name))
        };

        info!(
            device = %device.name,
            model = model_name,
            capable = ability.is_capable,
            "Checked GPU ability"
        );
        device.last_ability = Some(ability.clone());
        ability
    }

    /// Recommend a configuration for a device (by label) and model.
    ///
    /// Uses free memory when the device reports it, otherwise total memory.
    pub fn plan(
        &self,
        registry: &DeviceRegistry,
        label: &str,
        model_name: &str,
    ) -> Result<Plan, PlanError> {
        let device = registry
            .resolve(label)
            .ok_or_else(|| PlanError::DeviceNotFound(label.to_string()))?;
        let model = self
            .catalog
            .get(model_name)
            .ok_or_else(|| PlanError::UnknownModel(model_name.to_string()))?;

        let available_gib = bytes_to_gib(
            device
                .available_memory_bytes
                .unwrap_or(device.total_memory_bytes),
        );
        let config = recommend_config(&self.calculator, model, available_gib, &self.config)?;
        let memory = self.calculator.calculate(model, config.context_length)?;

        Ok(Plan {
            device: device.name.clone(),
            model: model.filename.clone(),
            available_gib,
            config,
            memory,
        })
    }

    fn check_dynamic(
        &self,
        device: &Device,
        model_name: &str,
        requested: Option<(u32, u32)>,
    ) -> Ability {
        let Some(model) = self.catalog.get(model_name) else {
            // Nothing to size an unknown model against.
            return Ability::capable();
        };
        let available_gib = bytes_to_gib(device.available_memory_bytes.unwrap_or(0));
        let total_gib = bytes_to_gib(device.total_memory_bytes);

        match self.required_memory(model, available_gib, requested) {
            Ok(required) if available_gib < required.total_size_gib => Ability::incapable(format!(
                "{}: not enough GPU memory; needs about {:.2} GiB, {:.2} GiB free, {:.2} GiB total",
                device.name, required.total_size_gib, available_gib, total_gib
            )),
            Ok(_) => Ability::capable(),
            Err(e) => {
                warn!("Memory requirement calculation failed, using static minimum: {e}");
                check_static(device, Some(model))
            }
        }
    }

    fn required_memory(
        &self,
        model: &ModelProfile,
        available_gib: f64,
        requested: Option<(u32, u32)>,
    ) -> Result<MemoryBreakdown, CalculatorError> {
        let config = match requested {
            Some((context_length, parallelism)) => RecommendedConfig {
                context_length,
                parallelism,
            },
            None => recommend_config(&self.calculator, model, available_gib, &self.config)?,
        };
        self.calculator.calculate(model, config.context_length)
    }
}

/// Compare total memory with the model's declared minimum.
///
/// Totals above 1 GiB are rounded up to whole GiB, since drivers report
/// e.g. an 8 GiB card as 7.95 GiB.
pub fn check_static(device: &Device, model: Option<&ModelProfile>) -> Ability {
    let total_gib = bytes_to_gib(device.total_memory_bytes);
    let effective_gib = if device.total_memory_bytes > GIB {
        total_gib.ceil()
    } else {
        total_gib
    };

    match model {
        Some(m)
            if m.minimal_gpu_memory_gib != 0
                && effective_gib < f64::from(m.minimal_gpu_memory_gib) =>
        {
            Ability::incapable(format!(
                "{}: not enough GPU memory; needs at least {:.2} GiB, card has {:.2} GiB total",
                device.name,
                f64::from(m.minimal_gpu_memory_gib),
                effective_gib
            ))
        }
        _ => Ability::capable(),
    }
}
