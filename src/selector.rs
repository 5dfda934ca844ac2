//! Runtime selector: binds a launched server process to the chosen GPU.
//!
//! The caller picks a label from the flattened selection list (NVIDIA
//! labels first, then AMD). CUDA takes that position as its ordinal
//! directly; ROCm numbers only AMD devices, so the NVIDIA count is
//! subtracted. This assumes the NVIDIA-then-AMD order of
//! [`DeviceRegistry::selection_list`]; a list ordered any other way makes
//! the AMD ordinal wrong.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::config::SelectorConfig;
use crate::gpu::device::Vendor;
use crate::gpu::registry::DeviceRegistry;

pub const CUDA_VISIBLE_DEVICES: &str = "CUDA_VISIBLE_DEVICES";
pub const HIP_VISIBLE_DEVICES: &str = "HIP_VISIBLE_DEVICES";
pub const CUDA_DEVICE_ORDER: &str = "CUDA_DEVICE_ORDER";

/// Process environment handed to the launched server.
pub type Environment = HashMap<String, String>;

pub struct RuntimeSelector {
    config: SelectorConfig,
}

impl RuntimeSelector {
    pub fn new(config: SelectorConfig) -> Self {
        Self { config }
    }

    /// Set the vendor's visible-devices variable for the GPU at `index` of
    /// the selection list. `manual_index`, when given, replaces `index`.
    ///
    /// Returns false and leaves `env` untouched when the label does not
    /// resolve or the vendor has no runtime variable.
    pub fn apply(
        &self,
        registry: &DeviceRegistry,
        env: &mut Environment,
        label: &str,
        index: usize,
        manual_index: Option<usize>,
    ) -> bool {
        let Some(device) = registry.resolve(label) else {
            warn!(label, "GPU not found, environment unchanged");
            return false;
        };
        let index = manual_index.unwrap_or(index);

        match device.vendor {
            Vendor::Nvidia => {
                if self.config.pci_bus_order {
                    env.insert(CUDA_DEVICE_ORDER.to_string(), "PCI_BUS_ID".to_string());
                }
                env.insert(CUDA_VISIBLE_DEVICES.to_string(), index.to_string());
                info!(value = index, "Set {CUDA_VISIBLE_DEVICES}");
                true
            }
            Vendor::Amd => {
                let ordinal = index as i64 - registry.nvidia_count() as i64;
                if ordinal < 0 {
                    warn!(
                        index,
                        nvidia = registry.nvidia_count(),
                        "AMD selection index falls inside the NVIDIA range"
                    );
                }
                env.insert(HIP_VISIBLE_DEVICES.to_string(), ordinal.to_string());
                info!(value = ordinal, "Set {HIP_VISIBLE_DEVICES}");
                true
            }
            Vendor::Intel | Vendor::Unknown => {
                warn!(label, vendor = %device.vendor, "No runtime device variable for this GPU type");
                false
            }
        }
    }
}
