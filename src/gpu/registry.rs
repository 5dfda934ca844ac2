//! Canonical device registry.
//!
//! Folds the reports of several probe backends into one `key → Device`
//! map without double-counting a card seen by more than one backend, and
//! keeps per-vendor label lists whose concatenation (NVIDIA, then AMD, then
//! Intel) is the flattened selection order used for runtime ordinals.
//!
//! Platform dispatch:
//!
//! ```text
//! Linux:    live (nvidia-smi)
//! Windows:  static (adapter registry, failure tolerated)
//!           → live (nvidia-smi, authoritative, merges over static)
//!           → order (video controllers, AMD list)
//! other:    nothing
//! ```

use std::collections::HashSet;

use tracing::{error, info, warn};

use crate::config::DetectionConfig;
use crate::gpu::device::{Device, Vendor};
use crate::gpu::label::{display_label, index_from_pci_bus_id, resolve_key};
use crate::gpu::map::{rekey, DeviceMap};
use crate::probe::nvidia::NvidiaSmiProbe;
use crate::probe::windows::{AdapterRegistryProbe, VideoControllerProbe};
use crate::probe::Probe;

/// Host platform, for choosing which probes run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Linux,
    Unsupported,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "linux") {
            Platform::Linux
        } else {
            Platform::Unsupported
        }
    }
}

/// The probes one detection pass runs, by role.
#[derive(Default)]
pub struct DetectionPlan {
    /// Best-effort static properties (total memory only).
    pub static_probe: Option<Box<dyn Probe>>,

    /// Authoritative probe with live memory readings. Rebuilds the NVIDIA list.
    pub live_probe: Option<Box<dyn Probe>>,

    /// Reports AMD devices in runtime ordinal order. Rebuilds the AMD list.
    pub order_probe: Option<Box<dyn Probe>>,
}

impl DetectionPlan {
    pub fn for_platform(platform: Platform, config: &DetectionConfig) -> Self {
        match platform {
            Platform::Linux => Self {
                live_probe: Some(Box::new(NvidiaSmiProbe::new(&config.nvidia_smi))),
                ..Default::default()
            },
            Platform::Windows => Self {
                static_probe: Some(Box::new(AdapterRegistryProbe::new(&config.powershell))),
                live_probe: Some(Box::new(NvidiaSmiProbe::new(&config.nvidia_smi))),
                order_probe: Some(Box::new(VideoControllerProbe::new(&config.powershell))),
            },
            Platform::Unsupported => Self::default(),
        }
    }
}

/// Process-wide view of detected GPUs.
#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    devices: DeviceMap,

    /// `(bus ordinal, label)`. Bus-ordered entries first, sorted; devices
    /// without a bus id follow in report order.
    nvidia: Vec<(Option<u32>, String)>,

    amd: Vec<String>,

    intel: Vec<String>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run detection for the current platform.
    pub fn detect(config: &DetectionConfig) -> Self {
        let platform = Platform::current();
        if platform == Platform::Unsupported {
            warn!("GPU detection is not supported on this platform");
        }
        let mut registry = Self::new();
        registry.run(&DetectionPlan::for_platform(platform, config));
        registry
    }

    /// Run one detection pass, replacing anything detected before.
    pub fn run(&mut self, plan: &DetectionPlan) {
        self.devices.clear();
        self.nvidia.clear();
        self.amd.clear();
        self.intel.clear();

        if let Some(probe) = &plan.static_probe {
            for device in run_guarded(probe.as_ref()) {
                if !self.devices.contains_key(&device.key()) {
                    self.push_label(&device);
                }
                self.ingest(device);
            }
        }

        if let Some(probe) = &plan.live_probe {
            self.nvidia.clear();
            let mut listed = HashSet::new();
            for device in run_guarded(probe.as_ref()) {
                if listed.insert(device.key()) {
                    self.push_label(&device);
                }
                self.ingest(device);
            }
        }

        if let Some(probe) = &plan.order_probe {
            // A successful query owns the AMD list, even when it found none.
            // A failed one leaves the statically derived list in place.
            match probe.probe() {
                Ok(ordered) => {
                    self.amd = ordered.iter().map(|d| d.name.clone()).collect();
                    // No memory figure worth a new entry; only refine known ones.
                    for device in ordered {
                        if let Some(existing) = self.devices.get_mut(&device.key()) {
                            existing.merge_from(&device);
                        }
                    }
                }
                Err(e) => error!(probe = probe.name(), "GPU probe failed: {e}"),
            }
        }

        info!(
            devices = self.devices.len(),
            nvidia = self.nvidia.len(),
            amd = self.amd.len(),
            intel = self.intel.len(),
            "GPU detection complete"
        );
    }

    /// Insert a device, or merge it into the entry with the same key.
    ///
    /// A report carrying a bus id adopts a bus-less entry of the same name,
    /// which is how a static report of the card was keyed.
    pub fn ingest(&mut self, device: Device) {
        let key = device.key();
        if device.bus_id().is_some() && !self.devices.contains_key(&key) {
            let adopt = self
                .devices
                .get(&device.name)
                .is_some_and(|d| d.bus_id().is_none());
            if adopt {
                rekey(&mut self.devices, &device.name, key.clone());
            }
        }
        match self.devices.get_mut(&key) {
            Some(existing) => {
                existing.merge_from(&device);
                info!(key = %key, device = %existing, "Updated GPU");
            }
            None => {
                info!(key = %key, device = %device, "Detected new GPU");
                self.devices.insert(key, device);
            }
        }
    }

    /// Append a device's label to its vendor list.
    pub fn push_label(&mut self, device: &Device) {
        match device.vendor {
            Vendor::Nvidia => match device.bus_id().map(index_from_pci_bus_id) {
                Some(ordinal) => {
                    let label = display_label(device, ordinal);
                    let at = self
                        .nvidia
                        .partition_point(|(o, _)| o.is_some_and(|o| o <= ordinal));
                    self.nvidia.insert(at, (Some(ordinal), label));
                }
                None => self.nvidia.push((None, display_label(device, 0))),
            },
            Vendor::Amd => {
                let ordinal = device.bus_id().map(index_from_pci_bus_id).unwrap_or(0);
                self.amd.push(display_label(device, ordinal));
            }
            Vendor::Intel => {
                let ordinal = device.bus_id().map(index_from_pci_bus_id).unwrap_or(0);
                self.intel.push(display_label(device, ordinal));
            }
            Vendor::Unknown => {}
        }
    }

    pub fn devices(&self) -> &DeviceMap {
        &self.devices
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Device> {
        self.devices.get(key)
    }

    /// Look a device up by label (or key).
    pub fn resolve(&self, label: &str) -> Option<&Device> {
        resolve_key(label, &self.devices).and_then(|key| self.devices.get(&key))
    }

    pub fn resolve_mut(&mut self, label: &str) -> Option<&mut Device> {
        let key = resolve_key(label, &self.devices)?;
        self.devices.get_mut(&key)
    }

    pub fn nvidia_labels(&self) -> Vec<String> {
        self.nvidia.iter().map(|(_, label)| label.clone()).collect()
    }

    pub fn amd_labels(&self) -> &[String] {
        &self.amd
    }

    pub fn intel_labels(&self) -> &[String] {
        &self.intel
    }

    pub fn nvidia_count(&self) -> usize {
        self.nvidia.len()
    }

    /// NVIDIA, then AMD, then Intel labels. A label's position here is the
    /// selection index the runtime selector expects.
    pub fn selection_list(&self) -> Vec<String> {
        self.nvidia
            .iter()
            .map(|(_, label)| label.clone())
            .chain(self.amd.iter().cloned())
            .chain(self.intel.iter().cloned())
            .collect()
    }
}

/// Run a probe, degrading any failure to an empty report.
fn run_guarded(probe: &dyn Probe) -> Vec<Device> {
    match probe.probe() {
        Ok(devices) => devices,
        Err(e) => {
            error!(probe = probe.name(), "GPU probe failed: {e}");
            Vec::new()
        }
    }
}
