//! Canonical GPU device records.
//!
//! Every probe backend normalizes its output into [`Device`] before the
//! registry sees it. A device optionally carries the verdict of the most
//! recent capacity check.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Bytes in one GiB.
pub const GIB: u64 = 1024 * 1024 * 1024;

/// Bytes in one MiB.
pub const MIB: u64 = 1024 * 1024;

/// Convert a byte count to (fractional) GiB.
pub fn bytes_to_gib(bytes: u64) -> f64 {
    bytes as f64 / GIB as f64
}

/// Convert a MiB count (as reported by nvidia-smi) to bytes. `None` on overflow.
pub fn mib_to_bytes(mib: u64) -> Option<u64> {
    mib.checked_mul(MIB)
}

/// GPU vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Vendor {
    Nvidia,
    Amd,
    Intel,
    Unknown,
}

impl Vendor {
    /// Classify a vendor from a marketing name.
    ///
    /// Matches are case-insensitive substrings: `NVIDIA`, then `AMD`/`ATI`,
    /// then `INTEL`.
    pub fn from_name(name: &str) -> Self {
        let upper = name.to_uppercase();
        if upper.contains("NVIDIA") {
            Vendor::Nvidia
        } else if upper.contains("AMD") || upper.contains("ATI") {
            Vendor::Amd
        } else if upper.contains("INTEL") {
            Vendor::Intel
        } else {
            Vendor::Unknown
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Vendor::Nvidia => write!(f, "NVIDIA"),
            Vendor::Amd => write!(f, "AMD"),
            Vendor::Intel => write!(f, "INTEL"),
            Vendor::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Fit / no-fit verdict for a device and model.
///
/// `reason` is empty exactly when `is_capable` is true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ability {
    pub is_capable: bool,
    pub reason: String,
}

impl Ability {
    pub fn capable() -> Self {
        Self {
            is_capable: true,
            reason: String::new(),
        }
    }

    pub fn incapable(reason: impl Into<String>) -> Self {
        Self {
            is_capable: false,
            reason: reason.into(),
        }
    }
}

/// One physical GPU.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    /// Vendor-reported marketing name (e.g. "NVIDIA GeForce RTX 4090").
    pub name: String,

    pub vendor: Vendor,

    /// PCI address, `"<domain>:<bus>:<device>.<function>"`.
    pub pci_bus_id: Option<String>,

    /// Dedicated memory capacity in bytes.
    pub total_memory_bytes: u64,

    /// Live free-memory reading in bytes, when the backend can provide one.
    pub available_memory_bytes: Option<u64>,

    /// Verdict of the last capacity check against this device.
    pub last_ability: Option<Ability>,
}

impl Device {
    pub fn new(name: impl Into<String>, vendor: Vendor, total_memory_bytes: u64) -> Self {
        Self {
            name: name.into(),
            vendor,
            pci_bus_id: None,
            total_memory_bytes,
            available_memory_bytes: None,
            last_ability: None,
        }
    }

    pub fn with_pci_bus_id(mut self, pci_bus_id: impl Into<String>) -> Self {
        self.pci_bus_id = Some(pci_bus_id.into());
        self
    }

    pub fn with_available_memory(mut self, bytes: u64) -> Self {
        self.available_memory_bytes = Some(bytes);
        self
    }

    /// Bus id, treating an empty string as absent.
    pub fn bus_id(&self) -> Option<&str> {
        self.pci_bus_id.as_deref().filter(|id| !id.is_empty())
    }

    /// Canonical key: bus id when present, otherwise the name.
    pub fn key(&self) -> String {
        match self.bus_id() {
            Some(id) => id.to_string(),
            None => self.name.clone(),
        }
    }

    /// True when the device carries a live memory reading.
    pub fn has_live_memory(&self) -> bool {
        self.available_memory_bytes.is_some()
    }

    /// Fold a newer report of the same physical device into this one.
    ///
    /// Absent fields are filled from `newer`, a non-zero total from `newer`
    /// replaces ours, and a present field is never cleared.
    pub fn merge_from(&mut self, newer: &Device) {
        if newer.total_memory_bytes != 0 {
            self.total_memory_bytes = newer.total_memory_bytes;
        }
        if newer.available_memory_bytes.is_some() {
            self.available_memory_bytes = newer.available_memory_bytes;
        }
        if self.bus_id().is_none() && newer.bus_id().is_some() {
            self.pci_bus_id = newer.pci_bus_id.clone();
        }
        if self.vendor == Vendor::Unknown {
            self.vendor = newer.vendor;
        }
        if self.name.is_empty() {
            self.name = newer.name.clone();
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {:.2} GiB",
            self.name,
            self.vendor,
            bytes_to_gib(self.total_memory_bytes)
        )?;
        if let Some(avail) = self.available_memory_bytes {
            write!(f, " ({:.2} GiB free)", bytes_to_gib(avail))?;
        }
        if let Some(id) = self.bus_id() {
            write!(f, " @ {id}")?;
        }
        Ok(())
    }
}
