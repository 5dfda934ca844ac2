//! Windows display-adapter probes, queried through PowerShell as JSON.
//!
//! - [`AdapterRegistryProbe`] reads the display class registry keys for a
//!   name and a 64-bit dedicated memory size. No live reading, no bus id.
//! - [`VideoControllerProbe`] lists `Win32_VideoController` names and
//!   reports AMD/ATI adapters in *reverse* enumeration order, which is the
//!   order the ROCm runtime numbers them in on that platform.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info};

use crate::gpu::device::{Device, Vendor};
use crate::probe::{run_command, Probe, ProbeError};

const ADAPTER_REGISTRY_QUERY: &str = "Get-ItemProperty -Path \
    'HKLM:\\SYSTEM\\ControlSet001\\Control\\Class\\{4d36e968-e325-11ce-bfc1-08002be10318}\\0*' \
    -ErrorAction SilentlyContinue | \
    Select-Object DriverDesc,'HardwareInformation.qwMemorySize','HardwareInformation.MemorySize' | \
    ConvertTo-Json -Compress";

const VIDEO_CONTROLLER_QUERY: &str =
    "Get-CimInstance Win32_VideoController | Select-Object Name | ConvertTo-Json -Compress";

#[derive(Debug, Deserialize)]
struct AdapterRegistryRecord {
    #[serde(rename = "DriverDesc")]
    driver_desc: Option<String>,

    #[serde(rename = "HardwareInformation.qwMemorySize")]
    qw_memory_size: Option<serde_json::Value>,

    #[serde(rename = "HardwareInformation.MemorySize")]
    memory_size: Option<serde_json::Value>,
}

impl AdapterRegistryRecord {
    fn into_device(self) -> Option<Device> {
        let name = self.driver_desc?.trim().to_string();
        if name.is_empty() {
            return None;
        }
        // qwMemorySize is the full 64-bit figure; MemorySize tops out at 4 GiB.
        let total = self
            .qw_memory_size
            .as_ref()
            .and_then(serde_json::Value::as_u64)
            .or_else(|| self.memory_size.as_ref().and_then(serde_json::Value::as_u64))
            .unwrap_or(0);
        let vendor = Vendor::from_name(&name);
        Some(Device::new(name, vendor, total))
    }
}

#[derive(Debug, Deserialize)]
struct VideoControllerRecord {
    #[serde(rename = "Name")]
    name: Option<String>,
}

/// Static property probe over the display adapter registry keys.
pub struct AdapterRegistryProbe {
    powershell: String,
}

impl AdapterRegistryProbe {
    pub fn new(powershell: impl Into<String>) -> Self {
        Self {
            powershell: powershell.into(),
        }
    }
}

impl Probe for AdapterRegistryProbe {
    fn name(&self) -> &str {
        "adapter-registry"
    }

    fn probe(&self) -> Result<Vec<Device>, ProbeError> {
        let stdout = run_command(
            &self.powershell,
            &["-NoProfile", "-Command", ADAPTER_REGISTRY_QUERY],
        )?;
        parse_adapter_registry(&stdout)
    }
}

/// AMD ordering probe over `Win32_VideoController`.
pub struct VideoControllerProbe {
    powershell: String,
}

impl VideoControllerProbe {
    pub fn new(powershell: impl Into<String>) -> Self {
        Self {
            powershell: powershell.into(),
        }
    }
}

impl Probe for VideoControllerProbe {
    fn name(&self) -> &str {
        "video-controller"
    }

    fn probe(&self) -> Result<Vec<Device>, ProbeError> {
        let stdout = run_command(
            &self.powershell,
            &["-NoProfile", "-Command", VIDEO_CONTROLLER_QUERY],
        )?;
        parse_video_controllers(&stdout)
    }
}

pub fn parse_adapter_registry(stdout: &str) -> Result<Vec<Device>, ProbeError> {
    let records: Vec<AdapterRegistryRecord> = parse_json_records(stdout)?;
    let devices: Vec<Device> = records
        .into_iter()
        .filter_map(AdapterRegistryRecord::into_device)
        .collect();
    info!(count = devices.len(), "Display adapter registry reported GPUs");
    Ok(devices)
}

/// AMD/ATI controllers, reversed relative to the enumeration order.
///
/// Only names are reported. `AdapterRAM` is a 32-bit field and would
/// clobber the registry figure on merge.
pub fn parse_video_controllers(stdout: &str) -> Result<Vec<Device>, ProbeError> {
    let records: Vec<VideoControllerRecord> = parse_json_records(stdout)?;
    let forward: Vec<Device> = records
        .into_iter()
        .filter_map(|r| {
            let name = r.name?.trim().to_string();
            (name.contains("AMD") || name.contains("ATI"))
                .then(|| Device::new(name, Vendor::Amd, 0))
        })
        .collect();

    debug!(
        forward = ?forward.iter().map(|d| d.name.as_str()).collect::<Vec<_>>(),
        "AMD controllers in enumeration order"
    );
    let reversed: Vec<Device> = forward.into_iter().rev().collect();
    info!(
        reversed = ?reversed.iter().map(|d| d.name.as_str()).collect::<Vec<_>>(),
        "AMD controllers in runtime order"
    );
    Ok(reversed)
}

/// `ConvertTo-Json` emits a bare object for one result and an array for
/// several; empty output means no results.
fn parse_json_records<T: DeserializeOwned>(stdout: &str) -> Result<Vec<T>, ProbeError> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    let value: serde_json::Value = serde_json::from_str(trimmed)?;
    let records = match value {
        serde_json::Value::Array(items) => items
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<T>, _>>()?,
        other => vec![serde_json::from_value(other)?],
    };
    Ok(records)
}
