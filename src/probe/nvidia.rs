//! NVIDIA detection through `nvidia-smi`.

use tracing::{error, info};

use crate::gpu::device::{mib_to_bytes, Device, Vendor};
use crate::probe::{run_command, Probe, ProbeError};

const QUERY_ARGS: [&str; 2] = [
    "--query-gpu=name,pci.bus_id,memory.free,memory.total",
    "--format=csv,noheader",
];

/// Queries name, bus id, free and total memory for every NVIDIA GPU.
pub struct NvidiaSmiProbe {
    program: String,
}

impl NvidiaSmiProbe {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for NvidiaSmiProbe {
    fn default() -> Self {
        Self::new("nvidia-smi")
    }
}

impl Probe for NvidiaSmiProbe {
    fn name(&self) -> &str {
        "nvidia-smi"
    }

    fn probe(&self) -> Result<Vec<Device>, ProbeError> {
        let stdout = run_command(&self.program, &QUERY_ARGS)?;
        let devices = parse_query_output(&stdout);
        info!(count = devices.len(), "nvidia-smi reported GPUs");
        Ok(devices)
    }
}

/// Parse `name, bus_id, free MiB, total MiB` rows.
///
/// A malformed row is logged and skipped; the other rows still count.
pub fn parse_query_output(stdout: &str) -> Vec<Device> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match parse_row(line) {
            Ok(device) => Some(device),
            Err(e) => {
                error!("Error parsing nvidia-smi output: {e}");
                None
            }
        })
        .collect()
}

fn parse_row(line: &str) -> Result<Device, ProbeError> {
    let malformed = |reason: &str| ProbeError::MalformedRow {
        row: line.to_string(),
        reason: reason.to_string(),
    };

    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    let [name, pci_bus_id, free, total] = fields.as_slice() else {
        return Err(malformed("expected 4 fields"));
    };

    let free = parse_mib(free).ok_or_else(|| malformed("bad memory.free"))?;
    let total = parse_mib(total).ok_or_else(|| malformed("bad memory.total"))?;

    let mut device = Device::new(*name, Vendor::Nvidia, total).with_available_memory(free);
    if !pci_bus_id.is_empty() {
        device = device.with_pci_bus_id(*pci_bus_id);
    }
    Ok(device)
}

/// A `"<n> MiB"` field in bytes.
fn parse_mib(field: &str) -> Option<u64> {
    let mib = field.trim_end_matches("MiB").trim().parse().ok()?;
    mib_to_bytes(mib)
}
