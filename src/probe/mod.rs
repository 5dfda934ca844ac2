//! Vendor probe adapters.
//!
//! Each adapter queries one platform/vendor source and normalizes its rows
//! into [`Device`] records at its own boundary:
//! - [`nvidia`]: `nvidia-smi` CSV query (live free memory, bus ids)
//! - [`windows`]: display-adapter registry properties and
//!   `Win32_VideoController` ordering via PowerShell
//!
//! Probes are blocking. The registry wraps every call and treats an error
//! as "this backend found nothing".

pub mod nvidia;
pub mod windows;

use std::process::Command;

use thiserror::Error;
use tracing::debug;

use crate::gpu::device::Device;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("Malformed output row {row:?}: {reason}")]
    MalformedRow { row: String, reason: String },

    #[error("JSON decode failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// A source of raw device reports.
pub trait Probe {
    /// Short backend name used in logs.
    fn name(&self) -> &str;

    /// Query the backend once.
    fn probe(&self) -> Result<Vec<Device>, ProbeError>;
}

/// Run a program to completion and return its stdout.
pub(crate) fn run_command(program: &str, args: &[&str]) -> Result<String, ProbeError> {
    debug!(program, ?args, "Running probe command");
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|source| ProbeError::Spawn {
            program: program.to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(ProbeError::Failed {
            program: program.to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
