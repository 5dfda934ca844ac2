//! vram-planner: GPU identity resolution and VRAM capacity planning.
//!
//! Detects GPUs through several platform probes, reconciles them into one
//! canonical device map, decides whether a device can host a given model
//! (and with how many parallel slots), and produces the environment that
//! binds a launched server to the chosen device.

pub mod config;
pub mod gpu;
pub mod planner;
pub mod probe;
pub mod selector;
