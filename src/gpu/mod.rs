//! GPU identity: canonical records, labels and the detection registry.
//!
//! - [`device`]: Device, Vendor and Ability records
//! - [`label`]: display labels and label → key resolution
//! - [`map`]: insertion-ordered device map
//! - [`registry`]: probe reconciliation and vendor selection lists

pub mod device;
pub mod label;
pub mod map;
pub mod registry;
