//! Capacity planning.
//!
//! - [`catalog`]: model profiles and lookup
//! - [`calculator`]: model memory sizing
//! - [`recommend`]: descending parallelism search
//! - [`ability`]: fit / no-fit verdicts

pub mod ability;
pub mod calculator;
pub mod catalog;
pub mod recommend;
