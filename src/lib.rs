//! Multi-core process scheduling simulator.
//!
//! Programs are admitted into a ready queue with a reserved memory range, then
//! dispatched across a fixed pool of cores, one instruction per clock cycle.

pub mod config;
pub mod io;
pub mod kernel;
