use std::time::Duration;

use thiserror::Error;

use crate::kernel::SchedulingAlgorithm;

pub const DEFAULT_CORES: usize = 2;
pub const DEFAULT_MEMORY_QUOTA: usize = 100;
pub const DEFAULT_MEMORY_CAPACITY: usize = 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("at least one core is required")]
    NoCores,
    #[error("memory quota must be at least 2 units, got {0}")]
    QuotaTooSmall(usize),
    #[error("memory capacity {capacity} cannot hold a single {quota}-unit process")]
    CapacityTooSmall { capacity: usize, quota: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatorConfig {
    pub cores: usize,
    /// Address units reserved per admitted process.
    pub memory_quota: usize,
    pub memory_capacity: usize,
    pub algorithm: SchedulingAlgorithm,
    /// Pause after every clock cycle.
    pub tick_interval: Duration,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        SimulatorConfig {
            cores: DEFAULT_CORES,
            memory_quota: DEFAULT_MEMORY_QUOTA,
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
            algorithm: SchedulingAlgorithm::ShortestJobFirst,
            tick_interval: Duration::ZERO,
        }
    }
}

impl SimulatorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cores == 0 {
            return Err(ConfigError::NoCores);
        }
        // A range needs start < end.
        if self.memory_quota < 2 {
            return Err(ConfigError::QuotaTooSmall(self.memory_quota));
        }
        if self.memory_capacity < self.memory_quota {
            return Err(ConfigError::CapacityTooSmall {
                capacity: self.memory_capacity,
                quota: self.memory_quota,
            });
        }
        Ok(())
    }
}
