use std::collections::{BTreeMap, HashMap};
use std::fmt;

use log::debug;
use parking_lot::{Mutex, RwLock};
use thiserror::Error;

use super::ProcessId;

/// Inclusive address range reserved for one process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRange {
    pub start: usize,
    pub end: usize,
}

impl MemoryRange {
    pub fn overlaps(&self, other: &MemoryRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

impl fmt::Display for MemoryRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MemoryError {
    #[error("not enough memory to load program: {requested} units requested, {remaining} remaining")]
    OutOfMemory { requested: usize, remaining: usize },
    #[error("process {0} already holds a memory range")]
    AlreadyReserved(ProcessId),
    #[error("memory quota of {0} units cannot hold a range, at least 2 are needed")]
    InvalidQuota(usize),
}

type VariableStore = HashMap<String, f64>;

/// Bump allocator over a fixed-size address space. Ranges are never reused.
struct AddressSpace {
    quota: usize,
    capacity: usize,
    next_start: usize,
    live: BTreeMap<ProcessId, MemoryRange>,
}

/// Per-process variable store plus the address ranges backing each process.
///
/// The outer map lock is only held exclusively to create or drop a process's
/// store, so assignments to different processes proceed in parallel while
/// assignments to the same process serialize on that process's own mutex.
pub struct MemoryManager {
    processes: RwLock<HashMap<ProcessId, Mutex<VariableStore>>>,
    address_space: Mutex<AddressSpace>,
}

impl MemoryManager {
    pub fn new(quota: usize, capacity: usize) -> MemoryManager {
        MemoryManager {
            processes: RwLock::new(HashMap::new()),
            address_space: Mutex::new(AddressSpace {
                quota,
                capacity,
                next_start: 0,
                live: BTreeMap::new(),
            }),
        }
    }

    pub fn assign(&self, process_id: ProcessId, variable: &str, value: f64) {
        let variable = variable.to_ascii_lowercase();

        {
            let processes = self.processes.read();
            if let Some(store) = processes.get(&process_id) {
                store.lock().insert(variable.clone(), value);
                debug!("Memory update for process {}: {} = {}", process_id, variable, value);
                return;
            }
        }

        let mut processes = self.processes.write();
        processes
            .entry(process_id)
            .or_default()
            .get_mut()
            .insert(variable.clone(), value);
        debug!("Memory update for process {}: {} = {}", process_id, variable, value);
    }

    pub fn get(&self, process_id: ProcessId, variable: &str) -> Option<f64> {
        let processes = self.processes.read();
        let store = processes.get(&process_id)?.lock();
        store.get(&variable.to_ascii_lowercase()).copied()
    }

    /// Drops the process's variables and its address range. Releasing an
    /// unknown or already released process is a no-op.
    pub fn release(&self, process_id: ProcessId) -> Option<MemoryRange> {
        let mut processes = self.processes.write();
        processes.remove(&process_id);
        let released = self.address_space.lock().live.remove(&process_id);
        drop(processes);

        if let Some(range) = released {
            debug!("Memory released for process {} ({})", process_id, range);
        }
        released
    }

    pub fn reserve(&self, process_id: ProcessId) -> Result<MemoryRange, MemoryError> {
        let mut space = self.address_space.lock();

        // A range needs start < end.
        if space.quota < 2 {
            return Err(MemoryError::InvalidQuota(space.quota));
        }
        if space.live.contains_key(&process_id) {
            return Err(MemoryError::AlreadyReserved(process_id));
        }

        let remaining = space.capacity.saturating_sub(space.next_start);
        if remaining < space.quota {
            return Err(MemoryError::OutOfMemory {
                requested: space.quota,
                remaining,
            });
        }

        let range = MemoryRange {
            start: space.next_start,
            end: space.next_start + space.quota - 1,
        };
        space.next_start = range.end + 1;
        space.live.insert(process_id, range);

        Ok(range)
    }

    pub fn get_remaining_memory(&self) -> usize {
        let space = self.address_space.lock();
        space.capacity.saturating_sub(space.next_start)
    }

    pub fn live_ranges(&self) -> Vec<(ProcessId, MemoryRange)> {
        self.address_space
            .lock()
            .live
            .iter()
            .map(|(id, range)| (*id, *range))
            .collect()
    }

    pub fn variables(&self, process_id: ProcessId) -> Option<BTreeMap<String, f64>> {
        let processes = self.processes.read();
        let store = processes.get(&process_id)?.lock();
        Some(store.iter().map(|(name, value)| (name.clone(), *value)).collect())
    }
}
