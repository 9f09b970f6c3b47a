use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use log::{info, warn};
use parking_lot::Mutex;
use thiserror::Error;

use super::{Instruction, MemoryError, MemoryManager, PcbError, ProcessControlBlock, ProcessSnapshot, ReadyQueue};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AdmissionError {
    #[error(transparent)]
    Memory(#[from] MemoryError),
    #[error(transparent)]
    Pcb(#[from] PcbError),
    #[error("admission is closed")]
    Closed,
}

/// Admits programs: picks a process id, reserves its memory range, builds the
/// PCB and hands it to the ready queue. Safe to call from any thread.
///
/// Admissions serialize on `next_admission_seq`, so admission sequence order
/// is also ready queue enqueue order.
pub struct LongTermScheduler {
    ready_queue: Arc<ReadyQueue>,
    memory: Arc<MemoryManager>,
    next_process_id: AtomicU32,
    next_admission_seq: Mutex<u64>,
}

impl LongTermScheduler {
    pub fn new(ready_queue: Arc<ReadyQueue>, memory: Arc<MemoryManager>) -> LongTermScheduler {
        LongTermScheduler {
            ready_queue,
            memory,
            next_process_id: AtomicU32::new(1),
            next_admission_seq: Mutex::new(0),
        }
    }

    pub fn create_process(
        &self,
        instructions: Vec<Instruction>,
        arrival_time: u64,
    ) -> Result<ProcessSnapshot, AdmissionError> {
        let mut next_admission_seq = self.next_admission_seq.lock();
        if self.is_closed() {
            return Err(AdmissionError::Closed);
        }

        let process_id = self.next_process_id.fetch_add(1, Ordering::Relaxed);
        let admission_seq = *next_admission_seq;

        let memory_range = self.memory.reserve(process_id)?;
        let pcb = match ProcessControlBlock::new(process_id, memory_range, arrival_time, admission_seq, instructions) {
            Ok(pcb) => pcb,
            Err(err) => {
                self.memory.release(process_id);
                return Err(err.into());
            }
        };

        let snapshot = pcb.snapshot();
        if let Err(pcb) = self.ready_queue.try_enqueue(pcb) {
            // Closed while this process was being built.
            warn!("Admission closed, dropping process {}", pcb.get_id());
            self.memory.release(pcb.get_id());
            return Err(AdmissionError::Closed);
        }
        *next_admission_seq += 1;

        info!(
            "Admitted process {} ({} instructions, memory {}, arrival {})",
            snapshot.id, snapshot.burst_time, snapshot.memory_range, snapshot.arrival_time
        );
        Ok(snapshot)
    }

    /// Stops further admissions and wakes a dispatcher blocked on an empty
    /// ready queue.
    pub fn close(&self) {
        self.ready_queue.interrupt();
    }

    pub fn is_closed(&self) -> bool {
        self.ready_queue.is_interrupted()
    }
}
