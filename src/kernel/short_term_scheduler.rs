use std::sync::Arc;

use super::{ProcessControlBlock, ReadyQueue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SchedulingAlgorithm {
    /// Smallest remaining burst first, ties go to the first process admitted.
    #[value(name = "sjf")]
    ShortestJobFirst,
    /// Plain arrival order.
    #[value(name = "fcfs")]
    FirstComeFirstServed,
}

impl SchedulingAlgorithm {
    pub fn name(&self) -> &'static str {
        match self {
            SchedulingAlgorithm::ShortestJobFirst => "SJF",
            SchedulingAlgorithm::FirstComeFirstServed => "FCFS",
        }
    }
}

pub struct ShortTermScheduler {
    ready_queue: Arc<ReadyQueue>,
    scheduling_alg: SchedulingAlgorithm,
}

impl ShortTermScheduler {
    pub fn new(ready_queue: Arc<ReadyQueue>, scheduling_alg: SchedulingAlgorithm) -> ShortTermScheduler {
        ShortTermScheduler {
            ready_queue,
            scheduling_alg,
        }
    }

    pub fn get_scheduling_alg(&self) -> SchedulingAlgorithm {
        self.scheduling_alg
    }

    pub fn schedule_process(&self, pcb: ProcessControlBlock) {
        self.ready_queue.enqueue(pcb);
    }

    /// Takes the next process to dispatch out of the ready queue.
    ///
    /// The whole queue is drained, stably sorted by the algorithm's key, and
    /// everything but the head is put back.
    pub fn schedule_next(&self) -> Option<ProcessControlBlock> {
        let mut candidates = self.ready_queue.drain();
        if candidates.is_empty() {
            return None;
        }

        candidates.sort_by_key(|pcb| self.dispatch_key(pcb));
        let next = candidates.remove(0);
        self.ready_queue.extend(candidates);

        Some(next)
    }

    // Admission sequence, not queue position: the dispatcher may put a
    // process back at the tail after a blocking dequeue.
    fn dispatch_key(&self, pcb: &ProcessControlBlock) -> (u64, u64) {
        match self.scheduling_alg {
            SchedulingAlgorithm::ShortestJobFirst => (u64::from(pcb.get_burst_time()), pcb.get_admission_seq()),
            SchedulingAlgorithm::FirstComeFirstServed => (pcb.get_arrival_time(), pcb.get_admission_seq()),
        }
    }
}
