use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};
use thiserror::Error;

use super::{
    Core, CoreError, CoreReport, Cpu, MemoryManager, MemoryRange, ProcessId, ProcessSnapshot, ReadyQueue,
    SchedulingAlgorithm, ShortTermScheduler,
};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("failed to start core {core_id}: {source}")]
    Spawn { core_id: usize, source: io::Error },
}

/// Cancels a running dispatcher from any thread. The dispatcher stops at the
/// next round boundary and a blocked ready-queue wait returns immediately.
#[derive(Clone)]
pub struct ShutdownHandle {
    cancelled: Arc<AtomicBool>,
    ready_queue: Arc<ReadyQueue>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.ready_queue.interrupt();
    }

    pub fn is_shutdown(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchEvent {
    pub cycle: u64,
    pub core_id: usize,
    pub process_id: ProcessId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryEvent {
    pub cycle: u64,
    pub process_id: ProcessId,
    pub range: MemoryRange,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedProcess {
    pub snapshot: ProcessSnapshot,
    pub core_id: usize,
    pub dispatched_at: u64,
    pub completed_at: u64,
}

impl CompletedProcess {
    /// Rounds from arrival through the end of the completing round.
    pub fn turnaround_time(&self) -> u64 {
        (self.completed_at + 1).saturating_sub(self.snapshot.arrival_time)
    }

    pub fn waiting_time(&self) -> u64 {
        self.dispatched_at.saturating_sub(self.snapshot.arrival_time)
    }

    pub fn burst_time(&self) -> u64 {
        self.completed_at + 1 - self.dispatched_at
    }
}

/// Everything the dispatcher tracks across rounds.
#[derive(Default)]
struct SimulationState {
    clock: u64,
    dispatch_log: Vec<DispatchEvent>,
    memory_log: Vec<MemoryEvent>,
    completed: Vec<CompletedProcess>,
    running: HashMap<ProcessId, u64>,
}

#[derive(Debug, Clone)]
pub struct SimulationReport {
    pub rounds: u64,
    pub algorithm: SchedulingAlgorithm,
    pub dispatch_log: Vec<DispatchEvent>,
    pub memory_log: Vec<MemoryEvent>,
    pub completed: Vec<CompletedProcess>,
    pub live_ranges: Vec<(ProcessId, MemoryRange)>,
    pub cancelled: bool,
}

impl SimulationReport {
    pub fn dispatch_order(&self) -> Vec<ProcessId> {
        self.dispatch_log.iter().map(|event| event.process_id).collect()
    }

    pub fn completed_process(&self, process_id: ProcessId) -> Option<&CompletedProcess> {
        self.completed.iter().find(|c| c.snapshot.id == process_id)
    }
}

/// The master side: owns the cores and decides, round by round, which ready
/// process each idle core runs next.
pub struct Dispatcher {
    sts: ShortTermScheduler,
    cores: Vec<Core>,
    memory: Arc<MemoryManager>,
    ready_queue: Arc<ReadyQueue>,
    cancelled: Arc<AtomicBool>,
    tick_interval: Duration,
    state: SimulationState,
}

impl Dispatcher {
    pub fn new(
        sts: ShortTermScheduler,
        cpu: Arc<Cpu>,
        ready_queue: Arc<ReadyQueue>,
        num_cores: usize,
        tick_interval: Duration,
    ) -> Result<Dispatcher, DispatchError> {
        let cores = (0..num_cores)
            .map(|core_id| Core::spawn(core_id, cpu.clone()).map_err(|source| DispatchError::Spawn { core_id, source }))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Dispatcher {
            sts,
            cores,
            memory: cpu.get_memory().clone(),
            ready_queue,
            cancelled: Arc::new(AtomicBool::new(false)),
            tick_interval,
            state: SimulationState::default(),
        })
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            cancelled: self.cancelled.clone(),
            ready_queue: self.ready_queue.clone(),
        }
    }

    /// Runs rounds until admission is closed and every process has
    /// terminated, or until shut down.
    pub fn run(mut self) -> Result<SimulationReport, DispatchError> {
        info!(
            "Simulation start: {} cores, {} scheduling",
            self.cores.len(),
            self.sts.get_scheduling_alg().name()
        );

        loop {
            if self.cancelled.load(Ordering::SeqCst) {
                info!("Shutdown requested at clock cycle {}", self.state.clock);
                break;
            }

            self.assign_idle_cores()?;

            if self.cores.iter().all(Core::is_idle) {
                // Nothing ready and nothing running: wait for an admission.
                match self.ready_queue.dequeue() {
                    Some(pcb) => {
                        self.sts.schedule_process(pcb);
                        continue;
                    }
                    None => break,
                }
            }

            self.run_round()?;
        }

        for core in &mut self.cores {
            core.shutdown();
        }
        info!("Simulation complete after {} clock cycles", self.state.clock);

        let state = self.state;
        Ok(SimulationReport {
            rounds: state.clock,
            algorithm: self.sts.get_scheduling_alg(),
            dispatch_log: state.dispatch_log,
            memory_log: state.memory_log,
            completed: state.completed,
            live_ranges: self.memory.live_ranges(),
            cancelled: self.cancelled.load(Ordering::SeqCst),
        })
    }

    fn assign_idle_cores(&mut self) -> Result<(), DispatchError> {
        for core in self.cores.iter_mut().filter(|core| core.is_idle()) {
            let pcb = match self.sts.schedule_next() {
                Some(pcb) => pcb,
                None => break,
            };
            let process_id = pcb.get_id();

            if let Err(rejected) = core.assign_process(pcb) {
                self.sts.schedule_process(rejected.pcb);
                return Err(rejected.reason.into());
            }

            info!("Core {}: assigned process {}", core.get_id(), process_id);
            self.state.running.insert(process_id, self.state.clock);
            self.state.dispatch_log.push(DispatchEvent {
                cycle: self.state.clock,
                core_id: core.get_id(),
                process_id,
            });
        }

        Ok(())
    }

    /// One clock cycle: every busy core runs one instruction, and the round
    /// ends once all of them have reported.
    fn run_round(&mut self) -> Result<(), DispatchError> {
        debug!("Clock cycle {}", self.state.clock);

        let busy: Vec<usize> = (0..self.cores.len()).filter(|&i| !self.cores[i].is_idle()).collect();
        for &i in &busy {
            self.cores[i].step()?;
        }
        for &i in &busy {
            let report = self.cores[i].await_report()?;
            self.handle_report(report);
        }

        self.log_state();
        self.state.clock += 1;

        if !self.tick_interval.is_zero() {
            thread::sleep(self.tick_interval);
        }
        Ok(())
    }

    fn handle_report(&mut self, report: CoreReport) {
        let clock = self.state.clock;

        match report {
            CoreReport::Stepped { core_id, process_id, burst_time, .. } => {
                debug!("Core {}: process {} remaining time {}", core_id, process_id, burst_time);
            }
            CoreReport::Finished { core_id, pcb, released } => {
                let snapshot = pcb.snapshot();
                match released {
                    Some(range) => {
                        info!("Process {} memory released ({})", snapshot.id, range);
                        self.state.memory_log.push(MemoryEvent {
                            cycle: clock,
                            process_id: snapshot.id,
                            range,
                        });
                    }
                    None => warn!("Process {} finished without a memory range", snapshot.id),
                }

                let dispatched_at = self.state.running.remove(&snapshot.id).unwrap_or(clock);
                self.state.completed.push(CompletedProcess {
                    snapshot,
                    core_id,
                    dispatched_at,
                    completed_at: clock,
                });
            }
            CoreReport::Idle { core_id } => warn!("Core {} was stepped while idle", core_id),
        }
    }

    fn log_state(&self) {
        if !log::log_enabled!(log::Level::Debug) {
            return;
        }

        let queued = self.ready_queue.snapshot();
        if queued.is_empty() {
            debug!("[ReadyQueue] The queue is empty.");
        }
        for pcb in queued {
            debug!("[ReadyQueue]   {}", pcb);
        }

        let live = self.memory.live_ranges();
        if live.is_empty() {
            debug!("Memory state: no memory occupied");
        }
        for (process_id, range) in live {
            debug!("Memory state: process {} occupies {}", process_id, range);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;
    use crate::io::{RecordingSink, ScriptedInput};
    use crate::kernel::{Instruction, LongTermScheduler, ProcessState};

    struct Harness {
        lts: Arc<LongTermScheduler>,
        memory: Arc<MemoryManager>,
        dispatcher: Dispatcher,
    }

    fn harness(cores: usize, algorithm: SchedulingAlgorithm) -> Harness {
        let queue = Arc::new(ReadyQueue::new());
        let memory = Arc::new(MemoryManager::new(100, 10_000));
        let cpu = Arc::new(Cpu::new(
            memory.clone(),
            Arc::new(ScriptedInput::new(Vec::new())),
            Arc::new(RecordingSink::new()),
        ));
        let sts = ShortTermScheduler::new(queue.clone(), algorithm);
        let dispatcher = Dispatcher::new(sts, cpu, queue.clone(), cores, Duration::ZERO).unwrap();

        Harness {
            lts: Arc::new(LongTermScheduler::new(queue, memory.clone())),
            memory,
            dispatcher,
        }
    }

    fn program(len: usize) -> Vec<Instruction> {
        vec![Instruction::print("x"); len]
    }

    #[test]
    fn test_dispatcher_sjf_dispatch_order_single_core() {
        let h = harness(1, SchedulingAlgorithm::ShortestJobFirst);
        for burst in [5, 2, 8, 2] {
            h.lts.create_process(program(burst), 0).unwrap();
        }
        h.lts.close();

        let report = h.dispatcher.run().unwrap();

        assert_eq!(report.dispatch_order(), vec![2, 4, 1, 3]);
        assert_eq!(report.rounds, 17);
    }

    #[test]
    fn test_dispatcher_fcfs_dispatch_order_single_core() {
        let h = harness(1, SchedulingAlgorithm::FirstComeFirstServed);
        for burst in [5, 2, 8, 2] {
            h.lts.create_process(program(burst), 0).unwrap();
        }
        h.lts.close();

        let report = h.dispatcher.run().unwrap();
        assert_eq!(report.dispatch_order(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_dispatcher_two_cores_round_count() {
        let h = harness(2, SchedulingAlgorithm::ShortestJobFirst);
        for burst in [3, 1, 5] {
            h.lts.create_process(program(burst), 0).unwrap();
        }
        h.lts.close();

        let report = h.dispatcher.run().unwrap();

        assert_eq!(report.rounds, 6);
        assert_eq!(
            report.dispatch_log,
            vec![
                DispatchEvent { cycle: 0, core_id: 0, process_id: 2 },
                DispatchEvent { cycle: 0, core_id: 1, process_id: 1 },
                DispatchEvent { cycle: 1, core_id: 0, process_id: 3 },
            ]
        );

        let p3 = report.completed_process(3).unwrap();
        assert_eq!((p3.dispatched_at, p3.completed_at), (1, 5));
        assert_eq!(p3.turnaround_time(), 6);
        assert_eq!(p3.waiting_time(), 1);
        assert_eq!(p3.burst_time(), 5);

        for completed in &report.completed {
            assert_eq!(completed.snapshot.state, ProcessState::Terminated);
            assert_eq!(completed.snapshot.burst_time, 0);
        }
        assert_eq!(report.memory_log.len(), 3);
        assert!(report.live_ranges.is_empty());
        assert!(h.memory.live_ranges().is_empty());
    }

    #[test]
    fn test_dispatcher_no_processes() {
        let h = harness(2, SchedulingAlgorithm::ShortestJobFirst);
        h.lts.close();

        let report = h.dispatcher.run().unwrap();
        assert_eq!(report.rounds, 0);
        assert!(report.completed.is_empty());
        assert!(!report.cancelled);
    }

    #[test]
    fn test_dispatcher_waits_for_late_admissions() {
        let h = harness(2, SchedulingAlgorithm::ShortestJobFirst);
        let lts = h.lts.clone();
        let dispatcher = h.dispatcher;

        let (tx, rx) = mpsc::channel();
        let runner = thread::spawn(move || {
            let report = dispatcher.run();
            let _ = tx.send(());
            report
        });

        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());

        lts.create_process(program(2), 0).unwrap();
        thread::sleep(Duration::from_millis(20));
        lts.create_process(program(1), 0).unwrap();
        lts.close();

        let report = runner.join().unwrap().unwrap();
        assert_eq!(report.completed.len(), 2);
        assert!(report.live_ranges.is_empty());
    }

    #[test]
    fn test_dispatcher_shutdown_while_idle() {
        let h = harness(2, SchedulingAlgorithm::ShortestJobFirst);
        let shutdown = h.dispatcher.shutdown_handle();
        let dispatcher = h.dispatcher;

        let runner = thread::spawn(move || dispatcher.run());
        thread::sleep(Duration::from_millis(20));
        shutdown.shutdown();

        let report = runner.join().unwrap().unwrap();
        assert!(report.cancelled);
        assert!(shutdown.is_shutdown());
        assert_eq!(report.rounds, 0);
    }

    #[test]
    fn test_dispatcher_shutdown_mid_run_leaves_ranges_live() {
        let h = harness(1, SchedulingAlgorithm::ShortestJobFirst);
        h.lts.create_process(program(3), 0).unwrap();
        let shutdown = h.dispatcher.shutdown_handle();
        shutdown.shutdown();

        let report = h.dispatcher.run().unwrap();
        assert!(report.cancelled);
        assert!(report.completed.is_empty());
        assert_eq!(report.live_ranges.len(), 1);
    }
}
