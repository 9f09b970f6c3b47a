use std::fmt::Write;
use std::sync::Arc;

use log::{error, info};
use thiserror::Error;

use super::{
    CompletedProcess, Cpu, DispatchError, Dispatcher, LongTermScheduler, MemoryManager, ProcessSnapshot,
    ReadyQueue, ShortTermScheduler, ShutdownHandle, SimulationReport,
};

use crate::config::{ConfigError, SimulatorConfig};
use crate::io::{InputProvider, OutputSink, Program};

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Holds the simulated machine: memory, ready queue, admission and the
/// dispatcher with its cores.
pub struct Driver {
    lts: Arc<LongTermScheduler>,
    dispatcher: Dispatcher,
}

impl Driver {
    pub fn new(
        config: &SimulatorConfig,
        input: Arc<dyn InputProvider>,
        output: Arc<dyn OutputSink>,
    ) -> Result<Driver, DriverError> {
        config.validate()?;

        let memory = Arc::new(MemoryManager::new(config.memory_quota, config.memory_capacity));
        let ready_queue = Arc::new(ReadyQueue::new());
        let cpu = Arc::new(Cpu::new(memory.clone(), input, output));

        let lts = Arc::new(LongTermScheduler::new(ready_queue.clone(), memory));
        let sts = ShortTermScheduler::new(ready_queue.clone(), config.algorithm);
        let dispatcher = Dispatcher::new(sts, cpu, ready_queue, config.cores, config.tick_interval)?;

        Ok(Driver { lts, dispatcher })
    }

    /// Admission handle, usable from other threads while the simulation runs.
    pub fn admission(&self) -> Arc<LongTermScheduler> {
        self.lts.clone()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.dispatcher.shutdown_handle()
    }

    /// Admits every program at arrival time 0. Programs that cannot be
    /// admitted are reported and skipped.
    pub fn admit_programs(&self, programs: Vec<Program>) -> Vec<ProcessSnapshot> {
        let mut admitted = Vec::new();

        for program in programs {
            match self.lts.create_process(program.instructions, 0) {
                Ok(snapshot) => {
                    info!("Loaded {} as process {}", program.name, snapshot.id);
                    admitted.push(snapshot);
                }
                Err(err) => error!("Failed to admit {}: {}", program.name, err),
            }
        }

        admitted
    }

    /// Admits the given programs, closes admission and runs to completion.
    pub fn run_programs(self, programs: Vec<Program>) -> Result<SimulationReport, DriverError> {
        self.admit_programs(programs);
        self.lts.close();
        self.start()
    }

    pub fn start(self) -> Result<SimulationReport, DriverError> {
        Ok(self.dispatcher.run()?)
    }
}

/// Renders the per-process statistics table.
pub fn format_stats(report: &SimulationReport) -> String {
    let mut out = String::new();
    let mut completed: Vec<&CompletedProcess> = report.completed.iter().collect();
    completed.sort_by_key(|c| c.snapshot.id);

    let _ = writeln!(out, "Stats for executed processes ({} Scheduling):", report.algorithm.name());
    let _ = writeln!(out, "... ID | Burst | Arrival | Start | Completion | Turnaround | Waiting");
    let _ = writeln!(out, "...----|-------|---------|-------|------------|------------|--------");
    for c in &completed {
        let _ = writeln!(
            out,
            "... {:02} | {:5} | {:7} | {:5} | {:10} | {:10} | {:7}",
            c.snapshot.id,
            c.burst_time(),
            c.snapshot.arrival_time,
            c.dispatched_at,
            c.completed_at,
            c.turnaround_time(),
            c.waiting_time()
        );
    }

    if !completed.is_empty() {
        let n = completed.len() as f64;
        let avg_turnaround = completed.iter().map(|c| c.turnaround_time() as f64).sum::<f64>() / n;
        let avg_waiting = completed.iter().map(|c| c.waiting_time() as f64).sum::<f64>() / n;
        let _ = writeln!(
            out,
            "Average turnaround: {:.2} cycles, average waiting: {:.2} cycles",
            avg_turnaround, avg_waiting
        );
    }
    let _ = writeln!(out, "Total clock cycles: {}", report.rounds);

    for event in &report.memory_log {
        let _ = writeln!(
            out,
            "Process {} memory released ({}) at cycle {}",
            event.process_id, event.range, event.cycle
        );
    }

    out
}
