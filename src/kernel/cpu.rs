use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, error, info, warn};
use thiserror::Error;

use super::{Instruction, MemoryManager, MemoryRange, PcbError, ProcessControlBlock, ProcessId, ProcessState, Source};

use crate::io::{InputError, InputProvider, OutputSink, PrintRecord};

/// Failure of a single instruction. The owning process keeps running.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("variable {0} does not exist in memory")]
    UnresolvedVariable(String),
    #[error(transparent)]
    Input(#[from] InputError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("core {core_id} is busy with process {process_id}")]
    Busy { core_id: usize, process_id: ProcessId },
    #[error("core {0} is no longer running")]
    Disconnected(usize),
    #[error(transparent)]
    Pcb(#[from] PcbError),
}

/// A process a core refused, handed back to the caller.
#[derive(Debug, Error)]
#[error("{reason}")]
pub struct Rejected {
    pub reason: CoreError,
    pub pcb: ProcessControlBlock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreStatus {
    Idle,
    Busy(ProcessId),
}

pub enum CoreCommand {
    Assign(ProcessControlBlock),
    Step,
    Shutdown,
}

#[derive(Debug)]
pub enum CoreReport {
    Stepped {
        core_id: usize,
        process_id: ProcessId,
        burst_time: u32,
        program_counter: usize,
    },
    Finished {
        core_id: usize,
        pcb: ProcessControlBlock,
        released: Option<MemoryRange>,
    },
    Idle {
        core_id: usize,
    },
}

/// What every core executes against: shared memory plus the input and
/// output boundaries.
pub struct Cpu {
    memory: Arc<MemoryManager>,
    input: Arc<dyn InputProvider>,
    output: Arc<dyn OutputSink>,
}

impl Cpu {
    pub fn new(memory: Arc<MemoryManager>, input: Arc<dyn InputProvider>, output: Arc<dyn OutputSink>) -> Cpu {
        Cpu { memory, input, output }
    }

    pub fn get_memory(&self) -> &Arc<MemoryManager> {
        &self.memory
    }

    pub fn execute(&self, core_id: usize, process_id: ProcessId, instruction: &Instruction) -> Result<(), ExecutionError> {
        match instruction {
            Instruction::Assign { target, source: Source::Input } => {
                let value = self.input.read_value(process_id, target)?;
                self.memory.assign(process_id, target, value);
            }
            Instruction::Assign { target, source: Source::Expression { operator, lhs, rhs } } => {
                let lhs = self.resolve(process_id, lhs)?;
                let rhs = self.resolve(process_id, rhs)?;
                self.memory.assign(process_id, target, operator.apply(lhs, rhs));
            }
            Instruction::Print { target } => {
                self.output.emit(PrintRecord {
                    process_id,
                    core_id,
                    variable: target.clone(),
                    value: self.memory.get(process_id, target),
                });
            }
        }

        Ok(())
    }

    fn resolve(&self, process_id: ProcessId, variable: &str) -> Result<f64, ExecutionError> {
        self.memory
            .get(process_id, variable)
            .ok_or_else(|| ExecutionError::UnresolvedVariable(variable.to_string()))
    }
}

/// Dispatcher-side handle to one execution core running on its own thread.
pub struct Core {
    id: usize,
    status: CoreStatus,
    commands: Sender<CoreCommand>,
    reports: Receiver<CoreReport>,
    thread: Option<JoinHandle<()>>,
}

impl Core {
    pub fn spawn(id: usize, cpu: Arc<Cpu>) -> io::Result<Core> {
        let (commands, command_rx) = unbounded();
        let (report_tx, reports) = unbounded();

        let worker = CoreWorker {
            id,
            cpu,
            current: None,
            reports: report_tx,
        };
        let thread = thread::Builder::new()
            .name(format!("core-{}", id))
            .spawn(move || worker.run(command_rx))?;

        Ok(Core {
            id,
            status: CoreStatus::Idle,
            commands,
            reports,
            thread: Some(thread),
        })
    }

    pub fn get_id(&self) -> usize {
        self.id
    }

    pub fn get_status(&self) -> CoreStatus {
        self.status
    }

    pub fn is_idle(&self) -> bool {
        self.status == CoreStatus::Idle
    }

    /// Moves the process to Running and hands it to the core. A busy core
    /// never takes a second process.
    pub fn assign_process(&mut self, mut pcb: ProcessControlBlock) -> Result<(), Rejected> {
        if let CoreStatus::Busy(process_id) = self.status {
            return Err(Rejected {
                reason: CoreError::Busy {
                    core_id: self.id,
                    process_id,
                },
                pcb,
            });
        }
        if let Err(err) = pcb.set_state(ProcessState::Running) {
            return Err(Rejected { reason: err.into(), pcb });
        }

        let process_id = pcb.get_id();
        if let Err(err) = self.commands.send(CoreCommand::Assign(pcb)) {
            let pcb = match err.into_inner() {
                CoreCommand::Assign(pcb) => pcb,
                _ => unreachable!("only Assign carries a process"),
            };
            return Err(Rejected {
                reason: CoreError::Disconnected(self.id),
                pcb,
            });
        }

        self.status = CoreStatus::Busy(process_id);
        Ok(())
    }

    pub fn step(&self) -> Result<(), CoreError> {
        self.commands
            .send(CoreCommand::Step)
            .map_err(|_| CoreError::Disconnected(self.id))
    }

    /// Waits for the core to report on the step it was just given.
    pub fn await_report(&mut self) -> Result<CoreReport, CoreError> {
        let report = self.reports.recv().map_err(|_| CoreError::Disconnected(self.id))?;
        if !matches!(report, CoreReport::Stepped { .. }) {
            self.status = CoreStatus::Idle;
        }
        Ok(report)
    }

    pub fn shutdown(&mut self) {
        let _ = self.commands.send(CoreCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Core {} panicked", self.id);
            }
        }
    }
}

impl Drop for Core {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct CoreWorker {
    id: usize,
    cpu: Arc<Cpu>,
    current: Option<ProcessControlBlock>,
    reports: Sender<CoreReport>,
}

impl CoreWorker {
    fn run(mut self, commands: Receiver<CoreCommand>) {
        for command in commands.iter() {
            match command {
                CoreCommand::Assign(pcb) => self.accept(pcb),
                CoreCommand::Step => {
                    let report = self.step();
                    if self.reports.send(report).is_err() {
                        break;
                    }
                }
                CoreCommand::Shutdown => break,
            }
        }

        if let Some(pcb) = &self.current {
            warn!("Core {} stopped with process {} unfinished", self.id, pcb.get_id());
        }
        debug!("Core {} exiting", self.id);
    }

    fn accept(&mut self, pcb: ProcessControlBlock) {
        if let Some(current) = &self.current {
            error!(
                "Core {} is busy with process {}, dropping process {}",
                self.id,
                current.get_id(),
                pcb.get_id()
            );
            return;
        }
        self.current = Some(pcb);
    }

    /// Runs exactly one instruction of the current process and charges it one
    /// unit of burst time.
    fn step(&mut self) -> CoreReport {
        let pcb = match self.current.as_mut() {
            Some(pcb) => pcb,
            None => return CoreReport::Idle { core_id: self.id },
        };
        let process_id = pcb.get_id();

        if let Some(instruction) = pcb.next_instruction() {
            debug!("Core {}: executing instruction: {}", self.id, instruction);
            if let Err(err) = self.cpu.execute(self.id, process_id, instruction) {
                warn!("Core {}: process {}: {}, instruction skipped", self.id, process_id, err);
            }
        }
        pcb.reduce_burst_time(1);

        if !pcb.is_completed() {
            return CoreReport::Stepped {
                core_id: self.id,
                process_id,
                burst_time: pcb.get_burst_time(),
                program_counter: pcb.get_program_counter(),
            };
        }

        match self.current.take() {
            Some(pcb) => self.finish(pcb),
            None => CoreReport::Idle { core_id: self.id },
        }
    }

    fn finish(&self, mut pcb: ProcessControlBlock) -> CoreReport {
        if let Err(err) = pcb.set_state(ProcessState::Terminated) {
            error!("Core {}: {}", self.id, err);
        }
        let released = self.cpu.get_memory().release(pcb.get_id());
        info!("Core {}: process {} completed", self.id, pcb.get_id());

        CoreReport::Finished {
            core_id: self.id,
            pcb,
            released,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;
    use crate::io::{RecordingSink, ScriptedInput};
    use crate::kernel::Operator;

    fn cpu(inputs: Vec<f64>) -> (Arc<Cpu>, Arc<MemoryManager>, Arc<RecordingSink>) {
        let memory = Arc::new(MemoryManager::new(100, 1024));
        let sink = Arc::new(RecordingSink::new());
        let cpu = Cpu::new(memory.clone(), Arc::new(ScriptedInput::new(inputs)), sink.clone());
        (Arc::new(cpu), memory, sink)
    }

    fn pcb(memory: &MemoryManager, id: ProcessId, instructions: Vec<Instruction>) -> ProcessControlBlock {
        let range = memory.reserve(id).unwrap();
        ProcessControlBlock::new(id, range, 0, id as u64, instructions).unwrap()
    }

    #[test]
    fn test_cpu_execute_add() {
        let (cpu, memory, _) = cpu(Vec::new());
        memory.assign(1, "a", 3.0);
        memory.assign(1, "b", 4.0);

        cpu.execute(0, 1, &Instruction::assign_expression("result", Operator::Add, "a", "b"))
            .unwrap();

        assert_eq!(memory.get(1, "result"), Some(7.0));
    }

    #[test]
    fn test_cpu_execute_unresolved_variable_leaves_target_unset() {
        let (cpu, memory, _) = cpu(Vec::new());
        memory.assign(1, "a", 3.0);

        let result = cpu.execute(0, 1, &Instruction::assign_expression("result", Operator::Add, "a", "b"));

        assert!(matches!(result, Err(ExecutionError::UnresolvedVariable(v)) if v == "b"));
        assert_eq!(memory.get(1, "result"), None);
    }

    #[test]
    fn test_cpu_execute_divide_by_zero() {
        let (cpu, memory, _) = cpu(Vec::new());
        memory.assign(1, "a", 1.0);
        memory.assign(1, "zero", 0.0);

        cpu.execute(0, 1, &Instruction::assign_expression("q", Operator::Divide, "a", "zero"))
            .unwrap();

        assert_eq!(memory.get(1, "q"), Some(f64::INFINITY));
    }

    #[test]
    fn test_cpu_execute_input_and_print() {
        let (cpu, memory, sink) = cpu(vec![2.5]);

        cpu.execute(1, 4, &Instruction::assign_input("x")).unwrap();
        cpu.execute(1, 4, &Instruction::print("X")).unwrap();
        cpu.execute(1, 4, &Instruction::print("missing")).unwrap();

        assert_eq!(memory.get(4, "x"), Some(2.5));
        let values: Vec<_> = sink.for_process(4).iter().map(|r| r.value).collect();
        assert_eq!(values, vec![Some(2.5), None]);
    }

    #[test]
    fn test_cpu_execute_input_exhausted() {
        let (cpu, memory, _) = cpu(Vec::new());
        let result = cpu.execute(0, 1, &Instruction::assign_input("x"));

        assert!(matches!(result, Err(ExecutionError::Input(InputError::Exhausted(_)))));
        assert_eq!(memory.get(1, "x"), None);
    }

    #[test]
    fn test_core_runs_one_instruction_per_step() {
        let (cpu, memory, sink) = cpu(Vec::new());
        let program = vec![
            Instruction::assign_expression("c", Operator::Add, "a", "b"),
            Instruction::print("c"),
        ];
        let pcb = pcb(&memory, 1, program);
        memory.assign(1, "a", 1.0);
        memory.assign(1, "b", 2.0);

        let mut core = Core::spawn(0, cpu).unwrap();
        core.assign_process(pcb).unwrap();
        assert_eq!(core.get_status(), CoreStatus::Busy(1));

        core.step().unwrap();
        match core.await_report().unwrap() {
            CoreReport::Stepped { process_id, burst_time, program_counter, .. } => {
                assert_eq!((process_id, burst_time, program_counter), (1, 1, 1));
            }
            other => panic!("unexpected report: {:?}", other),
        }
        assert_eq!(core.get_status(), CoreStatus::Busy(1));

        core.step().unwrap();
        match core.await_report().unwrap() {
            CoreReport::Finished { pcb, released, .. } => {
                assert_eq!(pcb.get_state(), ProcessState::Terminated);
                assert_eq!(pcb.get_burst_time(), 0);
                assert_eq!(released, Some(MemoryRange { start: 0, end: 99 }));
            }
            other => panic!("unexpected report: {:?}", other),
        }
        assert!(core.is_idle());
        assert_eq!(memory.get(1, "c"), None);
        assert!(memory.live_ranges().is_empty());
        assert_eq!(sink.for_process(1)[0].value, Some(3.0));
    }

    #[test]
    fn test_core_continues_after_failed_instruction() {
        let (cpu, memory, sink) = cpu(Vec::new());
        let program = vec![
            Instruction::assign_expression("c", Operator::Add, "a", "b"),
            Instruction::print("c"),
        ];
        let pcb = pcb(&memory, 1, program);

        let mut core = Core::spawn(0, cpu).unwrap();
        core.assign_process(pcb).unwrap();
        core.step().unwrap();
        core.await_report().unwrap();
        core.step().unwrap();
        assert!(matches!(core.await_report().unwrap(), CoreReport::Finished { .. }));

        assert_eq!(sink.for_process(1)[0].value, None);
    }

    #[test]
    fn test_core_rejects_assignment_while_busy() {
        let (cpu, memory, _) = cpu(Vec::new());
        let first = pcb(&memory, 1, vec![Instruction::print("x"); 2]);
        let second = pcb(&memory, 2, vec![Instruction::print("x")]);

        let mut core = Core::spawn(3, cpu).unwrap();
        core.assign_process(first).unwrap();
        let rejected = core.assign_process(second).unwrap_err();

        assert_eq!(rejected.reason, CoreError::Busy { core_id: 3, process_id: 1 });
        assert_eq!(rejected.pcb.get_id(), 2);
        assert_eq!(rejected.pcb.get_state(), ProcessState::Ready);
    }

    #[test]
    fn test_core_step_while_idle() {
        let (cpu, _, _) = cpu(Vec::new());
        let mut core = Core::spawn(0, cpu).unwrap();

        core.step().unwrap();
        assert!(matches!(core.await_report().unwrap(), CoreReport::Idle { core_id: 0 }));
    }

    #[test]
    fn test_core_shutdown_returns_promptly_when_idle() {
        let (cpu, _, _) = cpu(Vec::new());
        let mut core = Core::spawn(0, cpu).unwrap();

        let start = Instant::now();
        core.shutdown();
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(core.step(), Err(CoreError::Disconnected(0)));
    }
}
