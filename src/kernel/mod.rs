mod cpu;
mod dispatcher;
pub mod driver;
mod instruction;
mod long_term_scheduler;
mod memory;
mod process_control_block;
mod ready_queue;
mod short_term_scheduler;

pub use cpu::{Core, CoreCommand, CoreError, CoreReport, CoreStatus, Cpu, ExecutionError, Rejected};
pub use dispatcher::{
    CompletedProcess, DispatchError, DispatchEvent, Dispatcher, MemoryEvent, ShutdownHandle, SimulationReport,
};
pub use driver::{Driver, DriverError};
pub use instruction::{Instruction, Operator, Source};
pub use long_term_scheduler::{AdmissionError, LongTermScheduler};
pub use memory::{MemoryError, MemoryManager, MemoryRange};
pub use process_control_block::{PcbError, ProcessControlBlock, ProcessSnapshot, ProcessState};
pub use ready_queue::ReadyQueue;
pub use short_term_scheduler::{SchedulingAlgorithm, ShortTermScheduler};

pub type ProcessId = u32;
