use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use super::{Instruction, MemoryRange, ProcessId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Ready,
    Running,
    Terminated,
}

impl ProcessState {
    /// Ready -> Running -> Terminated, nothing else.
    pub fn can_transition_to(self, next: ProcessState) -> bool {
        matches!(
            (self, next),
            (ProcessState::Ready, ProcessState::Running) | (ProcessState::Running, ProcessState::Terminated)
        )
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessState::Ready => "READY",
            ProcessState::Running => "RUNNING",
            ProcessState::Terminated => "TERMINATED",
        };
        f.write_str(name)
    }
}

impl FromStr for ProcessState {
    type Err = PcbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "READY" => Ok(ProcessState::Ready),
            "RUNNING" => Ok(ProcessState::Running),
            "TERMINATED" => Ok(ProcessState::Terminated),
            _ => Err(PcbError::UnknownState(s.to_string())),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PcbError {
    #[error("memory start address {start} must be less than memory end address {end}")]
    InvalidMemoryRange { start: usize, end: usize },
    #[error("process {0} has no instructions, burst time must be greater than 0")]
    EmptyProgram(ProcessId),
    #[error("process {id} has {len} instructions, more than a burst time can count")]
    ProgramTooLong { id: ProcessId, len: usize },
    #[error("process {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: ProcessId,
        from: ProcessState,
        to: ProcessState,
    },
    #[error("process {id} cannot terminate with {remaining} units of burst time left")]
    Unfinished { id: ProcessId, remaining: u32 },
    #[error("invalid process state: {0}")]
    UnknownState(String),
}

/// Point-in-time copy of a PCB's scheduling metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSnapshot {
    pub id: ProcessId,
    pub state: ProcessState,
    pub memory_range: MemoryRange,
    pub program_counter: usize,
    pub burst_time: u32,
    pub arrival_time: u64,
    pub admission_seq: u64,
}

impl fmt::Display for ProcessSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PCB{{id={}, state={}, memory={}, pc={}, burst={}, arrival={}}}",
            self.id, self.state, self.memory_range, self.program_counter, self.burst_time, self.arrival_time
        )
    }
}

pub struct ProcessControlBlock {
    id: ProcessId,
    memory_range: MemoryRange,
    program_counter: usize,
    state: ProcessState,
    burst_time: u32,
    arrival_time: u64,
    admission_seq: u64,
    instructions: Vec<Instruction>,
}

impl ProcessControlBlock {
    pub fn new(
        id: ProcessId,
        memory_range: MemoryRange,
        arrival_time: u64,
        admission_seq: u64,
        instructions: Vec<Instruction>,
    ) -> Result<ProcessControlBlock, PcbError> {
        if memory_range.start >= memory_range.end {
            return Err(PcbError::InvalidMemoryRange {
                start: memory_range.start,
                end: memory_range.end,
            });
        }
        let burst_time = initial_burst_time(id, instructions.len())?;

        Ok(ProcessControlBlock {
            id,
            memory_range,
            program_counter: 0,
            state: ProcessState::Ready,
            burst_time,
            arrival_time,
            admission_seq,
            instructions,
        })
    }

    pub fn get_id(&self) -> ProcessId {
        self.id
    }

    pub fn get_memory_range(&self) -> MemoryRange {
        self.memory_range
    }

    pub fn get_program_counter(&self) -> usize {
        self.program_counter
    }

    pub fn get_state(&self) -> ProcessState {
        self.state
    }

    pub fn get_burst_time(&self) -> u32 {
        self.burst_time
    }

    pub fn get_arrival_time(&self) -> u64 {
        self.arrival_time
    }

    pub fn get_admission_seq(&self) -> u64 {
        self.admission_seq
    }

    pub fn get_instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Returns the instruction at the program counter and advances past it.
    pub fn next_instruction(&mut self) -> Option<&Instruction> {
        let instruction = self.instructions.get(self.program_counter)?;
        self.program_counter += 1;
        Some(instruction)
    }

    pub fn has_more_instructions(&self) -> bool {
        self.program_counter < self.instructions.len()
    }

    pub fn reduce_burst_time(&mut self, units: u32) {
        self.burst_time = self.burst_time.saturating_sub(units);
    }

    pub fn is_completed(&self) -> bool {
        self.burst_time == 0
    }

    pub fn set_state(&mut self, next: ProcessState) -> Result<(), PcbError> {
        if !self.state.can_transition_to(next) {
            return Err(PcbError::InvalidTransition {
                id: self.id,
                from: self.state,
                to: next,
            });
        }
        if next == ProcessState::Terminated && !self.is_completed() {
            return Err(PcbError::Unfinished {
                id: self.id,
                remaining: self.burst_time,
            });
        }

        self.state = next;
        Ok(())
    }

    pub fn snapshot(&self) -> ProcessSnapshot {
        ProcessSnapshot {
            id: self.id,
            state: self.state,
            memory_range: self.memory_range,
            program_counter: self.program_counter,
            burst_time: self.burst_time,
            arrival_time: self.arrival_time,
            admission_seq: self.admission_seq,
        }
    }
}

impl fmt::Debug for ProcessControlBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.snapshot())
    }
}

/// Burst time starts at one unit per instruction.
fn initial_burst_time(id: ProcessId, len: usize) -> Result<u32, PcbError> {
    if len == 0 {
        return Err(PcbError::EmptyProgram(id));
    }
    u32::try_from(len).map_err(|_| PcbError::ProgramTooLong { id, len })
}
