use std::collections::VecDeque;
use std::io::{self, BufRead, BufReader, Write};

use parking_lot::Mutex;
use thiserror::Error;

use crate::kernel::ProcessId;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("no more input available for {0}")]
    Exhausted(String),
    #[error("failed to read input: {0}")]
    Io(#[from] io::Error),
}

/// Supplies values for `ASSIGN <var> input`. Calls may block.
pub trait InputProvider: Send + Sync {
    fn read_value(&self, process_id: ProcessId, variable: &str) -> Result<f64, InputError>;
}

/// Prompts for each value and re-prompts until the line parses as a finite
/// number.
pub struct ConsoleInput {
    // Both halves sit behind one lock so prompts from different cores don't interleave.
    io: Mutex<(Box<dyn BufRead + Send>, Box<dyn Write + Send>)>,
}

impl ConsoleInput {
    pub fn new(reader: Box<dyn BufRead + Send>, prompt: Box<dyn Write + Send>) -> ConsoleInput {
        ConsoleInput {
            io: Mutex::new((reader, prompt)),
        }
    }

    pub fn stdin() -> ConsoleInput {
        ConsoleInput::new(Box::new(BufReader::new(io::stdin())), Box::new(io::stdout()))
    }
}

impl InputProvider for ConsoleInput {
    fn read_value(&self, process_id: ProcessId, variable: &str) -> Result<f64, InputError> {
        let mut io = self.io.lock();
        let (reader, prompt) = &mut *io;

        loop {
            write!(prompt, "Enter value for {} (process {}): ", variable, process_id)?;
            prompt.flush()?;

            let mut line = String::new();
            if reader.read_line(&mut line)? == 0 {
                return Err(InputError::Exhausted(variable.to_string()));
            }

            match line.trim().parse::<f64>() {
                Ok(value) if value.is_finite() => return Ok(value),
                _ => writeln!(prompt, "Invalid input. Please enter a valid number.")?,
            }
        }
    }
}

/// Serves a fixed list of values in order.
pub struct ScriptedInput {
    values: Mutex<VecDeque<f64>>,
}

impl ScriptedInput {
    pub fn new(values: Vec<f64>) -> ScriptedInput {
        ScriptedInput {
            values: Mutex::new(values.into()),
        }
    }

    pub fn remaining(&self) -> usize {
        self.values.lock().len()
    }
}

impl InputProvider for ScriptedInput {
    fn read_value(&self, _process_id: ProcessId, variable: &str) -> Result<f64, InputError> {
        self.values
            .lock()
            .pop_front()
            .ok_or_else(|| InputError::Exhausted(variable.to_string()))
    }
}
