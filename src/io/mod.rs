pub mod input;
pub mod loader;
pub mod output;
pub mod parser;
pub mod program;

pub use input::{ConsoleInput, InputError, InputProvider, ScriptedInput};
pub use output::{ConsoleSink, OutputSink, PrintRecord, RecordingSink};
pub use parser::{parse_program, ParseError};
pub use program::Program;
