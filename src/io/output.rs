use std::fmt;

use parking_lot::Mutex;

use crate::kernel::ProcessId;

/// One `PRINT` result.
#[derive(Debug, Clone, PartialEq)]
pub struct PrintRecord {
    pub process_id: ProcessId,
    pub core_id: usize,
    pub variable: String,
    pub value: Option<f64>,
}

impl fmt::Display for PrintRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Core {}: process {}: {} = ", self.core_id, self.process_id, self.variable)?;
        match self.value {
            Some(value) => write!(f, "{}", value),
            None => f.write_str("unset"),
        }
    }
}

/// Destination for `PRINT`. Only per-process ordering is guaranteed.
pub trait OutputSink: Send + Sync {
    fn emit(&self, record: PrintRecord);
}

pub struct ConsoleSink;

impl OutputSink for ConsoleSink {
    fn emit(&self, record: PrintRecord) {
        println!("{}", record);
    }
}

#[derive(Default)]
pub struct RecordingSink {
    records: Mutex<Vec<PrintRecord>>,
}

impl RecordingSink {
    pub fn new() -> RecordingSink {
        RecordingSink::default()
    }

    pub fn records(&self) -> Vec<PrintRecord> {
        self.records.lock().clone()
    }

    pub fn for_process(&self, process_id: ProcessId) -> Vec<PrintRecord> {
        self.records
            .lock()
            .iter()
            .filter(|record| record.process_id == process_id)
            .cloned()
            .collect()
    }
}

impl OutputSink for RecordingSink {
    fn emit(&self, record: PrintRecord) {
        self.records.lock().push(record);
    }
}
