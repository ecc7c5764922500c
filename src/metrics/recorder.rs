//! Named-scalar telemetry sinks.
//!
//! The trainer emits, at minimum: the size of each store after every
//! collection step (`buffer/num_labeled_rewards`,
//! `buffer/num_unlabeled_rewards`), the pseudo-labeling evaluation metric
//! after every refresh (`ssl/f1_score`), and the pseudo-store size after
//! every refresh (`buffer/num_ssl_rewards`). Records accumulate between
//! `dump` calls; a dump flushes the current set tagged with the step.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Sink for named scalar records.
pub trait TelemetrySink {
    /// Record a scalar under a hierarchical key (e.g. `ssl/f1_score`).
    /// Re-recording a key before the next dump overwrites the value.
    fn record(&mut self, key: &str, value: f64);

    /// Flush the accumulated records, tagged with the current step.
    fn dump(&mut self, step: usize);
}

/// Console sink with aligned key/value output.
pub struct ConsoleSink {
    pending: BTreeMap<String, f64>,
}

impl ConsoleSink {
    /// Create a console sink.
    pub fn new() -> Self {
        Self {
            pending: BTreeMap::new(),
        }
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetrySink for ConsoleSink {
    fn record(&mut self, key: &str, value: f64) {
        self.pending.insert(key.to_string(), value);
    }

    fn dump(&mut self, step: usize) {
        if self.pending.is_empty() {
            return;
        }
        println!("---- step {} ----", step);
        for (key, value) in &self.pending {
            println!("{:<32} {:>12.4}", key, value);
        }
        self.pending.clear();
    }
}

/// CSV sink writing one `step,key,value` row per record.
pub struct CsvSink {
    writer: BufWriter<File>,
    pending: BTreeMap<String, f64>,
}

impl CsvSink {
    /// Create a CSV sink writing to the given path.
    pub fn new(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "step,key,value")?;
        Ok(Self {
            writer,
            pending: BTreeMap::new(),
        })
    }
}

impl TelemetrySink for CsvSink {
    fn record(&mut self, key: &str, value: f64) {
        self.pending.insert(key.to_string(), value);
    }

    fn dump(&mut self, step: usize) {
        for (key, value) in &self.pending {
            if writeln!(self.writer, "{},{},{}", step, key, value).is_err() {
                log::error!("failed to write telemetry row for {}", key);
            }
        }
        self.pending.clear();
        let _ = self.writer.flush();
    }
}

/// In-memory sink retaining every record; used by tests to observe the
/// trainer's emission order.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Vec<(String, f64)>,
    dumps: Vec<usize>,
}

impl MemorySink {
    /// Create an empty memory sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// All `(key, value)` records in emission order.
    pub fn records(&self) -> &[(String, f64)] {
        &self.records
    }

    /// Steps at which `dump` was called.
    pub fn dumps(&self) -> &[usize] {
        &self.dumps
    }

    /// Values recorded under `key`, in order.
    pub fn values(&self, key: &str) -> Vec<f64> {
        self.records
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| *v)
            .collect()
    }

    /// Last value recorded under `key`.
    pub fn last(&self, key: &str) -> Option<f64> {
        self.values(key).last().copied()
    }
}

impl TelemetrySink for MemorySink {
    fn record(&mut self, key: &str, value: f64) {
        self.records.push((key.to_string(), value));
    }

    fn dump(&mut self, step: usize) {
        self.dumps.push(step);
    }
}
