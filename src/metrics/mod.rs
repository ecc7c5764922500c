//! Telemetry for the training loop.

pub mod recorder;

pub use recorder::{ConsoleSink, CsvSink, MemorySink, TelemetrySink};
