//! Output sink contract and the in-memory sink used by tests
//!
//! The engine hands each finalizer a sink opened from a factory keyed by
//! receiver name. File-format writers (HDF5, CSV) live in collaborator
//! crates; the core only needs the `OutputSink` trait.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use num_complex::Complex64;

use crate::errors::Result;

/// Dataset attributes written alongside a CW capture
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CwAttributes {
    pub sampling_rate: f64,
    pub start_time: f64,
    pub reference_carrier_frequency: f64,
}

/// One emitted receive-window chunk
#[derive(Debug, Clone)]
pub struct SampleChunk {
    pub samples: Vec<Complex64>,
    pub start_time: f64,
    pub fullscale: f64,
    pub chunk_index: u32,
}

/// Per-receiver output destination. Closed when the finalizer exits.
pub trait OutputSink: Send {
    fn add_chunk(
        &mut self,
        samples: &[Complex64],
        start_time: f64,
        fullscale: f64,
        chunk_index: u32,
    ) -> Result<()>;

    fn write_cw(&mut self, samples: &[Complex64], attributes: &CwAttributes) -> Result<()>;

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Factory opening one sink per receiver name
pub type SinkFactory = dyn Fn(&str) -> Result<Box<dyn OutputSink>> + Sync;

/// Captured output of one receiver, held in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    pub chunks: Vec<SampleChunk>,
    pub cw_samples: Vec<Complex64>,
    pub cw_attributes: Option<CwAttributes>,
    pub closed: bool,
}

/// Cloneable handle to a shared `MemorySink`, suitable for handing to a
/// finalizer thread while the test keeps its own reference
#[derive(Debug, Clone, Default)]
pub struct SharedMemorySink(pub Arc<Mutex<MemorySink>>);

impl SharedMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<SampleChunk> {
        self.0.lock().expect("sink poisoned").chunks.clone()
    }
}

impl OutputSink for SharedMemorySink {
    fn add_chunk(
        &mut self,
        samples: &[Complex64],
        start_time: f64,
        fullscale: f64,
        chunk_index: u32,
    ) -> Result<()> {
        self.0.lock().expect("sink poisoned").chunks.push(SampleChunk {
            samples: samples.to_vec(),
            start_time,
            fullscale,
            chunk_index,
        });
        Ok(())
    }

    fn write_cw(&mut self, samples: &[Complex64], attributes: &CwAttributes) -> Result<()> {
        let mut sink = self.0.lock().expect("sink poisoned");
        sink.cw_samples = samples.to_vec();
        sink.cw_attributes = Some(*attributes);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.0.lock().expect("sink poisoned").closed = true;
        Ok(())
    }
}

/// A registry of shared memory sinks, usable as a `SinkFactory` in tests
/// and embedders that post-process output in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySinkRegistry {
    sinks: Arc<Mutex<HashMap<String, SharedMemorySink>>>,
}

impl MemorySinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open (or reuse) the sink for a receiver name
    pub fn open(&self, receiver: &str) -> SharedMemorySink {
        self.sinks
            .lock()
            .expect("registry poisoned")
            .entry(receiver.to_string())
            .or_default()
            .clone()
    }

    pub fn get(&self, receiver: &str) -> Option<SharedMemorySink> {
        self.sinks
            .lock()
            .expect("registry poisoned")
            .get(receiver)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_sink_records_chunks() {
        let registry = MemorySinkRegistry::new();
        let mut sink = registry.open("rx1");
        sink.add_chunk(&[Complex64::new(1.0, -1.0)], 0.5, 2.0, 0).unwrap();
        sink.close().unwrap();

        let shared = registry.get("rx1").unwrap();
        let chunks = shared.snapshot();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].start_time, 0.5);
        assert!(shared.0.lock().unwrap().closed);
    }

    #[test]
    fn registry_reuses_sinks_by_name() {
        let registry = MemorySinkRegistry::new();
        let a = registry.open("rx");
        let b = registry.open("rx");
        assert!(Arc::ptr_eq(&a.0, &b.0));
    }
}
