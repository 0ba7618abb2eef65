//! EchoSim core library
//!
//! An event-driven simulator for the physics of bistatic and monostatic
//! radar systems. Given a scenario of mobile platforms carrying
//! transmitters, receivers, and targets, the engine computes the
//! superposition of propagation paths at every received sample and emits
//! synthetic I/Q streams structured like a real receiver's ADC capture.
//!
//! Scenario parsing and file-format serialization live in collaborator
//! crates; this crate exposes an in-memory API only: populate a
//! [`world::World`], then call [`engine::run_event_driven_sim`].

pub mod antenna;
pub mod channel;
pub mod engine;
pub mod errors;
pub mod events;
pub mod finalizer;
pub mod geometry;
pub mod noise;
pub mod output;
pub mod params;
pub mod path;
pub mod pool;
pub mod response;
pub mod signal_processing;
pub mod waveform;
pub mod world;

// Re-export the canonical simulation interface
pub use engine::{run_event_driven_sim, ProgressCallback, RunSummary};
pub use errors::{ConfigError, InternalError, RangeError, ResourceError, Result, SimError};
pub use finalizer::RenderingJob;
pub use output::{CwAttributes, MemorySinkRegistry, OutputSink, SampleChunk, SharedMemorySink};
pub use params::Parameters;
pub use pool::ThreadPool;
pub use world::World;
