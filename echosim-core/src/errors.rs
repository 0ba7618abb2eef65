//! EchoSim error types with granular categories

use thiserror::Error;

/// Top-level error type for all EchoSim operations
#[derive(Debug, Error)]
pub enum SimError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Range error: {0}")]
    Range(#[from] RangeError),

    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),

    #[error("Internal error: {0}")]
    Internal(#[from] InternalError),
}

/// Scenario configuration errors, raised before the event loop starts
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("An asset named '{name}' already exists in this scenario")]
    DuplicateAssetName { name: String },

    #[error("No {kind} named '{name}' is registered")]
    MissingAsset { kind: &'static str, name: String },

    #[error("Invalid PRF {prf} Hz for pulsed transmitter '{name}' (must be > 0)")]
    InvalidPrf { name: String, prf: f64 },

    #[error("Invalid window parameters for receiver '{name}': length={length}, prf={prf}, skip={skip}")]
    InvalidWindow {
        name: String,
        length: f64,
        prf: f64,
        skip: f64,
    },

    #[error("Invalid noise temperature {temperature} K (must be >= 0)")]
    InvalidNoiseTemperature { temperature: f64 },

    #[error("Pulse signal '{name}' is unusable: {reason}")]
    BadPulseSignal { name: String, reason: String },

    #[error("Scenario mixes pulsed and CW transmitters, which is not supported")]
    MixedTransmitterModes,

    #[error("Monostatic pair '{transmitter}'/'{receiver}' must share one platform")]
    MonostaticPlatformMismatch {
        transmitter: String,
        receiver: String,
    },

    #[error("Invalid parameter: {reason}")]
    InvalidParameter { reason: String },
}

/// Degenerate geometry during a physics solve
#[derive(Debug, Error)]
#[error("{object} separation below epsilon at t={time} s")]
pub struct RangeError {
    pub object: &'static str,
    pub time: f64,
}

/// Output sink failures
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("Could not open output sink for receiver '{receiver}': {reason}")]
    SinkOpenFailed { receiver: String, reason: String },

    #[error("Write to output sink for receiver '{receiver}' failed: {reason}")]
    SinkWriteFailed { receiver: String, reason: String },
}

/// Invariant violations inside the engine
#[derive(Debug, Error)]
pub enum InternalError {
    #[error("Path sampled before finalize()")]
    PathNotFinalized,

    #[error("Timing '{name}' used before its clock model was initialized")]
    TimingNotInitialized { name: String },

    #[error("CW waveform cannot be rendered as a pulse")]
    RenderOnCwSignal,

    #[error("Thread pool is shut down; task rejected")]
    PoolShutDown,

    #[error("Finalizer job queue for receiver '{receiver}' was already claimed")]
    JobQueueClaimed { receiver: String },

    #[error("Finalizer thread for receiver '{receiver}' panicked")]
    FinalizerPanicked { receiver: String },
}

/// Result type alias for EchoSim operations
pub type Result<T> = std::result::Result<T, SimError>;
