use std::path::PathBuf;
use thiserror::Error;

/// Everything that can end a control run.
///
/// Shared by the controller, the simulator seam and the binary. None of the
/// variants is retried: `run` returns the first one it meets and the binary
/// exits non-zero with it.
#[derive(Error, Debug)]
pub enum Error {
    /// The state vector derived from the body pose is NaN or infinite,
    /// typically because the simulator handed back a degenerate rotation matrix.
    #[error("non-finite state vector {state:?} (altitude, roll, pitch, yaw)")]
    NonFiniteState { state: [f64; 4] },

    /// The control vector or rotor commands came out NaN or infinite, for
    /// example from a gain that overflows. Such commands never reach the
    /// actuators.
    #[error("non-finite rotor commands {commands:?}")]
    NonFiniteCommand { commands: [f64; 4] },

    /// The simulator has no body with this name.
    #[error("unknown body: {0}")]
    UnknownBody(String),

    /// The plant integrator did not reach the end of the step.
    #[error("integration failed at t = {time}")]
    Integration { time: f64 },

    /// A configuration value is out of its valid range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
