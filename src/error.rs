//! Error type shared by the network, the string codes and the trainer.
//!
//! Only configuration and input mistakes surface here. Lookups of unknown
//! weight ids return `Option`/`bool`, and misuse of the propagation order is
//! caught by debug assertions.

use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T> = core::result::Result<T, NetError>;

/// Everything that can go wrong while building, wiring or fitting a network.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NetError {
    /// No activation function is registered under this code.
    #[error("unknown activation function code `{0}`")]
    UnknownActivation(String),

    /// A slice had the wrong number of entries.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The layer index does not exist in this network.
    #[error("layer {0} does not exist")]
    NoSuchLayer(usize),

    /// The network was used before `connect` wired its feeders.
    #[error("network is not connected")]
    NotConnected,

    /// A string code could not be parsed.
    #[error("malformed string code: {0}")]
    MalformedCode(String),

    /// A parameter was present but its value was not acceptable.
    #[error("invalid value `{value}` for parameter `{name}`")]
    InvalidParam { name: String, value: String },

    /// Training data failed validation.
    #[error("invalid training data: {0}")]
    InvalidTrainingData(String),

    /// The fit needs a derivative order the model does not compute.
    #[error("derivative order `{0}` is not enabled on the model")]
    MissingDerivatives(&'static str),
}
