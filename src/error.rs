use thiserror::Error;

use crate::layers::Curve;

/// Errors that can occur while sampling, validating or loading distributions.
#[derive(Debug, Error)]
pub enum DistributionError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("{curve} has {actual} samples, expected {expected}")]
    ShapeMismatch {
        curve: Curve,
        expected: usize,
        actual: usize,
    },

    #[error("{curve}[{index}] = {value} is not allowed: {reason}")]
    InvalidValue {
        curve: Curve,
        index: usize,
        value: f64,
        reason: &'static str,
    },

    #[error("distances must be strictly increasing, but distance[{index}] = {value} does not exceed its predecessor")]
    NonIncreasingAxis { index: usize, value: f64 },

    #[error("a distance axis needs at least 2 samples, got {0}")]
    AxisTooShort(usize),

    #[error("layer \"{0}\" is defined more than once")]
    DuplicateLayer(String),

    #[error("at least one layer is required")]
    EmptyCollection,

    #[error("layer \"{name}\": {source}")]
    Layer {
        name: String,
        #[source]
        source: Box<DistributionError>,
    },

    #[error("malformed document: {0}")]
    MalformedDocument(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl DistributionError {
    /// Attach the name of the layer this error was raised for.
    pub fn in_layer(self, name: &str) -> Self {
        Self::Layer {
            name: name.to_owned(),
            source: Box::new(self),
        }
    }
}

pub type Result<T> = std::result::Result<T, DistributionError>;
