use thiserror::Error;

/// Errors raised while building or advancing a model.
#[derive(Debug, Error)]
pub enum NlsError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("missing physical parameter `{0}`")]
    MissingParameter(&'static str),

    #[error("field length {found} does not match grid (expected {expected})")]
    ShapeMismatch { expected: usize, found: usize },

    #[error("field became non-finite by iteration {iteration}")]
    NumericalDivergence { iteration: u64 },

    #[error("reservoir denominator vanishes at node {node}")]
    DegenerateReservoir { node: usize },

    #[error("{what} holds a non-finite value at index {index}; JSON cannot represent it")]
    NonFiniteRecord { what: &'static str, index: usize },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, NlsError>;
