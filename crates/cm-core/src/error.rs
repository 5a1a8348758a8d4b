use thiserror::Error;

/// Failures raised by the polynomial core.
///
/// Everything here is a local, synchronous failure: no operation returns a
/// partial result alongside an error.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CmError {
    /// A position outside `[0, psi[N_VARS, degree])` was decoded.
    #[error("position {position} out of range for degree {degree} (len {len})")]
    IndexOutOfRange {
        degree: usize,
        position: usize,
        len: usize,
    },

    /// A degree beyond the tables that were built.
    #[error("degree {degree} exceeds the index tables (max degree {max_degree})")]
    DegreeOutOfRange { degree: usize, max_degree: usize },

    /// Coefficient arrays whose lengths disagree.
    #[error("shape mismatch: expected {expected} coefficients, found {found}")]
    ShapeMismatch { expected: usize, found: usize },

    /// A homological denominator indistinguishable from zero.
    #[error(
        "resonance at degree {degree}: exponents {exponents:?} give |denominator| = {denominator:e}"
    )]
    Resonance {
        degree: usize,
        exponents: [u32; 6],
        denominator: f64,
    },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("singular matrix: {0}")]
    SingularMatrix(String),

    /// A run export that could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, CmError>;
