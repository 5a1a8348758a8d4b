/// Number of phase-space variables: (q1, q2, q3, p1, p2, p3).
pub const N_VARS: usize = 6;

/// Degrees of freedom (canonical pairs).
pub const N_DOF: usize = 3;

/// Bits per exponent in a packed monomial code.
pub const EXPONENT_BITS: u32 = 6;

/// Mask for a single packed exponent field.
pub const EXPONENT_MASK: u64 = (1 << EXPONENT_BITS) - 1;

/// Largest total degree representable with `EXPONENT_BITS` per exponent.
pub const MAX_SUPPORTED_DEGREE: usize = EXPONENT_MASK as usize;

/// Cleanup tolerance applied after every linear substitution
pub const SUBSTITUTION_TOL: f64 = 1e-14;

/// Cleanup tolerance applied after every Lie-series step
pub const LIE_CLEAN_TOL: f64 = 1e-15;

/// Smallest homological denominator accepted before reporting a resonance.
pub const RESONANCE_TOL: f64 = 1e-12;

/// Cleanup tolerance inside the coordinate expansions
pub const EXPANSION_TOL: f64 = 1e-30;

/// Below this many non-zero input terms, multiply/differentiate stay on
/// the calling thread.
pub const PARALLEL_MIN_TERMS: usize = 64;

/// Agreement required between the batch evaluator and `evaluate`.
pub const BATCH_EVAL_TOL: f64 = 1e-9;

/// Default truncation degree of the normal form.
pub const DEFAULT_MAX_DEGREE: usize = 8;
