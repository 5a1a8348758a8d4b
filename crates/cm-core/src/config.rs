use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_MAX_DEGREE, EXPANSION_TOL, LIE_CLEAN_TOL, RESONANCE_TOL, SUBSTITUTION_TOL,
};
use crate::error::{CmError, Result};

/// Truncation degree and numerical thresholds of the normal-form pipeline.
///
/// Every field has a default, so a partial `[normal_form]` table in a TOML
/// file deserializes cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalFormConfig {
    pub max_degree: usize,
    /// Cleanup after each linear substitution.
    pub substitution_tol: f64,
    /// Cleanup after each Lie-series step.
    pub lie_clean_tol: f64,
    /// Cleanup after center-manifold restriction; `0.0` keeps every survivor.
    pub restrict_tol: f64,
    /// Smallest homological denominator accepted.
    pub resonance_tol: f64,
    /// Cleanup inside the coordinate expansions.
    pub expansion_tol: f64,
}

impl Default for NormalFormConfig {
    fn default() -> Self {
        Self {
            max_degree: DEFAULT_MAX_DEGREE,
            substitution_tol: SUBSTITUTION_TOL,
            lie_clean_tol: LIE_CLEAN_TOL,
            restrict_tol: 0.0,
            resonance_tol: RESONANCE_TOL,
            expansion_tol: EXPANSION_TOL,
        }
    }
}

impl NormalFormConfig {
    pub fn with_max_degree(mut self, max_degree: usize) -> Self {
        self.max_degree = max_degree;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_degree < 2 {
            return Err(CmError::InvalidParameter(format!(
                "max_degree must be at least 2, got {}",
                self.max_degree
            )));
        }
        for (name, value) in [
            ("substitution_tol", self.substitution_tol),
            ("lie_clean_tol", self.lie_clean_tol),
            ("restrict_tol", self.restrict_tol),
            ("resonance_tol", self.resonance_tol),
            ("expansion_tol", self.expansion_tol),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(CmError::InvalidParameter(format!(
                    "{name} must be a non-negative finite number, got {value}"
                )));
            }
        }
        Ok(())
    }
}
