//! Coordinate changes generated by the normal-form generators.
//!
//! Each expansion is the Lie series of one identity coordinate function, so
//! evaluating the six expansions at a point maps it between the complex
//! modal coordinates and the normal-form coordinates.

use num_complex::Complex64;
use rayon::prelude::*;

use crate::algebra::ZERO;
use crate::constants::N_VARS;
use crate::error::{CmError, Result};
use crate::graded::{GradedPoly, is_zero_block};
use crate::index::IndexTables;
use crate::lie::{GeneratingFunctions, apply_lie_transform};
use crate::manifold::restrict;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpansionDirection {
    /// Normal-form coordinates to complex modal coordinates.
    Forward,
    /// Complex modal coordinates to normal-form coordinates.
    Inverse,
}

/// Six graded polynomials, one per output coordinate.
///
/// `Forward` applies `exp(ad_{G_n})` for `n = 3..=N`; `Inverse` applies
/// `exp(ad_{-G_n})` for `n = N..=3`. With `restrict_to_center` every term
/// depending on `q1` or `p1` is dropped from the result.
pub fn lie_expansion(
    bundle: &GeneratingFunctions,
    direction: ExpansionDirection,
    tables: &IndexTables,
    tol: f64,
    restrict_to_center: bool,
) -> Result<Vec<GradedPoly>> {
    let max = bundle.max_degree();
    let (sign, degrees): (f64, Vec<usize>) = match direction {
        ExpansionDirection::Forward => (1.0, (3..=max).collect()),
        ExpansionDirection::Inverse => (-1.0, (3..=max).rev().collect()),
    };

    let steps: Vec<(usize, Vec<Complex64>)> = degrees
        .into_iter()
        .filter_map(|n| {
            let g = bundle.generator(n)?;
            if is_zero_block(g) {
                return None;
            }
            Some((n, g.iter().map(|c| *c * sign).collect()))
        })
        .collect();

    (0..N_VARS)
        .into_par_iter()
        .map(|var| {
            let mut coord = GradedPoly::variable(tables, max, var)?;
            for (n, g) in &steps {
                coord = apply_lie_transform(&coord, g, *n, tables, tol)?;
            }
            if restrict_to_center {
                coord = restrict(&coord, tables, 0.0)?;
            }
            Ok(coord)
        })
        .collect()
}

/// Evaluate the six expansions at `point`.
pub fn evaluate_transform(
    expansions: &[GradedPoly],
    point: &[Complex64; N_VARS],
    tables: &IndexTables,
) -> Result<[Complex64; N_VARS]> {
    if expansions.len() != N_VARS {
        return Err(CmError::ShapeMismatch {
            expected: N_VARS,
            found: expansions.len(),
        });
    }
    let mut out = [ZERO; N_VARS];
    for (slot, poly) in out.iter_mut().zip(expansions) {
        *slot = poly.evaluate(tables, point)?;
    }
    Ok(out)
}
