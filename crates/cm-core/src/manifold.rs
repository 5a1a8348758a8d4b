use std::fmt::Write as _;

use crate::algebra::ZERO;
use crate::error::Result;
use crate::graded::GradedPoly;
use crate::index::{IndexTables, unpack};

/// Coefficients at or below this magnitude are left out of printed tables.
const TABLE_TOL: f64 = 1e-14;

/// Drop every term that depends on the hyperbolic pair `(q1, p1)`.
///
/// Survivors with magnitude at or below `tol` are dropped too. The result
/// is a fresh polynomial; restricting twice changes nothing.
pub fn restrict(h: &GradedPoly, tables: &IndexTables, tol: f64) -> Result<GradedPoly> {
    let mut out = h.clone();
    for degree in 0..=out.max_degree() {
        let codes = tables.codes(degree)?;
        if let Some(block) = out.block_mut(degree) {
            for (c, &code) in block.iter_mut().zip(codes) {
                let k = unpack(code);
                if k[0] != 0 || k[3] != 0 || c.norm() <= tol {
                    *c = ZERO;
                }
            }
        }
    }
    Ok(out)
}

/// Render the non-zero coefficients of a center-manifold Hamiltonian.
///
/// One row per term, grouped by degree, with the exponents of
/// `(q2, p2, q3, p3)`.
pub fn format_cm_table(poly: &GradedPoly, tables: &IndexTables) -> Result<String> {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>3}  {:>2} {:>2} {:>2} {:>2}  {:>24}  {:>24}",
        "deg", "q2", "p2", "q3", "p3", "re", "im"
    );
    let mut rows = 0usize;
    for (degree, block) in poly.blocks().iter().enumerate() {
        let codes = tables.codes(degree)?;
        for (&code, c) in codes.iter().zip(block) {
            if c.norm() <= TABLE_TOL {
                continue;
            }
            let k = unpack(code);
            let _ = writeln!(
                out,
                "{:>3}  {:>2} {:>2} {:>2} {:>2}  {:>24.16e}  {:>24.16e}",
                degree, k[1], k[4], k[2], k[5], c.re, c.im
            );
            rows += 1;
        }
    }
    let _ = writeln!(out, "{rows} terms");
    Ok(out)
}
