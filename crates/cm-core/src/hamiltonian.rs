use num_complex::Complex64;

use crate::algebra::{self, ONE};
use crate::error::Result;
use crate::graded::GradedPoly;
use crate::index::IndexTables;
use crate::libration::CollinearPoint;

/// Hamiltonian of the restricted three-body problem expanded around a
/// collinear point, in local coordinates `(x, y, z, px, py, pz)`:
///
/// `H = (px^2 + py^2 + pz^2) / 2 + y px - x py - sum_{n=2..=N} c_n T_n`
///
/// where `T_n = rho^n P_n(x / rho)` is built from the Legendre recurrence.
pub fn build_physical_hamiltonian(
    point: &CollinearPoint,
    tables: &IndexTables,
    max_degree: usize,
) -> Result<GradedPoly> {
    let mut h = GradedPoly::zero(tables, max_degree.max(2))?;
    let half = Complex64::new(0.5, 0.0);
    let quad = |i: usize, j: usize| -> Result<Vec<Complex64>> {
        algebra::multiply(
            tables,
            &algebra::variable(tables, i)?,
            1,
            &algebra::variable(tables, j)?,
            1,
        )
    };

    let mut h2 = algebra::zeros(tables, 2)?;
    for p in 3..6 {
        algebra::add_scaled_in_place(&mut h2, &quad(p, p)?, half)?;
    }
    algebra::add_scaled_in_place(&mut h2, &quad(1, 3)?, ONE)?;
    algebra::add_scaled_in_place(&mut h2, &quad(0, 4)?, -ONE)?;
    h.set_block(2, h2)?;

    let mut rho2 = algebra::zeros(tables, 2)?;
    for q in 0..3 {
        algebra::add_scaled_in_place(&mut rho2, &quad(q, q)?, ONE)?;
    }

    // T_{n-2}, T_{n-1}
    let mut prev = vec![ONE];
    let mut curr = algebra::variable(tables, 0)?;
    let x = curr.clone();
    let gamma = point.gamma()?;
    for n in 2..=max_degree {
        let nf = n as f64;
        let a = Complex64::new((2.0 * nf - 1.0) / nf, 0.0);
        let b = Complex64::new(-(nf - 1.0) / nf, 0.0);
        let mut next = algebra::scale(&algebra::multiply(tables, &x, 1, &curr, n - 1)?, a);
        let tail = algebra::multiply(tables, &rho2, 2, &prev, n - 2)?;
        algebra::add_scaled_in_place(&mut next, &tail, b)?;

        let cn = point.cn_for_gamma(n, gamma);
        if let Some(block) = h.block_mut(n) {
            for (hc, t) in block.iter_mut().zip(&next) {
                *hc -= *t * cn;
            }
        }
        prev = curr;
        curr = next;
    }
    Ok(h)
}
