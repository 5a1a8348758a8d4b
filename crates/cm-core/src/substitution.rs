//! Linear changes of variables on graded polynomials.
//!
//! Matrices follow the convention `old = C * new`: row `i` of `C` is the
//! image of old variable `i` written in the new variables, and the result
//! satisfies `P_new(y) = P_old(C y)`.

use nalgebra::Matrix6;
use num_complex::Complex64;
use std::f64::consts::FRAC_1_SQRT_2;

use crate::algebra::{self, ONE, ZERO};
use crate::constants::N_VARS;
use crate::error::Result;
use crate::graded::{GradedPoly, is_zero_block};
use crate::index::{IndexTables, unpack};

/// Powers of the variable images, built on demand.
///
/// `powers[i][e]` is the homogeneous degree-`e` block of `(sum_j C[i,j] y_j)^e`.
struct ImagePowers<'a> {
    tables: &'a IndexTables,
    powers: Vec<Vec<Vec<Complex64>>>,
}

impl<'a> ImagePowers<'a> {
    fn new(tables: &'a IndexTables, matrix: &Matrix6<Complex64>) -> Result<Self> {
        let mut powers = Vec::with_capacity(N_VARS);
        for i in 0..N_VARS {
            let mut image = algebra::zeros(tables, 1)?;
            for j in 0..N_VARS {
                let coeff = matrix[(i, j)];
                if coeff != ZERO {
                    algebra::add_scaled_in_place(&mut image, &algebra::variable(tables, j)?, coeff)?;
                }
            }
            powers.push(vec![vec![ONE], image]);
        }
        Ok(Self { tables, powers })
    }

    fn get(&mut self, var: usize, exponent: usize) -> Result<&[Complex64]> {
        while self.powers[var].len() <= exponent {
            let e = self.powers[var].len() - 1;
            let next = algebra::multiply(self.tables, &self.powers[var][e], e, &self.powers[var][1], 1)?;
            self.powers[var].push(next);
        }
        Ok(&self.powers[var][exponent])
    }
}

/// Apply `old = C * new` to every degree block of `poly`.
///
/// The output keeps the input's maximum degree and is cleaned at `tol`.
pub fn substitute_linear(
    poly: &GradedPoly,
    matrix: &Matrix6<Complex64>,
    tables: &IndexTables,
    tol: f64,
) -> Result<GradedPoly> {
    let mut out = GradedPoly::zero(tables, poly.max_degree())?;
    let mut powers = ImagePowers::new(tables, matrix)?;

    for (degree, block) in poly.blocks().iter().enumerate() {
        if is_zero_block(block) {
            continue;
        }
        let mut acc = algebra::zeros(tables, degree)?;
        for (&code, &coeff) in tables.codes(degree)?.iter().zip(block) {
            if coeff == ZERO {
                continue;
            }
            let k = unpack(code);
            let mut term = vec![coeff];
            let mut term_degree = 0;
            for (var, &e) in k.iter().enumerate() {
                if e == 0 {
                    continue;
                }
                let e = e as usize;
                let factor = powers.get(var, e)?;
                term = algebra::multiply(tables, &term, term_degree, factor, e)?;
                term_degree += e;
            }
            algebra::add_scaled_in_place(&mut acc, &term, ONE)?;
        }
        algebra::clean_in_place(&mut acc, tol);
        out.set_block(degree, acc)?;
    }
    Ok(out)
}

/// Lift a real matrix to complex entries.
pub fn complexify_matrix(matrix: &Matrix6<f64>) -> Matrix6<Complex64> {
    matrix.map(|x| Complex64::new(x, 0.0))
}

/// `real = M * complex`: pairs `(x2, px2)` and `(x3, px3)` are mixed into
/// `q = (x + i px) / sqrt(2)` style combinations; the hyperbolic pair
/// passes through unchanged.
pub fn complexification_matrix() -> Matrix6<Complex64> {
    let s = Complex64::new(FRAC_1_SQRT_2, 0.0);
    let is = Complex64::new(0.0, FRAC_1_SQRT_2);
    let mut m = Matrix6::<Complex64>::zeros();
    m[(0, 0)] = ONE;
    m[(3, 3)] = ONE;
    for (q, p) in [(1, 4), (2, 5)] {
        m[(q, q)] = s;
        m[(q, p)] = is;
        m[(p, q)] = is;
        m[(p, p)] = s;
    }
    m
}

/// Inverse of [`complexification_matrix`].
pub fn realification_matrix() -> Matrix6<Complex64> {
    let s = Complex64::new(FRAC_1_SQRT_2, 0.0);
    let is = Complex64::new(0.0, -FRAC_1_SQRT_2);
    let mut m = Matrix6::<Complex64>::zeros();
    m[(0, 0)] = ONE;
    m[(3, 3)] = ONE;
    for (q, p) in [(1, 4), (2, 5)] {
        m[(q, q)] = s;
        m[(q, p)] = is;
        m[(p, q)] = is;
        m[(p, p)] = s;
    }
    m
}

/// Real-modal Hamiltonian to complex-modal coordinates.
pub fn substitute_complex(poly: &GradedPoly, tables: &IndexTables, tol: f64) -> Result<GradedPoly> {
    substitute_linear(poly, &complexification_matrix(), tables, tol)
}

/// Complex-modal Hamiltonian back to real-modal coordinates.
pub fn substitute_real(poly: &GradedPoly, tables: &IndexTables, tol: f64) -> Result<GradedPoly> {
    substitute_linear(poly, &realification_matrix(), tables, tol)
}

pub fn complex_to_real_point(z: &[Complex64; N_VARS]) -> [Complex64; N_VARS] {
    apply(&complexification_matrix(), z)
}

pub fn real_to_complex_point(x: &[Complex64; N_VARS]) -> [Complex64; N_VARS] {
    apply(&realification_matrix(), x)
}

/// `(q2, p2, q3, p3)` on the center manifold as a full 6-vector with the
/// hyperbolic pair at zero.
pub fn embed_center_point(center: &[Complex64; 4]) -> [Complex64; N_VARS] {
    let [q2, p2, q3, p3] = *center;
    [ZERO, q2, q3, ZERO, p2, p3]
}

pub(crate) fn apply(matrix: &Matrix6<Complex64>, v: &[Complex64; N_VARS]) -> [Complex64; N_VARS] {
    std::array::from_fn(|i| (0..N_VARS).map(|j| matrix[(i, j)] * v[j]).sum())
}
