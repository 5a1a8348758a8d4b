use num_complex::Complex64;
use rayon::prelude::*;

use crate::algebra::{ONE, ZERO, power_table};
use crate::constants::N_VARS;
use crate::error::{CmError, Result};
use crate::graded::GradedPoly;
use crate::index::{Exponents, IndexTables, unpack};

/// Many graded polynomials packed for repeated evaluation at many points.
///
/// Construction decodes every non-zero term once into contiguous exponent
/// and coefficient arrays; evaluation then never touches the index tables.
#[derive(Debug, Clone)]
pub struct BatchEvaluator {
    exponents: Vec<Exponents>,
    coeffs: Vec<Complex64>,
    /// `offsets[i]..offsets[i + 1]` are the terms of polynomial `i`.
    offsets: Vec<usize>,
    max_degree: usize,
}

impl BatchEvaluator {
    pub fn new(polys: &[GradedPoly], tables: &IndexTables) -> Result<Self> {
        let mut exponents = Vec::new();
        let mut coeffs = Vec::new();
        let mut offsets = Vec::with_capacity(polys.len() + 1);
        let mut max_degree = 0;
        offsets.push(0);

        for poly in polys {
            for (degree, block) in poly.blocks().iter().enumerate() {
                let codes = tables.codes(degree)?;
                for (&code, &c) in codes.iter().zip(block) {
                    if c == ZERO {
                        continue;
                    }
                    exponents.push(unpack(code));
                    coeffs.push(c);
                    max_degree = max_degree.max(degree);
                }
            }
            offsets.push(coeffs.len());
        }

        Ok(Self {
            exponents,
            coeffs,
            offsets,
            max_degree,
        })
    }

    pub fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn term_count(&self) -> usize {
        self.coeffs.len()
    }

    /// Values of polynomial `poly` at every point.
    pub fn evaluate_single(&self, poly: usize, points: &[[Complex64; N_VARS]]) -> Result<Vec<Complex64>> {
        if poly >= self.len() {
            return Err(CmError::InvalidParameter(format!(
                "polynomial {poly} out of range for a batch of {}",
                self.len()
            )));
        }
        Ok(points
            .par_iter()
            .map(|point| self.eval_one(poly, &power_table(point, self.max_degree)))
            .collect())
    }

    /// `result[i][j]` is polynomial `i` at `points[j]`.
    pub fn evaluate_all(&self, points: &[[Complex64; N_VARS]]) -> Vec<Vec<Complex64>> {
        let pow_tables: Vec<Vec<Vec<Complex64>>> = points
            .par_iter()
            .map(|p| power_table(p, self.max_degree))
            .collect();
        (0..self.len())
            .into_par_iter()
            .map(|i| pow_tables.iter().map(|pt| self.eval_one(i, pt)).collect())
            .collect()
    }

    fn eval_one(&self, poly: usize, pow_table: &[Vec<Complex64>]) -> Complex64 {
        let range = self.offsets[poly]..self.offsets[poly + 1];
        self.exponents[range.clone()]
            .iter()
            .zip(&self.coeffs[range])
            .map(|(k, &c)| {
                let monomial = (0..N_VARS).fold(ONE, |acc, v| acc * pow_table[v][k[v] as usize]);
                c * monomial
            })
            .sum()
    }
}
