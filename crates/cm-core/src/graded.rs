use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::algebra::{self, ONE, ZERO};
use crate::constants::{MAX_SUPPORTED_DEGREE, N_VARS};
use crate::error::{CmError, Result};
use crate::index::IndexTables;

/// A polynomial stored as one dense homogeneous block per degree
/// `0..=max_degree`.
///
/// Every block has exactly the length the index tables assign to its
/// degree; absent terms are zeros. Products and brackets are truncated at
/// `max_degree`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawGradedPoly")]
pub struct GradedPoly {
    blocks: Vec<Vec<Complex64>>,
}

#[derive(Deserialize)]
struct RawGradedPoly {
    blocks: Vec<Vec<Complex64>>,
}

impl TryFrom<RawGradedPoly> for GradedPoly {
    type Error = CmError;

    fn try_from(raw: RawGradedPoly) -> Result<Self> {
        let max_degree = raw.blocks.len().checked_sub(1).ok_or_else(|| {
            CmError::InvalidParameter(
                "a graded polynomial needs at least the degree-0 block".to_string(),
            )
        })?;
        if max_degree > MAX_SUPPORTED_DEGREE {
            return Err(CmError::DegreeOutOfRange {
                degree: max_degree,
                max_degree: MAX_SUPPORTED_DEGREE,
            });
        }
        // Check lengths before building tables sized by untrusted input.
        for (d, block) in raw.blocks.iter().enumerate() {
            let expected = homogeneous_len(d);
            if block.len() != expected {
                return Err(CmError::ShapeMismatch {
                    expected,
                    found: block.len(),
                });
            }
        }
        let tables = IndexTables::new(max_degree)?;
        Self::from_blocks(&tables, raw.blocks)
    }
}

/// Number of degree-`d` monomials in six variables, `C(d + 5, 5)`.
fn homogeneous_len(d: usize) -> usize {
    (1..N_VARS).fold(1, |acc, i| acc * (d + i) / i)
}

impl GradedPoly {
    pub fn zero(tables: &IndexTables, max_degree: usize) -> Result<Self> {
        tables.check_degree(max_degree)?;
        let blocks = (0..=max_degree)
            .map(|d| algebra::zeros(tables, d))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { blocks })
    }

    /// Wrap existing blocks, checking each length against the tables.
    pub fn from_blocks(tables: &IndexTables, blocks: Vec<Vec<Complex64>>) -> Result<Self> {
        if blocks.is_empty() {
            return Err(CmError::InvalidParameter(
                "a graded polynomial needs at least the degree-0 block".to_string(),
            ));
        }
        for (d, block) in blocks.iter().enumerate() {
            let expected = tables.len(d)?;
            if block.len() != expected {
                return Err(CmError::ShapeMismatch {
                    expected,
                    found: block.len(),
                });
            }
        }
        Ok(Self { blocks })
    }

    /// The coordinate `x_var` as a graded polynomial.
    pub fn variable(tables: &IndexTables, max_degree: usize, var: usize) -> Result<Self> {
        let mut p = Self::zero(tables, max_degree.max(1))?;
        p.blocks[1] = algebra::variable(tables, var)?;
        Ok(p)
    }

    /// The six coordinate functions `(q1, q2, q3, p1, p2, p3)`.
    pub fn identity(tables: &IndexTables, max_degree: usize) -> Result<Vec<Self>> {
        (0..N_VARS)
            .map(|v| Self::variable(tables, max_degree, v))
            .collect()
    }

    pub fn max_degree(&self) -> usize {
        self.blocks.len() - 1
    }

    pub fn block(&self, degree: usize) -> Option<&[Complex64]> {
        self.blocks.get(degree).map(Vec::as_slice)
    }

    pub fn block_mut(&mut self, degree: usize) -> Option<&mut [Complex64]> {
        self.blocks.get_mut(degree).map(Vec::as_mut_slice)
    }

    pub fn blocks(&self) -> &[Vec<Complex64>] {
        &self.blocks
    }

    pub fn into_blocks(self) -> Vec<Vec<Complex64>> {
        self.blocks
    }

    /// Replace the block of `degree`, keeping its length.
    pub fn set_block(&mut self, degree: usize, block: Vec<Complex64>) -> Result<()> {
        let max_degree = self.max_degree();
        let slot = self
            .blocks
            .get_mut(degree)
            .ok_or(CmError::DegreeOutOfRange { degree, max_degree })?;
        if slot.len() != block.len() {
            return Err(CmError::ShapeMismatch {
                expected: slot.len(),
                found: block.len(),
            });
        }
        *slot = block;
        Ok(())
    }

    /// Copy with `max_degree` blocks: higher blocks are dropped, missing
    /// ones are zero.
    pub fn resized(&self, tables: &IndexTables, max_degree: usize) -> Result<Self> {
        let mut out = Self::zero(tables, max_degree)?;
        for (slot, block) in out.blocks.iter_mut().zip(&self.blocks) {
            slot.clone_from(block);
        }
        Ok(out)
    }

    /// `self += alpha * other` over the degrees both share.
    ///
    /// Blocks of `other` above `self.max_degree()` are dropped.
    pub fn add_scaled_in_place(&mut self, other: &GradedPoly, alpha: Complex64) -> Result<()> {
        for (acc, block) in self.blocks.iter_mut().zip(&other.blocks) {
            algebra::add_scaled_in_place(acc, block, alpha)?;
        }
        Ok(())
    }

    pub fn scale(&self, alpha: Complex64) -> Self {
        Self {
            blocks: self
                .blocks
                .iter()
                .map(|b| algebra::scale(b, alpha))
                .collect(),
        }
    }

    /// Truncated product; the result keeps `self.max_degree()`.
    pub fn multiply(&self, other: &GradedPoly, tables: &IndexTables) -> Result<Self> {
        let max = self.max_degree();
        let mut out = Self::zero(tables, max)?;
        for (di, bi) in self.blocks.iter().enumerate() {
            if is_zero_block(bi) {
                continue;
            }
            for (dj, bj) in other.blocks.iter().enumerate() {
                if di + dj > max {
                    break;
                }
                if is_zero_block(bj) {
                    continue;
                }
                let r = algebra::multiply(tables, bi, di, bj, dj)?;
                algebra::add_scaled_in_place(&mut out.blocks[di + dj], &r, ONE)?;
            }
        }
        Ok(out)
    }

    /// Truncated power by repeated squaring.
    pub fn pow(&self, exponent: u32, tables: &IndexTables) -> Result<Self> {
        let mut result = Self::zero(tables, self.max_degree())?;
        result.blocks[0][0] = ONE;
        let mut base = self.clone();
        let mut e = exponent;
        while e > 0 {
            if e & 1 == 1 {
                result = result.multiply(&base, tables)?;
            }
            e >>= 1;
            if e > 0 {
                base = base.multiply(&base, tables)?;
            }
        }
        Ok(result)
    }

    /// Graded `{self, other}`; contributions above `self.max_degree()` are dropped.
    pub fn poisson_bracket(&self, other: &GradedPoly, tables: &IndexTables) -> Result<Self> {
        let max = self.max_degree();
        let mut out = Self::zero(tables, max)?;
        for (di, bi) in self.blocks.iter().enumerate().skip(1) {
            if is_zero_block(bi) {
                continue;
            }
            for (dj, bj) in other.blocks.iter().enumerate().skip(1) {
                if di + dj - 2 > max {
                    break;
                }
                if is_zero_block(bj) {
                    continue;
                }
                let r = algebra::poisson_bracket(tables, bi, di, bj, dj)?;
                algebra::add_scaled_in_place(&mut out.blocks[di + dj - 2], &r, ONE)?;
            }
        }
        Ok(out)
    }

    pub fn evaluate(&self, tables: &IndexTables, point: &[Complex64; N_VARS]) -> Result<Complex64> {
        let mut sum = ZERO;
        for (d, block) in self.blocks.iter().enumerate() {
            sum += algebra::evaluate(tables, block, d, point)?;
        }
        Ok(sum)
    }

    pub fn clean(&self, tol: f64) -> Self {
        Self {
            blocks: self.blocks.iter().map(|b| algebra::clean(b, tol)).collect(),
        }
    }

    pub fn clean_in_place(&mut self, tol: f64) {
        for block in &mut self.blocks {
            algebra::clean_in_place(block, tol);
        }
    }

    pub fn nonzero_count(&self) -> usize {
        self.blocks
            .iter()
            .map(|b| b.iter().filter(|c| **c != ZERO).count())
            .sum()
    }

    /// Lowest degree holding a non-zero coefficient.
    pub fn lowest_nonzero_degree(&self) -> Option<usize> {
        self.blocks.iter().position(|b| !is_zero_block(b))
    }

    pub fn is_zero(&self) -> bool {
        self.blocks.iter().all(|b| is_zero_block(b))
    }

    /// Largest coefficient magnitude of the block at `degree`.
    pub fn max_abs(&self, degree: usize) -> f64 {
        self.block(degree)
            .map(|b| b.iter().map(|c| c.norm()).fold(0.0, f64::max))
            .unwrap_or(0.0)
    }
}

pub(crate) fn is_zero_block(block: &[Complex64]) -> bool {
    block.iter().all(|c| *c == ZERO)
}
