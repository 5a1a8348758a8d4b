//! Bijection between exponent tuples and dense coefficient positions.
//!
//! For every degree `d` the monomials of total degree `d` in the six
//! phase-space variables are enumerated once, in descending lexicographic
//! order of `(k0, .., k5)`, and packed into `u64` codes with
//! `EXPONENT_BITS` bits per exponent. Position `i` in `codes(d)` is the
//! array index of that monomial in every degree-`d` coefficient array.
//!
//! Packing is additive: as long as no field overflows,
//! `pack(a + b) == pack(a) + pack(b)`. Multiplication relies on this to
//! combine codes without unpacking.

use std::collections::HashMap;

use crate::constants::{EXPONENT_BITS, EXPONENT_MASK, MAX_SUPPORTED_DEGREE, N_VARS};
use crate::error::{CmError, Result};

/// Exponents `(k0..k5)` of one monomial in `(q1, q2, q3, p1, p2, p3)`.
pub type Exponents = [u32; N_VARS];

/// Pack an exponent tuple into its integer code.
pub fn pack(k: &Exponents) -> u64 {
    k.iter()
        .enumerate()
        .fold(0u64, |acc, (i, &e)| acc | (u64::from(e) << (i as u32 * EXPONENT_BITS)))
}

/// Unpack an integer code into its exponent tuple.
pub fn unpack(code: u64) -> Exponents {
    let mut k = [0u32; N_VARS];
    for (i, slot) in k.iter_mut().enumerate() {
        *slot = ((code >> (i as u32 * EXPONENT_BITS)) & EXPONENT_MASK) as u32;
    }
    k
}

/// Total degree of an exponent tuple.
pub fn total_degree(k: &Exponents) -> usize {
    k.iter().map(|&e| e as usize).sum()
}

/// Immutable index context shared by every algebra call.
///
/// Built once per maximum degree and never mutated afterwards, so it can be
/// read from any number of worker threads without synchronization.
#[derive(Debug, Clone)]
pub struct IndexTables {
    max_degree: usize,
    /// `psi[v][d]`: number of degree-`d` monomials in `v` variables.
    psi: Vec<Vec<usize>>,
    /// `clmo[d][i]`: packed code of the monomial stored at position `i`.
    clmo: Vec<Vec<u64>>,
    /// Reverse map code → position, one per degree.
    encode: Vec<HashMap<u64, usize>>,
}

impl IndexTables {
    pub fn new(max_degree: usize) -> Result<Self> {
        if max_degree > MAX_SUPPORTED_DEGREE {
            return Err(CmError::InvalidParameter(format!(
                "max degree {max_degree} exceeds the packed-code limit {MAX_SUPPORTED_DEGREE}"
            )));
        }

        let psi = build_psi(max_degree);

        let clmo: Vec<Vec<u64>> = (0..=max_degree)
            .map(|d| {
                let mut codes = Vec::with_capacity(psi[N_VARS][d]);
                let mut k = [0u32; N_VARS];
                enumerate_monomials(0, d as u32, &mut k, &mut codes);
                codes
            })
            .collect();

        let encode = clmo
            .iter()
            .map(|codes| codes.iter().enumerate().map(|(i, &c)| (c, i)).collect())
            .collect();

        Ok(Self {
            max_degree,
            psi,
            clmo,
            encode,
        })
    }

    pub fn max_degree(&self) -> usize {
        self.max_degree
    }

    /// Number of degree-`degree` monomials in `vars` variables, if tabulated.
    pub fn psi(&self, vars: usize, degree: usize) -> Option<usize> {
        self.psi.get(vars)?.get(degree).copied()
    }

    /// Length of a homogeneous degree-`degree` coefficient array.
    pub fn len(&self, degree: usize) -> Result<usize> {
        self.check_degree(degree)?;
        Ok(self.psi[N_VARS][degree])
    }

    /// Packed codes of degree `degree`, in position order.
    pub fn codes(&self, degree: usize) -> Result<&[u64]> {
        self.check_degree(degree)?;
        Ok(&self.clmo[degree])
    }

    /// Exponent tuple stored at `position` of a degree-`degree` array.
    pub fn decode(&self, position: usize, degree: usize) -> Result<Exponents> {
        let codes = self.codes(degree)?;
        codes
            .get(position)
            .map(|&c| unpack(c))
            .ok_or(CmError::IndexOutOfRange {
                degree,
                position,
                len: codes.len(),
            })
    }

    /// Position of `k` in a degree-`degree` array.
    ///
    /// `None` means "not representable at this degree": the tuple's total
    /// degree differs from `degree`, or `degree` lies beyond the tables.
    /// Callers accumulating products treat it as a dropped contribution.
    pub fn encode(&self, k: &Exponents, degree: usize) -> Option<usize> {
        if total_degree(k) != degree || k.iter().any(|&e| u64::from(e) > EXPONENT_MASK) {
            return None;
        }
        self.position_of_code(pack(k), degree)
    }

    /// Position of an already packed code in a degree-`degree` array.
    pub fn position_of_code(&self, code: u64, degree: usize) -> Option<usize> {
        self.encode.get(degree)?.get(&code).copied()
    }

    /// Degree of a homogeneous block inferred from its length.
    pub fn degree_of_len(&self, len: usize) -> Option<usize> {
        (0..=self.max_degree).find(|&d| self.psi[N_VARS][d] == len)
    }

    pub(crate) fn check_degree(&self, degree: usize) -> Result<()> {
        if degree > self.max_degree {
            return Err(CmError::DegreeOutOfRange {
                degree,
                max_degree: self.max_degree,
            });
        }
        Ok(())
    }
}

/// Stars-and-bars table: `psi[0][0] = 1`, `psi[v][d] = psi[v-1][d] + psi[v][d-1]`.
fn build_psi(max_degree: usize) -> Vec<Vec<usize>> {
    let mut psi = vec![vec![0usize; max_degree + 1]; N_VARS + 1];
    psi[0][0] = 1;
    for v in 1..=N_VARS {
        psi[v][0] = 1;
        for d in 1..=max_degree {
            psi[v][d] = psi[v - 1][d] + psi[v][d - 1];
        }
    }
    psi
}

fn enumerate_monomials(var: usize, remaining: u32, k: &mut Exponents, out: &mut Vec<u64>) {
    if var == N_VARS - 1 {
        k[var] = remaining;
        out.push(pack(k));
        return;
    }
    for e in (0..=remaining).rev() {
        k[var] = e;
        enumerate_monomials(var + 1, remaining - e, k, out);
    }
    k[var] = 0;
}
