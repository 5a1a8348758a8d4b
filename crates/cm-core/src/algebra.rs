//! Arithmetic on homogeneous coefficient arrays.
//!
//! Every function takes the degree of each operand explicitly and the
//! shared [`IndexTables`]; inputs are never mutated except by the
//! `*_in_place` variants. Multiplication and differentiation fan out over
//! the non-zero terms of their first operand with one private output
//! buffer per rayon fold task, and sum the buffers on the calling thread.

use num_complex::Complex64;
use rayon::prelude::*;

use crate::constants::{EXPONENT_BITS, N_DOF, N_VARS, PARALLEL_MIN_TERMS};
use crate::error::{CmError, Result};
use crate::index::{IndexTables, unpack};

pub(crate) const ZERO: Complex64 = Complex64::new(0.0, 0.0);
pub(crate) const ONE: Complex64 = Complex64::new(1.0, 0.0);

/// Zero polynomial of the given degree.
pub fn zeros(tables: &IndexTables, degree: usize) -> Result<Vec<Complex64>> {
    Ok(vec![ZERO; tables.len(degree)?])
}

/// Degree-1 polynomial of the coordinate `var`.
pub fn variable(tables: &IndexTables, var: usize) -> Result<Vec<Complex64>> {
    check_var(var)?;
    let mut k = [0u32; N_VARS];
    k[var] = 1;
    let mut p = zeros(tables, 1)?;
    let idx = tables.encode(&k, 1).ok_or(CmError::DegreeOutOfRange {
        degree: 1,
        max_degree: tables.max_degree(),
    })?;
    p[idx] = ONE;
    Ok(p)
}

/// Element-wise `p + q`.
pub fn add(p: &[Complex64], q: &[Complex64]) -> Result<Vec<Complex64>> {
    check_len(p.len(), q.len())?;
    Ok(p.iter().zip(q).map(|(a, b)| a + b).collect())
}

/// Element-wise `alpha * p`.
pub fn scale(p: &[Complex64], alpha: Complex64) -> Vec<Complex64> {
    p.iter().map(|c| alpha * c).collect()
}

/// `acc += alpha * p`, for accumulators under exclusive ownership.
pub fn add_scaled_in_place(acc: &mut [Complex64], p: &[Complex64], alpha: Complex64) -> Result<()> {
    check_len(acc.len(), p.len())?;
    for (a, c) in acc.iter_mut().zip(p) {
        *a += alpha * c;
    }
    Ok(())
}

/// Product of a degree-`deg_p` and a degree-`deg_q` polynomial.
///
/// The output degree must be covered by `tables`; a product code missing
/// from the reverse map is dropped.
pub fn multiply(
    tables: &IndexTables,
    p: &[Complex64],
    deg_p: usize,
    q: &[Complex64],
    deg_q: usize,
) -> Result<Vec<Complex64>> {
    check_len(tables.len(deg_p)?, p.len())?;
    check_len(tables.len(deg_q)?, q.len())?;
    let deg_r = deg_p + deg_q;
    let out_len = tables.len(deg_r)?;

    let p_terms = nonzero_terms(p, tables.codes(deg_p)?);
    let q_terms = nonzero_terms(q, tables.codes(deg_q)?);
    if q_terms.is_empty() {
        return Ok(vec![ZERO; out_len]);
    }

    Ok(accumulate(out_len, &p_terms, |acc, &(code_i, pi)| {
        for &(code_j, qj) in &q_terms {
            if let Some(idx) = tables.position_of_code(code_i + code_j, deg_r) {
                acc[idx] += pi * qj;
            }
        }
    }))
}

/// Partial derivative with respect to variable `var`.
///
/// A degree-0 input yields the zero degree-0 polynomial.
pub fn differentiate(
    tables: &IndexTables,
    p: &[Complex64],
    degree: usize,
    var: usize,
) -> Result<Vec<Complex64>> {
    check_var(var)?;
    check_len(tables.len(degree)?, p.len())?;
    if degree == 0 {
        return zeros(tables, 0);
    }

    let out_degree = degree - 1;
    let out_len = tables.len(out_degree)?;
    let unit = 1u64 << (var as u32 * EXPONENT_BITS);
    let terms = nonzero_terms(p, tables.codes(degree)?);

    Ok(accumulate(out_len, &terms, |acc, &(code, c)| {
        let exp = unpack(code)[var];
        if exp == 0 {
            return;
        }
        if let Some(idx) = tables.position_of_code(code - unit, out_degree) {
            acc[idx] += c * f64::from(exp);
        }
    }))
}

/// Antiderivative with respect to `var`, integration constant zero.
pub fn integrate(
    tables: &IndexTables,
    p: &[Complex64],
    degree: usize,
    var: usize,
) -> Result<Vec<Complex64>> {
    check_var(var)?;
    check_len(tables.len(degree)?, p.len())?;
    let out_degree = degree + 1;
    let mut ip = zeros(tables, out_degree)?;
    let unit = 1u64 << (var as u32 * EXPONENT_BITS);

    for (&code, &c) in tables.codes(degree)?.iter().zip(p) {
        if c == ZERO {
            continue;
        }
        let exp = unpack(code)[var];
        if let Some(idx) = tables.position_of_code(code + unit, out_degree) {
            ip[idx] += c / f64::from(exp + 1);
        }
    }
    Ok(ip)
}

/// Poisson bracket `{p, q} = sum_m dp/dq_m * dq/dp_m - dp/dp_m * dq/dq_m`.
///
/// The result has degree `deg_p + deg_q - 2` and is zero when either
/// operand is a constant.
pub fn poisson_bracket(
    tables: &IndexTables,
    p: &[Complex64],
    deg_p: usize,
    q: &[Complex64],
    deg_q: usize,
) -> Result<Vec<Complex64>> {
    check_len(tables.len(deg_p)?, p.len())?;
    check_len(tables.len(deg_q)?, q.len())?;
    let deg_r = (deg_p + deg_q).saturating_sub(2);
    let mut r = zeros(tables, deg_r)?;
    if deg_p == 0 || deg_q == 0 {
        return Ok(r);
    }

    for m in 0..N_DOF {
        let dp_dq = differentiate(tables, p, deg_p, m)?;
        let dq_dp = differentiate(tables, q, deg_q, m + N_DOF)?;
        let term = multiply(tables, &dp_dq, deg_p - 1, &dq_dp, deg_q - 1)?;
        add_scaled_in_place(&mut r, &term, ONE)?;

        let dp_dp = differentiate(tables, p, deg_p, m + N_DOF)?;
        let dq_dq = differentiate(tables, q, deg_q, m)?;
        let term = multiply(tables, &dp_dp, deg_p - 1, &dq_dq, deg_q - 1)?;
        add_scaled_in_place(&mut r, &term, -ONE)?;
    }
    Ok(r)
}

/// Value of a homogeneous polynomial at `point`.
pub fn evaluate(
    tables: &IndexTables,
    p: &[Complex64],
    degree: usize,
    point: &[Complex64; N_VARS],
) -> Result<Complex64> {
    if p.is_empty() {
        return Ok(ZERO);
    }
    check_len(tables.len(degree)?, p.len())?;

    let pow_table = power_table(point, degree);
    let codes = tables.codes(degree)?;
    let mut sum = ZERO;
    for (&code, &c) in codes.iter().zip(p) {
        if c == ZERO {
            continue;
        }
        let k = unpack(code);
        let monomial = (0..N_VARS).fold(ONE, |acc, v| acc * pow_table[v][k[v] as usize]);
        sum += c * monomial;
    }
    Ok(sum)
}

/// Copy of `p` with every coefficient of magnitude `<= tol` set to zero.
pub fn clean(p: &[Complex64], tol: f64) -> Vec<Complex64> {
    p.iter()
        .map(|&c| if c.norm() <= tol { ZERO } else { c })
        .collect()
}

pub fn clean_in_place(p: &mut [Complex64], tol: f64) {
    for c in p.iter_mut() {
        if c.norm() <= tol {
            *c = ZERO;
        }
    }
}

/// `table[v][e] = point[v]^e` for `e` in `0..=degree`.
pub(crate) fn power_table(point: &[Complex64; N_VARS], degree: usize) -> Vec<Vec<Complex64>> {
    point
        .iter()
        .map(|&base| {
            let mut row = Vec::with_capacity(degree + 1);
            let mut acc = ONE;
            row.push(acc);
            for _ in 0..degree {
                acc *= base;
                row.push(acc);
            }
            row
        })
        .collect()
}

fn nonzero_terms(p: &[Complex64], codes: &[u64]) -> Vec<(u64, Complex64)> {
    codes
        .iter()
        .zip(p)
        .filter(|(_, c)| **c != ZERO)
        .map(|(&code, &c)| (code, c))
        .collect()
}

/// Run `body` over `items` into an `out_len` accumulator.
///
/// Large inputs are split across the rayon pool; every fold task owns its
/// own buffer and the buffers are summed sequentially afterwards.
fn accumulate<T, F>(out_len: usize, items: &[T], body: F) -> Vec<Complex64>
where
    T: Sync,
    F: Fn(&mut [Complex64], &T) + Sync + Send,
{
    let mut out = vec![ZERO; out_len];
    if items.len() < PARALLEL_MIN_TERMS {
        for item in items {
            body(&mut out, item);
        }
        return out;
    }

    let partials: Vec<Vec<Complex64>> = items
        .par_iter()
        .with_min_len(PARALLEL_MIN_TERMS / 4)
        .fold(
            || vec![ZERO; out_len],
            |mut acc, item| {
                body(&mut acc, item);
                acc
            },
        )
        .collect();

    for partial in &partials {
        for (o, v) in out.iter_mut().zip(partial) {
            *o += *v;
        }
    }
    out
}

fn check_len(expected: usize, found: usize) -> Result<()> {
    if expected != found {
        return Err(CmError::ShapeMismatch { expected, found });
    }
    Ok(())
}

fn check_var(var: usize) -> Result<()> {
    if var >= N_VARS {
        return Err(CmError::InvalidParameter(format!(
            "variable index {var} out of range 0..{N_VARS}"
        )));
    }
    Ok(())
}
