//! Degree-by-degree Lie-series normalization.
//!
//! Starting from a complex-modal Hamiltonian whose quadratic part is
//! `lambda q1 p1 + i w1 q2 p2 + i w2 q3 p3`, each degree `n = 3..=N`
//! contributes a generating function `G_n` that removes every monomial with
//! `k[0] != k[3]` from `H_n`. The whole Hamiltonian is then pushed through
//! `exp(ad_{G_n})` before moving on to `n + 1`.

use nalgebra::Matrix6;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::algebra::{self, ZERO};
use crate::config::NormalFormConfig;
use crate::error::{CmError, Result};
use crate::graded::{GradedPoly, is_zero_block};
use crate::index::{IndexTables, unpack};

/// Linear data of a libration point, as consumed by the normal-form engine.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalFormData {
    /// Hyperbolic exponent.
    pub lambda1: f64,
    /// In-plane elliptic frequency.
    pub omega1: f64,
    /// Vertical elliptic frequency.
    pub omega2: f64,
    /// Symplectic change `local = C * real_modal`.
    pub c: Matrix6<f64>,
    pub c_inverse: Matrix6<f64>,
}

impl NormalFormData {
    /// `(lambda1, i*omega1, i*omega2)`: the diagonal of `H_2` per canonical pair.
    pub fn eta(&self) -> [Complex64; 3] {
        [
            Complex64::new(self.lambda1, 0.0),
            Complex64::new(0.0, self.omega1),
            Complex64::new(0.0, self.omega2),
        ]
    }
}

/// Everything the normalization produced besides the normal form itself.
///
/// Block `n` of `generators` is `G_n` and block `n` of `eliminated` holds the
/// terms removed at degree `n`; blocks below 3 are zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawGeneratingFunctions")]
pub struct GeneratingFunctions {
    pub generators: GradedPoly,
    pub eliminated: GradedPoly,
}

#[derive(Deserialize)]
struct RawGeneratingFunctions {
    generators: GradedPoly,
    eliminated: GradedPoly,
}

impl TryFrom<RawGeneratingFunctions> for GeneratingFunctions {
    type Error = CmError;

    fn try_from(raw: RawGeneratingFunctions) -> Result<Self> {
        if raw.generators.max_degree() != raw.eliminated.max_degree() {
            return Err(CmError::ShapeMismatch {
                expected: raw.generators.max_degree(),
                found: raw.eliminated.max_degree(),
            });
        }
        Ok(Self {
            generators: raw.generators,
            eliminated: raw.eliminated,
        })
    }
}

impl GeneratingFunctions {
    pub fn max_degree(&self) -> usize {
        self.generators.max_degree()
    }

    pub fn generator(&self, degree: usize) -> Option<&[Complex64]> {
        self.generators.block(degree)
    }
}

/// Copy of the degree-`n` block of `h`.
///
/// Degrees above `h.max_degree()` but inside the tables yield zeros.
pub fn homogeneous_terms(h: &GradedPoly, n: usize, tables: &IndexTables) -> Result<Vec<Complex64>> {
    match h.block(n) {
        Some(block) => Ok(block.to_vec()),
        None => algebra::zeros(tables, n),
    }
}

/// Copy of `p` keeping only the terms with `k[0] != k[3]`.
pub fn select_for_elimination(
    p: &[Complex64],
    degree: usize,
    tables: &IndexTables,
) -> Result<Vec<Complex64>> {
    let codes = tables.codes(degree)?;
    if codes.len() != p.len() {
        return Err(CmError::ShapeMismatch {
            expected: codes.len(),
            found: p.len(),
        });
    }
    Ok(codes
        .iter()
        .zip(p)
        .map(|(&code, &c)| {
            let k = unpack(code);
            if k[0] != k[3] { c } else { ZERO }
        })
        .collect())
}

/// Solve `{H_2, G} = -p_bad` term by term.
///
/// `p_bad` must only hold terms with `k[0] != k[3]`; positions of the other
/// terms are zero in the result. A denominator with magnitude below
/// `resonance_tol` is reported as [`CmError::Resonance`].
pub fn solve_homological_equation(
    p_bad: &[Complex64],
    degree: usize,
    eta: &[Complex64; 3],
    tables: &IndexTables,
    resonance_tol: f64,
) -> Result<Vec<Complex64>> {
    let codes = tables.codes(degree)?;
    if codes.len() != p_bad.len() {
        return Err(CmError::ShapeMismatch {
            expected: codes.len(),
            found: p_bad.len(),
        });
    }

    let mut g = vec![ZERO; p_bad.len()];
    for ((&code, &h), slot) in codes.iter().zip(p_bad).zip(g.iter_mut()) {
        let k = unpack(code);
        if h == ZERO || k[0] == k[3] {
            continue;
        }
        let denom: Complex64 = (0..3)
            .map(|m| eta[m] * (f64::from(k[m + 3]) - f64::from(k[m])))
            .sum();
        if denom.norm() < resonance_tol {
            return Err(CmError::Resonance {
                degree,
                exponents: k,
                denominator: denom.norm(),
            });
        }
        *slot = -h / denom;
    }
    Ok(g)
}

/// Number of brackets needed so every contribution at or below `max_degree`
/// is kept when `h` (lowest degree `d_min`) is transformed by a degree-`n`
/// generator.
///
/// Never less than the minimal `max(1, n - 1)`; for low `n` it is larger,
/// since each bracket only raises the degree by `n - 2`.
pub(crate) fn series_length(n: usize, d_min: usize, max_degree: usize) -> usize {
    let floor = n.saturating_sub(1).max(1);
    if n <= 2 {
        return 1;
    }
    let step = n - 2;
    let reach = max_degree.saturating_sub(d_min).div_ceil(step);
    floor.max(reach)
}

/// `exp(ad_{G_n}) H = H + {H, G_n} + {{H, G_n}, G_n} / 2! + ...`, truncated
/// at `h.max_degree()`. Every block that can receive a bracket term is
/// cleaned at `clean_tol`.
pub fn apply_lie_transform(
    h: &GradedPoly,
    g_n: &[Complex64],
    n: usize,
    tables: &IndexTables,
    clean_tol: f64,
) -> Result<GradedPoly> {
    let max = h.max_degree();
    let mut generator = GradedPoly::zero(tables, max.max(n))?;
    generator.set_block(n, g_n.to_vec())?;

    let d_min = h.lowest_nonzero_degree().unwrap_or(0);
    let k_max = series_length(n, d_min, max);

    let mut out = h.clone();
    let mut term = h.clone();
    for k in 1..=k_max {
        term = term.poisson_bracket(&generator, tables)?;
        term = term.scale(Complex64::new(1.0 / k as f64, 0.0));
        if term.is_zero() {
            break;
        }
        out.add_scaled_in_place(&term, Complex64::new(1.0, 0.0))?;
    }
    // Blocks below the first bracket contribution are returned untouched.
    for degree in (d_min + n).saturating_sub(2)..=max {
        if let Some(block) = out.block_mut(degree) {
            algebra::clean_in_place(block, clean_tol);
        }
    }
    Ok(out)
}

/// Normalize `h_init` up to its own maximum degree.
///
/// Returns the normal-form Hamiltonian and the generating functions. The
/// quadratic block is never touched; a resonance at any degree aborts the
/// whole run.
pub fn lie_transform(
    h_init: &GradedPoly,
    data: &NormalFormData,
    tables: &IndexTables,
    config: &NormalFormConfig,
) -> Result<(GradedPoly, GeneratingFunctions)> {
    let max = h_init.max_degree();
    let eta = data.eta();
    let mut h = h_init.clone();
    let mut generators = GradedPoly::zero(tables, max)?;
    let mut eliminated = GradedPoly::zero(tables, max)?;

    for n in 3..=max {
        let h_n = homogeneous_terms(&h, n, tables)?;
        let bad = select_for_elimination(&h_n, n, tables)?;
        if is_zero_block(&bad) {
            debug!(degree = n, "no terms to eliminate");
            continue;
        }

        let g_n = solve_homological_equation(&bad, n, &eta, tables, config.resonance_tol)?;
        h = apply_lie_transform(&h, &g_n, n, tables, config.lie_clean_tol)?;

        let residual = select_for_elimination(&homogeneous_terms(&h, n, tables)?, n, tables)?
            .iter()
            .map(|c| c.norm())
            .fold(0.0, f64::max);
        if residual > config.lie_clean_tol {
            warn!(degree = n, residual, "bad terms survived elimination");
        }
        debug!(
            degree = n,
            eliminated = bad.iter().filter(|c| **c != ZERO).count(),
            residual,
            "degree normalized"
        );

        generators.set_block(n, g_n)?;
        eliminated.set_block(n, bad)?;
    }

    info!(max_degree = max, terms = h.nonzero_count(), "normal form computed");
    Ok((
        h,
        GeneratingFunctions {
            generators,
            eliminated,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    const ETA_TEST: (f64, f64, f64) = (3.1, 2.4, 2.2);

    fn rng() -> SmallRng {
        SmallRng::seed_from_u64(42)
    }

    fn eta() -> [Complex64; 3] {
        let (l, w1, w2) = ETA_TEST;
        [
            Complex64::new(l, 0.0),
            Complex64::new(0.0, w1),
            Complex64::new(0.0, w2),
        ]
    }

    fn test_data() -> NormalFormData {
        let (lambda1, omega1, omega2) = ETA_TEST;
        NormalFormData {
            lambda1,
            omega1,
            omega2,
            c: Matrix6::identity(),
            c_inverse: Matrix6::identity(),
        }
    }

    fn h2(tables: &IndexTables, max: usize) -> GradedPoly {
        let mut h = GradedPoly::zero(tables, max).unwrap();
        let e = eta();
        for (m, k) in [[1, 0, 0, 1, 0, 0], [0, 1, 0, 0, 1, 0], [0, 0, 1, 0, 0, 1]]
            .into_iter()
            .enumerate()
        {
            let idx = tables.encode(&k, 2).unwrap();
            h.block_mut(2).unwrap()[idx] = e[m];
        }
        h
    }

    fn random_block(tables: &IndexTables, degree: usize, scale: f64, rng: &mut SmallRng) -> Vec<Complex64> {
        (0..tables.len(degree).unwrap())
            .map(|_| {
                Complex64::new(rng.random_range(-scale..scale), rng.random_range(-scale..scale))
            })
            .collect()
    }

    #[test]
    fn test_homogeneous_terms_copy_and_padding() {
        let t = IndexTables::new(6).unwrap();
        let mut rng = rng();
        let mut h = GradedPoly::zero(&t, 4).unwrap();
        h.set_block(3, random_block(&t, 3, 1.0, &mut rng)).unwrap();

        let h3 = homogeneous_terms(&h, 3, &t).unwrap();
        assert_eq!(h3.as_slice(), h.block(3).unwrap());

        let h5 = homogeneous_terms(&h, 5, &t).unwrap();
        assert_eq!(h5.len(), t.len(5).unwrap());
        assert!(h5.iter().all(|c| *c == ZERO));

        assert!(homogeneous_terms(&h, 7, &t).is_err());
    }

    #[test]
    fn test_select_for_elimination_is_pure() {
        let t = IndexTables::new(5).unwrap();
        let mut rng = rng();
        for n in 2..=5 {
            let p = random_block(&t, n, 1.0, &mut rng);
            let before = p.clone();
            let bad = select_for_elimination(&p, n, &t).unwrap();
            assert_eq!(p, before, "input mutated at degree {n}");
            for (i, (&b, &orig)) in bad.iter().zip(&p).enumerate() {
                let k = t.decode(i, n).unwrap();
                if k[0] != k[3] {
                    assert_eq!(b, orig);
                } else {
                    assert_eq!(b, ZERO);
                }
            }
        }
    }

    #[test]
    fn test_homological_identity() {
        let n = 6;
        let t = IndexTables::new(n).unwrap();
        let mut rng = SmallRng::seed_from_u64(1234);
        let raw = random_block(&t, n, 1.0, &mut rng);
        let bad = select_for_elimination(&raw, n, &t).unwrap();

        let g = solve_homological_equation(&bad, n, &eta(), &t, 1e-12).unwrap();
        let h = h2(&t, n);
        let pb = algebra::poisson_bracket(&t, h.block(2).unwrap(), 2, &g, n).unwrap();

        for (i, (x, y)) in pb.iter().zip(&bad).enumerate() {
            let target = -y;
            let tol = 1e-14 + 1e-14 * target.norm();
            assert!((x - target).norm() <= tol, "position {i}: {x} vs {target}");
            let k = t.decode(i, n).unwrap();
            if k[0] == k[3] {
                assert_eq!(g[i], ZERO, "good position {i} must stay zero");
            }
        }
    }

    #[test]
    fn test_resonance_is_reported() {
        // With lambda = 0 the denominator of q1 q2 p2 vanishes.
        let t = IndexTables::new(3).unwrap();
        let eta = [ZERO, Complex64::new(0.0, 1.0), Complex64::new(0.0, 1.0)];
        let mut p = algebra::zeros(&t, 3).unwrap();
        let k = [1, 1, 0, 0, 1, 0];
        p[t.encode(&k, 3).unwrap()] = Complex64::new(1.0, 0.0);

        let err = solve_homological_equation(&p, 3, &eta, &t, 1e-12).unwrap_err();
        match err {
            CmError::Resonance {
                degree, exponents, ..
            } => {
                assert_eq!(degree, 3);
                assert_eq!(exponents, k);
            }
            other => panic!("expected resonance, got {other:?}"),
        }
    }

    #[test]
    fn test_series_length() {
        assert_eq!(series_length(2, 2, 8), 1);
        assert_eq!(series_length(3, 2, 6), 4);
        assert_eq!(series_length(4, 2, 8), 3);
        assert_eq!(series_length(6, 2, 6), 5);
        assert_eq!(series_length(8, 2, 8), 7);
    }

    #[test]
    fn test_apply_lie_transform_single_monomials() {
        // H = q2 p2 (degree 2), G = q1^3 (degree 3): {H, G} = 0 since G
        // has no q2/p2 dependence, so H is unchanged.
        let t = IndexTables::new(5).unwrap();
        let mut h = GradedPoly::zero(&t, 5).unwrap();
        h.block_mut(2).unwrap()[t.encode(&[0, 1, 0, 0, 1, 0], 2).unwrap()] = Complex64::new(1.0, 0.0);
        let mut g = algebra::zeros(&t, 3).unwrap();
        g[t.encode(&[3, 0, 0, 0, 0, 0], 3).unwrap()] = Complex64::new(1.0, 0.0);
        let out = apply_lie_transform(&h, &g, 3, &t, 1e-15).unwrap();
        assert_eq!(out, h);

        // H = p1 (degree 1), G = q1^3: {p1, q1^3} = -3 q1^2 and the next
        // bracket vanishes.
        let mut h = GradedPoly::zero(&t, 5).unwrap();
        h.block_mut(1).unwrap()[t.encode(&[0, 0, 0, 1, 0, 0], 1).unwrap()] = Complex64::new(1.0, 0.0);
        let out = apply_lie_transform(&h, &g, 3, &t, 1e-15).unwrap();
        let c = out.block(2).unwrap()[t.encode(&[2, 0, 0, 0, 0, 0], 2).unwrap()];
        assert!((c - Complex64::new(-3.0, 0.0)).norm() < 1e-15);
        assert_eq!(out.nonzero_count(), 2);
    }

    #[test]
    fn test_lie_transform_eliminates_bad_terms() {
        let max = 6;
        let t = IndexTables::new(max).unwrap();
        let mut rng = rng();
        let mut h = h2(&t, max);
        for d in 3..=max {
            h.set_block(d, random_block(&t, d, 0.01, &mut rng)).unwrap();
        }

        let config = NormalFormConfig::default().with_max_degree(max);
        let (h_nf, bundle) = lie_transform(&h, &test_data(), &t, &config).unwrap();

        assert_eq!(h_nf.block(2).unwrap(), h.block(2).unwrap());
        for n in 3..=max {
            let bad = select_for_elimination(h_nf.block(n).unwrap(), n, &t).unwrap();
            let worst = bad.iter().map(|c| c.norm()).fold(0.0, f64::max);
            assert!(worst < 1e-15, "degree {n}: {worst:e}");
            assert!(bundle.generator(n).is_some_and(|g| !is_zero_block(g)));
        }
        assert!(is_zero_block(bundle.generator(2).unwrap()));
        assert_eq!(bundle.max_degree(), max);
    }

    #[test]
    fn test_generating_functions_reject_mismatched_degrees() {
        let t = IndexTables::new(4).unwrap();
        let bundle = GeneratingFunctions {
            generators: GradedPoly::zero(&t, 4).unwrap(),
            eliminated: GradedPoly::zero(&t, 3).unwrap(),
        };
        let json = serde_json::to_string(&bundle).unwrap();
        assert!(serde_json::from_str::<GeneratingFunctions>(&json).is_err());

        let bundle = GeneratingFunctions {
            generators: GradedPoly::zero(&t, 4).unwrap(),
            eliminated: GradedPoly::zero(&t, 4).unwrap(),
        };
        let json = serde_json::to_string(&bundle).unwrap();
        let back: GeneratingFunctions = serde_json::from_str(&json).unwrap();
        assert_eq!(back, bundle);
    }
}
