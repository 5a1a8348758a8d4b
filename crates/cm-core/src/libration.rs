//! Collinear libration points of the circular restricted three-body problem.
//!
//! Supplies the linear data the normal-form engine consumes: the Legendre
//! coefficients `c_n` of the expanded potential, the eigen-parameters of the
//! quadratic part and the symplectic matrix that diagonalizes it.

use std::fmt;
use std::str::FromStr;

use nalgebra::Matrix6;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CmError, Result};
use crate::lie::NormalFormData;

const NEWTON_MAX_ITER: usize = 100;
const NEWTON_TOL: f64 = 1e-15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollinearKind {
    L1,
    L2,
    L3,
}

impl fmt::Display for CollinearKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CollinearKind::L1 => "L1",
            CollinearKind::L2 => "L2",
            CollinearKind::L3 => "L3",
        };
        f.write_str(name)
    }
}

impl FromStr for CollinearKind {
    type Err = CmError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "L1" => Ok(CollinearKind::L1),
            "L2" => Ok(CollinearKind::L2),
            "L3" => Ok(CollinearKind::L3),
            other => Err(CmError::InvalidParameter(format!(
                "unknown collinear point {other:?} (expected L1, L2 or L3)"
            ))),
        }
    }
}

/// A collinear point for mass ratio `mu`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CollinearPoint {
    kind: CollinearKind,
    mu: f64,
}

impl CollinearPoint {
    pub fn new(kind: CollinearKind, mu: f64) -> Result<Self> {
        if !(mu > 0.0 && mu <= 0.5) {
            return Err(CmError::InvalidParameter(format!(
                "mass ratio must lie in (0, 0.5], got {mu}"
            )));
        }
        Ok(Self { kind, mu })
    }

    pub fn kind(&self) -> CollinearKind {
        self.kind
    }

    pub fn mu(&self) -> f64 {
        self.mu
    }

    /// Distance from the point to its nearest primary.
    ///
    /// Root of the point's quintic, refined by Newton iteration from the
    /// usual first-order estimate.
    pub fn gamma(&self) -> Result<f64> {
        let mu = self.mu;
        let (coeffs, seed) = match self.kind {
            CollinearKind::L1 => (
                [1.0, -(3.0 - mu), 3.0 - 2.0 * mu, -mu, 2.0 * mu, -mu],
                (mu / 3.0).cbrt(),
            ),
            CollinearKind::L2 => (
                [1.0, 3.0 - mu, 3.0 - 2.0 * mu, -mu, -2.0 * mu, -mu],
                (mu / 3.0).cbrt(),
            ),
            CollinearKind::L3 => (
                [
                    1.0,
                    2.0 + mu,
                    1.0 + 2.0 * mu,
                    -(1.0 - mu),
                    -2.0 * (1.0 - mu),
                    -(1.0 - mu),
                ],
                1.0 - 7.0 * mu / 12.0,
            ),
        };

        let mut x = seed;
        for iter in 0..NEWTON_MAX_ITER {
            let (f, df) = horner_with_derivative(&coeffs, x);
            if df == 0.0 {
                break;
            }
            let step = f / df;
            x -= step;
            if step.abs() <= NEWTON_TOL * x.abs().max(1.0) {
                debug!(point = %self.kind, mu, gamma = x, iterations = iter + 1, "gamma converged");
                return Ok(x);
            }
        }
        Err(CmError::InvalidParameter(format!(
            "Newton iteration for gamma of {} (mu = {mu}) did not converge",
            self.kind
        )))
    }

    /// Synodic `x` coordinate of the point.
    pub fn position(&self) -> Result<f64> {
        let gamma = self.gamma()?;
        Ok(match self.kind {
            CollinearKind::L1 => 1.0 - self.mu - gamma,
            CollinearKind::L2 => 1.0 - self.mu + gamma,
            CollinearKind::L3 => -self.mu - gamma,
        })
    }

    /// Coefficient `c_n` of the Legendre expansion of the potential around
    /// the point (Jorba & Masdemont 1999, eq. 3).
    pub fn cn(&self, n: usize) -> Result<f64> {
        let gamma = self.gamma()?;
        Ok(self.cn_for_gamma(n, gamma))
    }

    pub(crate) fn cn_for_gamma(&self, n: usize, gamma: f64) -> f64 {
        let mu = self.mu;
        let sign = if n % 2 == 0 { 1.0 } else { -1.0 };
        let g3 = gamma.powi(3);
        let e = n as i32 + 1;
        match self.kind {
            CollinearKind::L1 => {
                (mu + sign * (1.0 - mu) * gamma.powi(e) / (1.0 - gamma).powi(e)) / g3
            }
            CollinearKind::L2 => {
                (sign * mu + sign * (1.0 - mu) * gamma.powi(e) / (1.0 + gamma).powi(e)) / g3
            }
            CollinearKind::L3 => {
                sign * (1.0 - mu + mu * gamma.powi(e) / (1.0 + gamma).powi(e)) / g3
            }
        }
    }

    /// `(lambda1, omega1, omega2)` of the linearized flow.
    pub fn linear_modes(&self) -> Result<(f64, f64, f64)> {
        let c2 = self.cn(2)?;
        Ok(modes_from_c2(c2))
    }

    /// Symplectic `C` with `local = C * real_modal`, and its inverse.
    pub fn normal_form_transform(&self) -> Result<(Matrix6<f64>, Matrix6<f64>)> {
        let c2 = self.cn(2)?;
        let (lambda1, omega1, omega2) = modes_from_c2(c2);

        let s1_sq = 2.0
            * lambda1
            * ((4.0 + 3.0 * c2) * lambda1 * lambda1 + 4.0 + 5.0 * c2 - 6.0 * c2 * c2);
        let s2_sq =
            omega1 * ((4.0 + 3.0 * c2) * omega1 * omega1 - 4.0 - 5.0 * c2 + 6.0 * c2 * c2);
        if s1_sq <= 0.0 || s2_sq <= 0.0 {
            return Err(CmError::InvalidParameter(format!(
                "non-positive normalization factors (s1^2 = {s1_sq}, s2^2 = {s2_sq}) for {}",
                self.kind
            )));
        }
        let s1 = s1_sq.sqrt();
        let s2 = s2_sq.sqrt();

        let l = lambda1;
        let w = omega1;
        let mut c = Matrix6::<f64>::zeros();
        c[(0, 0)] = 2.0 * l / s1;
        c[(0, 3)] = -2.0 * l / s1;
        c[(0, 4)] = 2.0 * w / s2;
        c[(1, 0)] = (l * l - 2.0 * c2 - 1.0) / s1;
        c[(1, 1)] = (-w * w - 2.0 * c2 - 1.0) / s2;
        c[(1, 3)] = (l * l - 2.0 * c2 - 1.0) / s1;
        c[(2, 2)] = 1.0 / omega2.sqrt();
        c[(3, 0)] = (l * l + 2.0 * c2 + 1.0) / s1;
        c[(3, 1)] = (-w * w + 2.0 * c2 + 1.0) / s2;
        c[(3, 3)] = (l * l + 2.0 * c2 + 1.0) / s1;
        c[(4, 0)] = (l * l * l + (1.0 - 2.0 * c2) * l) / s1;
        c[(4, 3)] = -(l * l * l + (1.0 - 2.0 * c2) * l) / s1;
        c[(4, 4)] = (-w * w * w + (1.0 - 2.0 * c2) * w) / s2;
        c[(5, 5)] = omega2.sqrt();

        let c_inverse = c
            .try_inverse()
            .ok_or_else(|| CmError::SingularMatrix(format!("normal-form transform of {}", self.kind)))?;
        Ok((c, c_inverse))
    }

    /// Plain record handed to the normal-form engine.
    pub fn normal_form_data(&self) -> Result<NormalFormData> {
        let (lambda1, omega1, omega2) = self.linear_modes()?;
        let (c, c_inverse) = self.normal_form_transform()?;
        Ok(NormalFormData {
            lambda1,
            omega1,
            omega2,
            c,
            c_inverse,
        })
    }
}

/// Roots of `eta^2 + (2 - c2) eta + (1 + c2 - 2 c2^2) = 0` give the
/// hyperbolic and planar elliptic modes; the vertical one is `sqrt(c2)`.
fn modes_from_c2(c2: f64) -> (f64, f64, f64) {
    let b = 2.0 - c2;
    let c = 1.0 + c2 - 2.0 * c2 * c2;
    let disc = (b * b - 4.0 * c).sqrt();
    let eta1 = (-b - disc) / 2.0;
    let eta2 = (-b + disc) / 2.0;
    (eta2.sqrt(), (-eta1).sqrt(), c2.sqrt())
}

fn horner_with_derivative(coeffs: &[f64], x: f64) -> (f64, f64) {
    let mut f = 0.0;
    let mut df = 0.0;
    for &c in coeffs {
        df = df * x + f;
        f = f * x + c;
    }
    (f, df)
}

/// The standard symplectic form `J = [[0, I], [-I, 0]]`.
pub fn symplectic_form() -> Matrix6<f64> {
    let mut j = Matrix6::<f64>::zeros();
    for i in 0..3 {
        j[(i, i + 3)] = 1.0;
        j[(i + 3, i)] = -1.0;
    }
    j
}
