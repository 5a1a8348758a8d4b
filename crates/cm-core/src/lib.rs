//! Center-manifold reduction for the circular restricted three-body problem.
//!
//! Graded multivariate polynomials in six phase-space variables, the Poisson
//! algebra over them, and a partial Birkhoff normal form computed with Lie
//! series around the collinear libration points. The end product is the
//! center-manifold Hamiltonian in `(q2, p2, q3, p3)` together with the
//! generating functions that map center-manifold points back to physical
//! coordinates.
//!
//! Zero I/O: pure math with no opinions about transport or persistence.

pub mod algebra;
pub mod center;
pub mod config;
pub mod constants;
pub mod error;
pub mod evaluator;
pub mod expansion;
pub mod graded;
pub mod hamiltonian;
pub mod index;
pub mod libration;
pub mod lie;
pub mod manifold;
pub mod serde_compat;
pub mod substitution;
pub mod time;

pub use center::{CenterManifold, PipelineStages, Stage, compute_center_manifold};
pub use config::NormalFormConfig;
pub use constants::{DEFAULT_MAX_DEGREE, MAX_SUPPORTED_DEGREE, N_DOF, N_VARS};
pub use error::{CmError, Result};
pub use evaluator::BatchEvaluator;
pub use expansion::{ExpansionDirection, evaluate_transform, lie_expansion};
pub use graded::GradedPoly;
pub use hamiltonian::build_physical_hamiltonian;
pub use index::{Exponents, IndexTables};
pub use libration::{CollinearKind, CollinearPoint};
pub use lie::{GeneratingFunctions, NormalFormData, lie_transform};
pub use manifold::{format_cm_table, restrict};
pub use serde_compat::{CURRENT_VERSION, RunSnapshot, export_json, import_json};
pub use substitution::{substitute_complex, substitute_linear, substitute_real};
pub use time::now_iso8601;
