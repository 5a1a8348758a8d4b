//! The center-manifold pipeline.
//!
//! physical -> real modal -> complex modal -> complex normal form
//! -> restriction -> real center manifold.
//!
//! [`CenterManifold`] keeps every stage once computed; [`compute_center_manifold`]
//! runs the same chain without keeping anything.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::NormalFormConfig;
use crate::constants::N_VARS;
use crate::error::{CmError, Result};
use crate::expansion::{ExpansionDirection, evaluate_transform, lie_expansion};
use crate::graded::GradedPoly;
use crate::hamiltonian::build_physical_hamiltonian;
use crate::index::IndexTables;
use crate::libration::CollinearPoint;
use crate::lie::{GeneratingFunctions, NormalFormData, lie_transform};
use crate::manifold::restrict;
use crate::substitution::{
    complex_to_real_point, complexify_matrix, embed_center_point, real_to_complex_point,
    substitute_complex, substitute_linear, substitute_real,
};

/// Named pipeline outputs, as persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Physical,
    RealModal,
    ComplexModal,
    ComplexNormal,
    CenterManifoldComplex,
    CenterManifoldReal,
    Generators,
    Eliminated,
}

impl Stage {
    pub const ALL: [Stage; 8] = [
        Stage::Physical,
        Stage::RealModal,
        Stage::ComplexModal,
        Stage::ComplexNormal,
        Stage::CenterManifoldComplex,
        Stage::CenterManifoldReal,
        Stage::Generators,
        Stage::Eliminated,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Physical => "physical",
            Stage::RealModal => "real_modal",
            Stage::ComplexModal => "complex_modal",
            Stage::ComplexNormal => "complex_normal",
            Stage::CenterManifoldComplex => "center_manifold_complex",
            Stage::CenterManifoldReal => "center_manifold_real",
            Stage::Generators => "generators",
            Stage::Eliminated => "eliminated",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = CmError;

    fn from_str(s: &str) -> Result<Self> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| CmError::InvalidParameter(format!("unknown stage {s:?}")))
    }
}

/// Every stage of one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineStages {
    pub physical: GradedPoly,
    pub real_modal: GradedPoly,
    pub complex_modal: GradedPoly,
    pub complex_normal: GradedPoly,
    pub center_manifold_complex: GradedPoly,
    pub center_manifold_real: GradedPoly,
    pub generators: GeneratingFunctions,
}

impl PipelineStages {
    pub fn get(&self, stage: Stage) -> &GradedPoly {
        match stage {
            Stage::Physical => &self.physical,
            Stage::RealModal => &self.real_modal,
            Stage::ComplexModal => &self.complex_modal,
            Stage::ComplexNormal => &self.complex_normal,
            Stage::CenterManifoldComplex => &self.center_manifold_complex,
            Stage::CenterManifoldReal => &self.center_manifold_real,
            Stage::Generators => &self.generators.generators,
            Stage::Eliminated => &self.generators.eliminated,
        }
    }

    /// Reassemble from a stage map; every stage must be present.
    pub fn from_map(mut map: HashMap<Stage, GradedPoly>) -> Result<Self> {
        let mut take = |stage: Stage| {
            map.remove(&stage)
                .ok_or_else(|| CmError::InvalidParameter(format!("missing stage {stage}")))
        };
        Ok(Self {
            physical: take(Stage::Physical)?,
            real_modal: take(Stage::RealModal)?,
            complex_modal: take(Stage::ComplexModal)?,
            complex_normal: take(Stage::ComplexNormal)?,
            center_manifold_complex: take(Stage::CenterManifoldComplex)?,
            center_manifold_real: take(Stage::CenterManifoldReal)?,
            generators: GeneratingFunctions {
                generators: take(Stage::Generators)?,
                eliminated: take(Stage::Eliminated)?,
            },
        })
    }
}

/// Immutable inputs shared by every stage.
#[derive(Debug, Clone)]
struct Context {
    point: CollinearPoint,
    data: NormalFormData,
    tables: IndexTables,
    config: NormalFormConfig,
}

#[derive(Debug, Clone, Default)]
struct StageCache {
    physical: Option<GradedPoly>,
    real_modal: Option<GradedPoly>,
    complex_modal: Option<GradedPoly>,
    normal: Option<(GradedPoly, GeneratingFunctions)>,
    cm_complex: Option<GradedPoly>,
    cm_real: Option<GradedPoly>,
    forward: Option<Vec<GradedPoly>>,
}

impl StageCache {
    fn physical(&mut self, ctx: &Context) -> Result<&GradedPoly> {
        let h = match self.physical.take() {
            Some(h) => h,
            None => {
                debug!(stage = "physical", "cache miss");
                build_physical_hamiltonian(&ctx.point, &ctx.tables, ctx.config.max_degree)?
            }
        };
        Ok(self.physical.insert(h))
    }

    fn real_modal(&mut self, ctx: &Context) -> Result<&GradedPoly> {
        let h = match self.real_modal.take() {
            Some(h) => h,
            None => {
                debug!(stage = "real_modal", "cache miss");
                let c = complexify_matrix(&ctx.data.c);
                let phys = self.physical(ctx)?;
                substitute_linear(phys, &c, &ctx.tables, ctx.config.substitution_tol)?
            }
        };
        Ok(self.real_modal.insert(h))
    }

    fn complex_modal(&mut self, ctx: &Context) -> Result<&GradedPoly> {
        let h = match self.complex_modal.take() {
            Some(h) => h,
            None => {
                debug!(stage = "complex_modal", "cache miss");
                let rn = self.real_modal(ctx)?;
                substitute_complex(rn, &ctx.tables, ctx.config.substitution_tol)?
            }
        };
        Ok(self.complex_modal.insert(h))
    }

    fn normal(&mut self, ctx: &Context) -> Result<&(GradedPoly, GeneratingFunctions)> {
        let nf = match self.normal.take() {
            Some(nf) => nf,
            None => {
                debug!(stage = "complex_normal", "cache miss");
                let cn = self.complex_modal(ctx)?;
                lie_transform(cn, &ctx.data, &ctx.tables, &ctx.config)?
            }
        };
        Ok(self.normal.insert(nf))
    }

    fn cm_complex(&mut self, ctx: &Context) -> Result<&GradedPoly> {
        let h = match self.cm_complex.take() {
            Some(h) => h,
            None => {
                debug!(stage = "center_manifold_complex", "cache miss");
                let (nf, _) = self.normal(ctx)?;
                restrict(nf, &ctx.tables, ctx.config.restrict_tol)?
            }
        };
        Ok(self.cm_complex.insert(h))
    }

    fn cm_real(&mut self, ctx: &Context) -> Result<&GradedPoly> {
        let h = match self.cm_real.take() {
            Some(h) => h,
            None => {
                debug!(stage = "center_manifold_real", "cache miss");
                let cm = self.cm_complex(ctx)?;
                substitute_real(cm, &ctx.tables, ctx.config.substitution_tol)?
            }
        };
        Ok(self.cm_real.insert(h))
    }

    fn forward(&mut self, ctx: &Context) -> Result<&[GradedPoly]> {
        let exp = match self.forward.take() {
            Some(exp) => exp,
            None => {
                debug!(stage = "forward_expansion", "cache miss");
                let (_, bundle) = self.normal(ctx)?;
                lie_expansion(
                    bundle,
                    ExpansionDirection::Forward,
                    &ctx.tables,
                    ctx.config.expansion_tol,
                    false,
                )?
            }
        };
        Ok(self.forward.insert(exp))
    }
}

/// Center-manifold computation for one collinear point.
///
/// Stages are computed on first use and kept until the maximum degree
/// changes.
#[derive(Debug, Clone)]
pub struct CenterManifold {
    ctx: Context,
    cache: StageCache,
}

impl CenterManifold {
    pub fn new(point: CollinearPoint, config: NormalFormConfig) -> Result<Self> {
        config.validate()?;
        let tables = IndexTables::new(config.max_degree)?;
        let data = point.normal_form_data()?;
        info!(
            point = %point.kind(),
            mu = point.mu(),
            max_degree = config.max_degree,
            lambda1 = data.lambda1,
            omega1 = data.omega1,
            omega2 = data.omega2,
            "center manifold initialized"
        );
        Ok(Self {
            ctx: Context {
                point,
                data,
                tables,
                config,
            },
            cache: StageCache::default(),
        })
    }

    /// Rebuild from previously computed stages without recomputing them.
    pub fn from_stages(
        point: CollinearPoint,
        config: NormalFormConfig,
        stages: PipelineStages,
    ) -> Result<Self> {
        let mut cm = Self::new(point, config)?;
        if stages.center_manifold_real.max_degree() != config.max_degree {
            return Err(CmError::InvalidParameter(format!(
                "stored stages have max degree {}, config asks for {}",
                stages.center_manifold_real.max_degree(),
                config.max_degree
            )));
        }
        cm.cache = StageCache {
            physical: Some(stages.physical),
            real_modal: Some(stages.real_modal),
            complex_modal: Some(stages.complex_modal),
            normal: Some((stages.complex_normal, stages.generators)),
            cm_complex: Some(stages.center_manifold_complex),
            cm_real: Some(stages.center_manifold_real),
            forward: None,
        };
        Ok(cm)
    }

    pub fn point(&self) -> &CollinearPoint {
        &self.ctx.point
    }

    pub fn data(&self) -> &NormalFormData {
        &self.ctx.data
    }

    pub fn tables(&self) -> &IndexTables {
        &self.ctx.tables
    }

    pub fn config(&self) -> &NormalFormConfig {
        &self.ctx.config
    }

    pub fn max_degree(&self) -> usize {
        self.ctx.config.max_degree
    }

    /// Change the truncation degree; rebuilds the tables and drops every
    /// cached stage.
    pub fn set_max_degree(&mut self, max_degree: usize) -> Result<()> {
        if max_degree == self.ctx.config.max_degree {
            return Ok(());
        }
        let config = self.ctx.config.with_max_degree(max_degree);
        config.validate()?;
        self.ctx.tables = IndexTables::new(max_degree)?;
        self.ctx.config = config;
        self.cache = StageCache::default();
        debug!(max_degree, "cache cleared");
        Ok(())
    }

    pub fn physical_hamiltonian(&mut self) -> Result<&GradedPoly> {
        self.cache.physical(&self.ctx)
    }

    pub fn real_modal_hamiltonian(&mut self) -> Result<&GradedPoly> {
        self.cache.real_modal(&self.ctx)
    }

    pub fn complex_modal_hamiltonian(&mut self) -> Result<&GradedPoly> {
        self.cache.complex_modal(&self.ctx)
    }

    pub fn complex_normal_form(&mut self) -> Result<&GradedPoly> {
        Ok(&self.cache.normal(&self.ctx)?.0)
    }

    pub fn center_manifold_complex(&mut self) -> Result<&GradedPoly> {
        self.cache.cm_complex(&self.ctx)
    }

    /// The real center-manifold Hamiltonian in `(q2, p2, q3, p3)`.
    pub fn compute(&mut self) -> Result<&GradedPoly> {
        self.cache.cm_real(&self.ctx)
    }

    pub fn bundle(&mut self) -> Result<&GeneratingFunctions> {
        Ok(&self.cache.normal(&self.ctx)?.1)
    }

    /// Every stage, computing whatever is missing.
    pub fn stages(&mut self) -> Result<PipelineStages> {
        let center_manifold_real = self.compute()?.clone();
        Ok(PipelineStages {
            physical: self.cache.physical(&self.ctx)?.clone(),
            real_modal: self.cache.real_modal(&self.ctx)?.clone(),
            complex_modal: self.cache.complex_modal(&self.ctx)?.clone(),
            complex_normal: self.cache.normal(&self.ctx)?.0.clone(),
            center_manifold_complex: self.cache.cm_complex(&self.ctx)?.clone(),
            center_manifold_real,
            generators: self.cache.normal(&self.ctx)?.1.clone(),
        })
    }

    /// Map a real center-manifold point `(q2, p2, q3, p3)` to local
    /// phase-space coordinates `(x, y, z, px, py, pz)`.
    pub fn cm_point_to_local(&mut self, cm_point: &[f64; 4]) -> Result<[f64; N_VARS]> {
        let real_nf = embed_center_point(&cm_point.map(|v| Complex64::new(v, 0.0)));
        let complex_nf = real_to_complex_point(&real_nf);
        let forward = self.cache.forward(&self.ctx)?;
        let complex_modal = evaluate_transform(forward, &complex_nf, &self.ctx.tables)?;
        let real_modal = complex_to_real_point(&complex_modal);

        let c = &self.ctx.data.c;
        let mut local = [0.0; N_VARS];
        for (i, slot) in local.iter_mut().enumerate() {
            *slot = (0..N_VARS).map(|j| c[(i, j)] * real_modal[j].re).sum();
        }
        let max_imag = real_modal.iter().map(|z| z.im.abs()).fold(0.0, f64::max);
        debug!(max_imag, "center-manifold point mapped to local coordinates");
        Ok(local)
    }
}

/// Run the whole pipeline on an already built physical Hamiltonian.
///
/// The Hamiltonian is truncated or zero-padded to `config.max_degree`.
/// Returns the real center-manifold Hamiltonian and the generating
/// functions of the normalization.
pub fn compute_center_manifold(
    hamiltonian_physical: &GradedPoly,
    data: &NormalFormData,
    tables: &IndexTables,
    config: &NormalFormConfig,
) -> Result<(GradedPoly, GeneratingFunctions)> {
    config.validate()?;
    let h = hamiltonian_physical.resized(tables, config.max_degree)?;
    let h_rn = substitute_linear(&h, &complexify_matrix(&data.c), tables, config.substitution_tol)?;
    let h_cn = substitute_complex(&h_rn, tables, config.substitution_tol)?;
    let (h_nf, bundle) = lie_transform(&h_cn, data, tables, config)?;
    let h_cm = restrict(&h_nf, tables, config.restrict_tol)?;
    let h_cm_real = substitute_real(&h_cm, tables, config.substitution_tol)?;
    Ok((h_cm_real, bundle))
}
