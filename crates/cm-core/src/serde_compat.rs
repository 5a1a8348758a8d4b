//! JSON serde for the run wire format.
//!
//! A run carries the collinear point, the normal-form configuration and
//! every pipeline stage. Polynomials are stored block by block, each
//! coefficient as a `[re, im]` pair in the descending-lex order of the
//! index tables.

use std::collections::HashMap;

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::center::{PipelineStages, Stage};
use crate::config::NormalFormConfig;
use crate::error::{CmError, Result};
use crate::graded::GradedPoly;
use crate::index::IndexTables;
use crate::libration::{CollinearKind, CollinearPoint};
use crate::time::now_iso8601;

pub const CURRENT_VERSION: &str = "1.0.0";

/// A computed run as it moves between stores and files.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSnapshot {
    pub id: Uuid,
    pub created_at: String,
    pub point: CollinearPoint,
    pub config: NormalFormConfig,
    pub stages: PipelineStages,
}

impl RunSnapshot {
    /// A fresh snapshot stamped with the current time.
    pub fn new(point: CollinearPoint, config: NormalFormConfig, stages: PipelineStages) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: now_iso8601(),
            point,
            config,
            stages,
        }
    }
}

// --- Wire format types ---

#[derive(Serialize, Deserialize, Debug)]
pub struct WireExport {
    pub version: String,
    pub timestamp: String,
    pub run: WireRun,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct WireRun {
    pub id: String,
    #[serde(rename = "createdAt", default)]
    pub created_at: String,
    pub point: CollinearKind,
    pub mu: f64,
    #[serde(rename = "maxDegree")]
    pub max_degree: usize,
    #[serde(default)]
    pub config: NormalFormConfig,
    pub stages: Vec<WireStage>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct WireStage {
    pub stage: Stage,
    pub blocks: Vec<Vec<[f64; 2]>>,
}

/// Coefficients of one homogeneous block as `[re, im]` pairs.
pub fn block_to_wire(block: &[Complex64]) -> Vec<[f64; 2]> {
    block.iter().map(|c| [c.re, c.im]).collect()
}

pub fn block_from_wire(pairs: &[[f64; 2]]) -> Vec<Complex64> {
    pairs.iter().map(|&[re, im]| Complex64::new(re, im)).collect()
}

fn poly_to_wire(poly: &GradedPoly) -> Vec<Vec<[f64; 2]>> {
    poly.blocks().iter().map(|b| block_to_wire(b)).collect()
}

fn wire_to_poly(blocks: &[Vec<[f64; 2]>], tables: &IndexTables) -> Result<GradedPoly> {
    GradedPoly::from_blocks(tables, blocks.iter().map(|b| block_from_wire(b)).collect())
}

impl WireExport {
    pub fn from_snapshot(run: &RunSnapshot) -> Self {
        let stages = Stage::ALL
            .iter()
            .map(|&stage| WireStage {
                stage,
                blocks: poly_to_wire(run.stages.get(stage)),
            })
            .collect();
        Self {
            version: CURRENT_VERSION.to_string(),
            timestamp: now_iso8601(),
            run: WireRun {
                id: run.id.to_string(),
                created_at: run.created_at.clone(),
                point: run.point.kind(),
                mu: run.point.mu(),
                max_degree: run.config.max_degree,
                config: run.config,
                stages,
            },
        }
    }

    pub fn into_snapshot(self) -> Result<RunSnapshot> {
        let wire = self.run;
        let point = CollinearPoint::new(wire.point, wire.mu)?;
        let config = wire.config.with_max_degree(wire.max_degree);
        config.validate()?;
        let tables = IndexTables::new(wire.max_degree)?;

        let mut map = HashMap::with_capacity(wire.stages.len());
        for stage in wire.stages {
            let poly = wire_to_poly(&stage.blocks, &tables)?;
            if poly.max_degree() != wire.max_degree {
                return Err(CmError::InvalidParameter(format!(
                    "stage {} has max degree {}, run declares {}",
                    stage.stage,
                    poly.max_degree(),
                    wire.max_degree
                )));
            }
            map.insert(stage.stage, poly);
        }

        Ok(RunSnapshot {
            id: Uuid::parse_str(&wire.id).unwrap_or_else(|_| Uuid::new_v4()),
            created_at: wire.created_at,
            point,
            config,
            stages: PipelineStages::from_map(map)?,
        })
    }
}

/// Deserialize a run export.
pub fn import_json(json: &str) -> Result<RunSnapshot> {
    let wire: WireExport =
        serde_json::from_str(json).map_err(|e| CmError::Serialization(e.to_string()))?;
    wire.into_snapshot()
}

/// Serialize a run to the current wire format.
pub fn export_json(run: &RunSnapshot) -> Result<String> {
    serde_json::to_string_pretty(&WireExport::from_snapshot(run))
        .map_err(|e| CmError::Serialization(e.to_string()))
}
