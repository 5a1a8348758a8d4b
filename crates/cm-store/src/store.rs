use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::{Connection, params};
use uuid::Uuid;

use cm_core::serde_compat::{block_from_wire, block_to_wire};
use cm_core::{
    CollinearKind, CollinearPoint, GradedPoly, IndexTables, NormalFormConfig, PipelineStages,
    RunSnapshot, Stage,
};

use crate::error::{Result, StoreError};
use crate::schema;

/// One row of the run listing.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub id: Uuid,
    pub point: CollinearKind,
    pub mu: f64,
    pub max_degree: usize,
    pub created_at: String,
}

pub struct Store {
    conn: Connection,
}

pub const DB_FILE_NAME: &str = "cm.db";

/// `~/.center-manifold`, or `./.center-manifold` when no home is set.
pub fn default_base_dir() -> PathBuf {
    env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".center-manifold")
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    /// Open `<base_dir>/cm.db`, creating the directory if needed.
    pub fn open_in_dir(base_dir: Option<&Path>) -> Result<Self> {
        let base = base_dir.map(PathBuf::from).unwrap_or_else(default_base_dir);
        fs::create_dir_all(&base).map_err(|e| {
            StoreError::InvalidData(format!("failed to create {}: {e}", base.display()))
        })?;
        Self::open(&base.join(DB_FILE_NAME))
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    // --- Metadata ---

    pub fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT value FROM metadata WHERE key = ?1")?;
        let result = stmt.query_row([key], |row| row.get(0)).ok();
        Ok(result)
    }

    pub fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    // --- Save ---

    /// Store every stage of a run, replacing any run with the same id.
    pub fn save_run(&self, run: &RunSnapshot) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        let id = run.id.to_string();

        tx.execute("DELETE FROM polynomials WHERE run_id = ?1", [&id])?;
        tx.execute(
            "INSERT OR REPLACE INTO runs (id, point, mu, max_degree, created_at, config_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id,
                run.point.kind().to_string(),
                run.point.mu(),
                run.config.max_degree as i64,
                run.created_at,
                serde_json::to_string(&run.config)?,
            ],
        )?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO polynomials (run_id, stage, degree, coeffs) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for stage in Stage::ALL {
                for (degree, block) in run.stages.get(stage).blocks().iter().enumerate() {
                    let coeffs = serde_json::to_string(&block_to_wire(block))?;
                    stmt.execute(params![id, stage.as_str(), degree as i64, coeffs])?;
                }
            }
        }

        tx.commit()?;
        tracing::debug!(run = %run.id, "run saved");
        Ok(())
    }

    // --- Load ---

    pub fn load_run(&self, id: Uuid) -> Result<RunSnapshot> {
        let id_str = id.to_string();
        let row = self
            .conn
            .query_row(
                "SELECT point, mu, max_degree, created_at, config_json FROM runs WHERE id = ?1",
                [&id_str],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, f64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => {
                    StoreError::InvalidData(format!("run {id} not found"))
                }
                other => StoreError::Sqlite(other),
            })?;
        let (point_str, mu, max_degree, created_at, config_json) = row;

        let kind: CollinearKind = point_str.parse()?;
        let max_degree = usize::try_from(max_degree)
            .map_err(|_| StoreError::InvalidData(format!("negative max degree {max_degree}")))?;
        let config: NormalFormConfig = serde_json::from_str(&config_json)?;
        let config = config.with_max_degree(max_degree);

        Ok(RunSnapshot {
            id,
            created_at,
            point: CollinearPoint::new(kind, mu)?,
            config,
            stages: self.load_stages(&id_str, max_degree)?,
        })
    }

    fn load_stages(&self, run_id: &str, max_degree: usize) -> Result<PipelineStages> {
        let mut stmt = self.conn.prepare(
            "SELECT stage, degree, coeffs FROM polynomials WHERE run_id = ?1 ORDER BY stage, degree",
        )?;
        let rows: Vec<(String, i64, String)> = stmt
            .query_map([run_id], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
            .collect::<std::result::Result<_, _>>()?;

        let mut blocks: HashMap<Stage, Vec<Vec<_>>> = HashMap::new();
        for (stage_str, degree, coeffs) in rows {
            let stage: Stage = stage_str.parse()?;
            let pairs: Vec<[f64; 2]> = serde_json::from_str(&coeffs)?;
            let stage_blocks = blocks.entry(stage).or_default();
            if degree != stage_blocks.len() as i64 {
                return Err(StoreError::InvalidData(format!(
                    "stage {stage} is missing degree {}",
                    stage_blocks.len()
                )));
            }
            stage_blocks.push(block_from_wire(&pairs));
        }

        let tables = IndexTables::new(max_degree)?;
        let mut polys = HashMap::with_capacity(blocks.len());
        for (stage, stage_blocks) in blocks {
            if stage_blocks.len() != max_degree + 1 {
                return Err(StoreError::InvalidData(format!(
                    "stage {stage} has {} blocks, run declares max degree {max_degree}",
                    stage_blocks.len()
                )));
            }
            polys.insert(stage, GradedPoly::from_blocks(&tables, stage_blocks)?);
        }
        Ok(PipelineStages::from_map(polys)?)
    }

    /// Stored runs, newest first.
    pub fn list_runs(&self) -> Result<Vec<RunSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, point, mu, max_degree, created_at FROM runs ORDER BY created_at DESC, rowid DESC",
        )?;
        let rows: Vec<(String, String, f64, i64, String)> = stmt
            .query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                ))
            })?
            .collect::<std::result::Result<_, _>>()?;

        rows.into_iter()
            .map(|(id, point, mu, max_degree, created_at)| {
                Ok(RunSummary {
                    id: parse_uuid(&id)?,
                    point: point.parse()?,
                    mu,
                    max_degree: max_degree.max(0) as usize,
                    created_at,
                })
            })
            .collect()
    }

    /// Returns whether a run was removed.
    pub fn delete_run(&self, id: Uuid) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM runs WHERE id = ?1", [id.to_string()])?;
        Ok(rows > 0)
    }

    /// Resolve a full id or a unique prefix of one.
    pub fn resolve_run_id(&self, prefix: &str) -> Result<Uuid> {
        if let Ok(id) = Uuid::parse_str(prefix) {
            return Ok(id);
        }
        let pattern = format!("{}%", prefix.replace(['%', '_'], ""));
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM runs WHERE id LIKE ?1 LIMIT 2")?;
        let matches: Vec<String> = stmt
            .query_map([pattern], |row| row.get(0))?
            .collect::<std::result::Result<_, _>>()?;
        match matches.as_slice() {
            [only] => parse_uuid(only),
            [] => Err(StoreError::InvalidData(format!("no run matches '{prefix}'"))),
            _ => Err(StoreError::InvalidData(format!(
                "run id prefix '{prefix}' is ambiguous"
            ))),
        }
    }
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| StoreError::InvalidData(format!("invalid UUID '{s}': {e}")))
}
