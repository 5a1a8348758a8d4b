use std::fs;
use std::path::Path;

use uuid::Uuid;

use cm_core::{export_json, import_json};

use crate::error::{Result, StoreError};
use crate::store::Store;

impl Store {
    /// Import a run export file; returns the id it was stored under.
    pub fn import_json_file(&self, path: &Path) -> Result<Uuid> {
        let json = fs::read_to_string(path).map_err(|e| {
            StoreError::InvalidData(format!("failed to read {}: {e}", path.display()))
        })?;
        self.import_json_str(&json)
    }

    pub fn import_json_str(&self, json: &str) -> Result<Uuid> {
        let run =
            import_json(json).map_err(|e| StoreError::InvalidData(format!("invalid JSON: {e}")))?;
        self.save_run(&run)?;
        tracing::info!(run = %run.id, point = %run.point.kind(), "run imported");
        Ok(run.id)
    }

    /// Export one run to a JSON file.
    pub fn export_json_file(&self, id: Uuid, path: &Path) -> Result<()> {
        let json = self.export_json_string(id)?;
        fs::write(path, json).map_err(|e| {
            StoreError::InvalidData(format!("failed to write {}: {e}", path.display()))
        })
    }

    pub fn export_json_string(&self, id: Uuid) -> Result<String> {
        let run = self.load_run(id)?;
        export_json(&run).map_err(|e| StoreError::InvalidData(format!("JSON export failed: {e}")))
    }
}
