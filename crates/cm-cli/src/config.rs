//! Optional TOML configuration for the `cm` binary.
//!
//! ```toml
//! threads = 4
//!
//! [normal_form]
//! max_degree = 10
//! resonance_tol = 1e-10
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use cm_core::NormalFormConfig;

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    pub normal_form: NormalFormConfig,
    /// Size of the rayon global pool; rayon's default when absent.
    pub threads: Option<usize>,
}

impl CliConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.normal_form.validate()?;
        if config.threads == Some(0) {
            anyhow::bail!("threads must be at least 1");
        }
        Ok(config)
    }
}
