use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::warn;

use crate::request::DownloadRequest;

const BUILTIN: &str = include_str!("../sweeps/historical_siconc.toml");

/// A model run the sweep knows about, whether or not it is downloaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelEntry {
    pub source_id: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Why an entry is disabled, when someone bothered to write it down.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

fn default_true() -> bool {
    true
}

impl ModelEntry {
    pub fn enabled(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            enabled: true,
            reason: None,
        }
    }

    pub fn disabled(source_id: impl Into<String>, reason: Option<String>) -> Self {
        Self {
            source_id: source_id.into(),
            enabled: false,
            reason,
        }
    }
}

/// The {model, experiment, variable} cross-product to download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SweepManifest {
    pub frequency: String,
    pub variant: String,
    pub experiments: Vec<String>,
    pub variables: Vec<String>,
    #[serde(default)]
    pub models: Vec<ModelEntry>,
}

impl SweepManifest {
    /// Monthly `siconc` for the historical experiment across the CMIP6 models of interest.
    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(BUILTIN).context("built-in sweep manifest is malformed")
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read manifest {}", path.display()))?;
        Self::from_toml_str(&text)
            .with_context(|| format!("failed to parse manifest {}", path.display()))
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let manifest: SweepManifest = toml::from_str(text)?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn validate(&self) -> Result<()> {
        check_identifier("frequency", &self.frequency)?;
        check_identifier("variant", &self.variant)?;
        if self.experiments.is_empty() {
            bail!("manifest lists no experiments");
        }
        if self.variables.is_empty() {
            bail!("manifest lists no variables");
        }
        for e in &self.experiments {
            check_identifier("experiment", e)?;
        }
        for v in &self.variables {
            check_identifier("variable", v)?;
        }

        let mut seen = HashSet::new();
        for m in &self.models {
            check_identifier("source_id", &m.source_id)?;
            if !seen.insert(m.source_id.as_str()) {
                warn!(source_id = %m.source_id, "model listed more than once");
            }
        }
        Ok(())
    }

    pub fn enabled_models(&self) -> impl Iterator<Item = &ModelEntry> {
        self.models.iter().filter(|m| m.enabled)
    }

    pub fn disabled_models(&self) -> impl Iterator<Item = &ModelEntry> {
        self.models.iter().filter(|m| !m.enabled)
    }

    /// Requests for every enabled model, ordered model, then experiment, then variable.
    pub fn requests(&self) -> Vec<DownloadRequest> {
        let mut out = Vec::new();
        for model in self.enabled_models() {
            for experiment in &self.experiments {
                for variable in &self.variables {
                    out.push(DownloadRequest {
                        variable_id: variable.clone(),
                        frequency: self.frequency.clone(),
                        experiment: experiment.clone(),
                        source_id: model.source_id.clone(),
                        variant_label: self.variant.clone(),
                    });
                }
            }
        }
        out
    }
}

fn check_identifier(what: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        bail!("empty {} in manifest", what);
    }
    if value.chars().any(char::is_whitespace) {
        bail!("{} '{}' contains whitespace", what, value);
    }
    Ok(())
}
