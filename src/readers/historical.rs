use anyhow::{Context, Result};
use tracing::info;

use crate::dataset::Dataset;
use crate::netcdf_io::{OpenOptions, open_dataset};
use crate::paths::{CmipLayout, resolve_single};

/// Which directory the second variable's files are searched in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DirectoryPolicy {
    /// Each variable is looked up under its own `<table>/<variable>/` directory.
    #[default]
    PerVariable,
    /// Both variables are looked up under the first variable's directory, as the
    /// notebook this reader replaces did.
    ReuseFirst,
}

/// Glob patterns for the two variables, in order.
pub fn historical_patterns(
    layout: &CmipLayout,
    variables: [&str; 2],
    category: &str,
    policy: DirectoryPolicy,
) -> [String; 2] {
    let [first, second] = variables;
    let first_dir = layout.variable_dir(category, first);
    let second_dir = match policy {
        DirectoryPolicy::PerVariable => layout.variable_dir(category, second),
        DirectoryPolicy::ReuseFirst => first_dir.clone(),
    };
    [
        layout.file_pattern(&first_dir, category, first),
        layout.file_pattern(&second_dir, category, second),
    ]
}

/// Reads one file per variable of a CMIP6 historical run and combines them
/// into a single dataset holding both fields on their shared grid and time axis.
pub fn read_historical(
    layout: &CmipLayout,
    variables: [&str; 2],
    category: &str,
    policy: DirectoryPolicy,
) -> Result<Dataset> {
    let mut parts = Vec::with_capacity(2);
    for (variable, pattern) in variables
        .iter()
        .zip(historical_patterns(layout, variables, category, policy))
    {
        let path = resolve_single(&pattern)
            .with_context(|| format!("locating {} {} files", layout.source_id, variable))?;
        info!(variable, path = %path.display(), "reading historical output");
        parts.push(open_dataset(&path, OpenOptions::default())?);
    }

    Dataset::merge(parts).with_context(|| {
        format!(
            "combining {} and {} for {}",
            variables[0], variables[1], layout.source_id
        )
    })
}
