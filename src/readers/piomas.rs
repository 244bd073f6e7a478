use anyhow::{Context, Result};
use glob::Pattern;
use std::path::Path;
use tracing::info;

use crate::dataset::{Dataset, TIME_DIM};
use crate::netcdf_io::{OpenOptions, open_dataset};
use crate::paths::resolve_all;
use crate::time::piomas_dates;

/// File names of the yearly PIOMAS outputs (`2010.nc`, `2011.nc`, ...).
pub const PIOMAS_FILE_GLOB: &str = "20*[0-9]*.nc";

const YEAR_DIM: &str = "year";
const STEP_DIM: &str = "t";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PiomasOptions {
    /// Rename `thickness` to `volume` in the returned dataset. Off by default,
    /// which keeps the field name the downstream notebooks use.
    pub rename_thickness_to_volume: bool,
}

/// Reads every yearly PIOMAS file in `dir` into one dataset with a daily
/// `time` axis counted from 2010-01-01.
pub fn read_piomas(dir: &Path, options: PiomasOptions) -> Result<Dataset> {
    let pattern = format!(
        "{}/{}",
        Pattern::escape(&dir.display().to_string()).trim_end_matches('/'),
        PIOMAS_FILE_GLOB
    );
    let files = resolve_all(&pattern)?;
    info!(files = files.len(), dir = %dir.display(), "reading PIOMAS");

    let parts = files
        .iter()
        .map(|f| open_dataset(f, OpenOptions::raw_time()))
        .collect::<Result<Vec<_>>>()?;

    let ds = Dataset::concat(parts, YEAR_DIM)
        .with_context(|| format!("combining PIOMAS years in {}", dir.display()))?
        .stack(TIME_DIM, [YEAR_DIM, STEP_DIM])?;

    let n = ds.dim_len(TIME_DIM).unwrap_or(0);
    let ds = ds.with_time(piomas_dates(n)?)?;

    if options.rename_thickness_to_volume {
        return ds.rename("thickness", "volume");
    }
    Ok(ds)
}
