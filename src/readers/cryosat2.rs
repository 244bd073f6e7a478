use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

use crate::dataset::{Dataset, TIME_DIM};
use crate::error::DataError;
use crate::netcdf_io::{OpenOptions, open_dataset};
use crate::time::cryosat2_dates;

const RAW_TIME: &str = "Time";
const THICKNESS: &str = "Sea_Ice_Thickness";
const CONCENTRATION: &str = "Sea_Ice_Concentration";
pub const SEA_ICE_VOLUME: &str = "Sea_Ice_Volume";

/// Reads the Bristol CryoSat-2 thickness product.
///
/// The raw `Time` day numbers are turned into timestamps along a `time`
/// dimension, `Time` itself is dropped, and `Sea_Ice_Volume` is added as
/// thickness times concentration (missing in either input means missing volume).
pub fn read_cryosat2(path: &Path) -> Result<Dataset> {
    let ds = open_dataset(path, OpenOptions::raw_time())?;

    let missing = |name: &str| DataError::MissingVariable {
        name: name.to_string(),
        path: path.to_path_buf(),
    };

    let raw = ds.variable(RAW_TIME).ok_or_else(|| missing(RAW_TIME))?;
    let [time_dim] = raw.dims() else {
        anyhow::bail!(
            "'{}' in {} should be one-dimensional, found ({})",
            RAW_TIME,
            path.display(),
            raw.dims().join(", ")
        );
    };
    let time_dim = time_dim.clone();
    let raw_values: Vec<f64> = raw.values().iter().copied().collect();
    let times = cryosat2_dates(&raw_values)
        .with_context(|| format!("reconstructing time in {}", path.display()))?;

    let ds = if time_dim == TIME_DIM {
        ds
    } else {
        ds.rename_dim(&time_dim, TIME_DIM)?
    };
    // Attach first: dropping `Time` must not take the `time` dimension with it.
    let mut ds = ds.with_time(times)?.drop_var(RAW_TIME)?;

    let thickness = ds.data_var(THICKNESS).ok_or_else(|| missing(THICKNESS))?;
    let concentration = ds
        .data_var(CONCENTRATION)
        .ok_or_else(|| missing(CONCENTRATION))?;
    let volume = thickness
        .mul(concentration)
        .with_context(|| format!("deriving {}", SEA_ICE_VOLUME))?;
    ds.insert_data_var(SEA_ICE_VOLUME, volume)?;

    info!(
        path = %path.display(),
        steps = ds.time().map_or(0, |t| t.len()),
        "read CryoSat-2"
    );
    Ok(ds)
}
