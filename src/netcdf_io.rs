//! Loading NetCDF files into a [`Dataset`].

use anyhow::{Context, Result};
use ndarray::{ArrayD, IxDyn};
use netcdf::AttributeValue;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use crate::dataset::{DataArray, Dataset, TIME_DIM};
use crate::error::DataError;
use crate::time::{Calendar, decode_cf_calendar};

#[derive(Debug, Clone, Copy)]
pub struct OpenOptions {
    /// Decode a CF `time` coordinate (`<unit> since <date>`, honouring its
    /// `calendar` attribute) into timestamps.
    pub decode_times: bool,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self { decode_times: true }
    }
}

impl OpenOptions {
    pub fn raw_time() -> Self {
        Self {
            decode_times: false,
        }
    }
}

/// Reads every numeric variable of a NetCDF file.
///
/// A one-dimensional variable named after its own dimension becomes a
/// coordinate; everything else is a data variable. `_FillValue` and
/// `missing_value` entries become `NaN`, then `scale_factor`/`add_offset`
/// are applied. Variables that cannot be read as numbers (strings, chars)
/// are skipped.
pub fn open_dataset(path: &Path, options: OpenOptions) -> Result<Dataset> {
    let file = open_file(path)?;
    let mut ds = Dataset::new();

    for var in file.variables() {
        let name = var.name();
        let dims: Vec<String> = var.dimensions().iter().map(|d| d.name()).collect();
        let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();

        let raw = match var.get_values::<f64, _>(..) {
            Ok(v) => v,
            Err(e) => {
                debug!(variable = %name, path = %path.display(), "skipping non-numeric variable: {e}");
                continue;
            }
        };

        let mut attrs = BTreeMap::new();
        let mut missing = Vec::new();
        let mut scale = None;
        let mut offset = None;
        for attr in var.attributes() {
            let Ok(value) = attr.value() else { continue };
            match attr.name() {
                "_FillValue" | "missing_value" => missing.extend(attr_as_f64s(&value)),
                "scale_factor" => scale = attr_as_f64s(&value).first().copied(),
                "add_offset" => offset = attr_as_f64s(&value).first().copied(),
                _ => {}
            }
            attrs.insert(attr.name().to_string(), attr_to_string(&value));
        }

        let values: Vec<f64> = raw
            .into_iter()
            .map(|v| {
                if missing.contains(&v) {
                    f64::NAN
                } else {
                    v * scale.unwrap_or(1.0) + offset.unwrap_or(0.0)
                }
            })
            .collect();

        let values = ArrayD::from_shape_vec(IxDyn(&shape), values)
            .with_context(|| format!("variable '{}' in {}", name, path.display()))?;
        let is_coord = dims.len() == 1 && dims[0] == name;
        let array = DataArray::new(dims, values)?.with_attrs(attrs);

        if is_coord {
            ds.insert_coord(name, array)?;
        } else {
            ds.insert_data_var(name, array)?;
        }
    }

    let mut global = BTreeMap::new();
    for attr in file.attributes() {
        if let Ok(value) = attr.value() {
            global.insert(attr.name().to_string(), attr_to_string(&value));
        }
    }
    ds.set_attrs(global);
    ds.push_source(path.to_path_buf());

    if options.decode_times {
        ds = decode_time_coord(ds)
            .with_context(|| format!("failed to decode time in {}", path.display()))?;
    }

    debug!(
        path = %path.display(),
        data_vars = ds.data_vars().len(),
        dims = ?ds.dims(),
        "opened dataset"
    );
    Ok(ds)
}

fn open_file(path: &Path) -> Result<netcdf::File> {
    if !path.exists() {
        return Err(DataError::FileNotFound {
            path: path.to_path_buf(),
        }
        .into());
    }
    netcdf::open(path)
        .map_err(DataError::from)
        .with_context(|| format!("failed to open {}", path.display()))
}

fn decode_time_coord(ds: Dataset) -> Result<Dataset> {
    let Some(coord) = ds.coord(TIME_DIM) else {
        return Ok(ds);
    };
    let Some(units) = coord.attrs().get("units").filter(|u| u.contains(" since ")) else {
        return Ok(ds);
    };
    // CF default when the attribute is absent.
    let calendar = match coord.attrs().get("calendar") {
        Some(name) => Calendar::from_cf(name)?,
        None => Calendar::Standard,
    };
    let values: Vec<f64> = coord.values().iter().copied().collect();
    let times = decode_cf_calendar(units, calendar, &values)?;
    ds.with_time(times)
}

fn attr_as_f64s(value: &AttributeValue) -> Vec<f64> {
    match value {
        AttributeValue::Uchar(v) => vec![*v as f64],
        AttributeValue::Schar(v) => vec![*v as f64],
        AttributeValue::Ushort(v) => vec![*v as f64],
        AttributeValue::Short(v) => vec![*v as f64],
        AttributeValue::Uint(v) => vec![*v as f64],
        AttributeValue::Int(v) => vec![*v as f64],
        AttributeValue::Ulonglong(v) => vec![*v as f64],
        AttributeValue::Longlong(v) => vec![*v as f64],
        AttributeValue::Float(v) => vec![*v as f64],
        AttributeValue::Double(v) => vec![*v],
        AttributeValue::Shorts(v) => v.iter().map(|x| *x as f64).collect(),
        AttributeValue::Ints(v) => v.iter().map(|x| *x as f64).collect(),
        AttributeValue::Floats(v) => v.iter().map(|x| *x as f64).collect(),
        AttributeValue::Doubles(v) => v.clone(),
        _ => Vec::new(),
    }
}

fn attr_to_string(value: &AttributeValue) -> String {
    match value {
        AttributeValue::Str(s) => s.clone(),
        AttributeValue::Strs(v) => v.join(", "),
        other => {
            let nums = attr_as_f64s(other);
            if nums.is_empty() {
                format!("{other:?}")
            } else {
                nums.iter()
                    .map(|n| n.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            }
        }
    }
}
