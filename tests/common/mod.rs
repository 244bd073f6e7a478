//! NetCDF fixture writers shared by the integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

/// One variable to write: name, dimensions, values and optional attributes.
pub struct Var<'a> {
    pub name: &'a str,
    pub dims: &'a [&'a str],
    pub values: Vec<f64>,
    pub fill: Option<f64>,
    pub units: Option<&'a str>,
    pub calendar: Option<&'a str>,
}

impl<'a> Var<'a> {
    pub fn new(name: &'a str, dims: &'a [&'a str], values: Vec<f64>) -> Self {
        Self {
            name,
            dims,
            values,
            fill: None,
            units: None,
            calendar: None,
        }
    }

    pub fn fill(mut self, fill: f64) -> Self {
        self.fill = Some(fill);
        self
    }

    pub fn units(mut self, units: &'a str) -> Self {
        self.units = Some(units);
        self
    }

    pub fn calendar(mut self, calendar: &'a str) -> Self {
        self.calendar = Some(calendar);
        self
    }
}

/// Writes `vars` over `dims` to `path`, creating parent directories.
pub fn write_nc(path: &Path, dims: &[(&str, usize)], vars: Vec<Var<'_>>) -> PathBuf {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create fixture dir");
    }
    let mut file = netcdf::create(path).expect("create fixture file");
    file.add_attribute("title", "sitvar test fixture")
        .expect("add title");
    for (name, len) in dims {
        file.add_dimension(name, *len).expect("add dimension");
    }
    for v in vars {
        let mut var = file
            .add_variable::<f64>(v.name, v.dims)
            .expect("add variable");
        if let Some(fill) = v.fill {
            var.put_attribute("_FillValue", fill)
                .expect("add _FillValue");
        }
        if let Some(units) = v.units {
            var.put_attribute("units", units).expect("add units");
        }
        if let Some(calendar) = v.calendar {
            var.put_attribute("calendar", calendar)
                .expect("add calendar");
        }
        var.put_values(&v.values, ..).expect("put values");
    }
    path.to_path_buf()
}
