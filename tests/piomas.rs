//! PIOMAS reader: year concatenation, stacking and the synthetic time axis.

mod common;

use std::path::Path;

use chrono::NaiveDate;
use common::{Var, write_nc};
use sitvar::{DataError, PiomasOptions, read_piomas};
use tempfile::tempdir;

fn write_year(dir: &Path, year: u32, base: f64) {
    write_year_with(dir, year, base, Vec::new());
}

fn write_year_with(dir: &Path, year: u32, base: f64, extra: Vec<Var<'static>>) {
    let mut vars = vec![
        Var::new("t", &["t"], vec![0.0, 1.0, 2.0]),
        Var::new(
            "thickness",
            &["t", "y", "x"],
            (0..6).map(|v| base + v as f64).collect(),
        ),
    ];
    vars.extend(extra);
    write_nc(
        &dir.join(format!("{year}.nc")),
        &[("t", 3), ("y", 1), ("x", 2)],
        vars,
    );
}

fn fixture(dir: &Path) {
    // Written out of order; the reader sorts by name.
    write_year(dir, 2011, 100.0);
    write_year(dir, 2010, 0.0);
    std::fs::write(dir.join("README.txt"), b"not data").unwrap();
}

#[test]
fn stacks_years_into_daily_time_axis() {
    let dir = tempdir().unwrap();
    fixture(dir.path());

    let ds = read_piomas(dir.path(), PiomasOptions::default()).unwrap();

    assert_eq!(ds.dim_len("time"), Some(6));
    assert_eq!(ds.dim_len("year"), None);
    assert_eq!(ds.dim_len("t"), None);

    let th = ds.data_var("thickness").unwrap();
    assert_eq!(th.dims(), &["time", "y", "x"]);
    assert_eq!(th.values()[[0, 0, 0]], 0.0);
    assert_eq!(th.values()[[2, 0, 1]], 5.0);
    assert_eq!(th.values()[[3, 0, 0]], 100.0);

    // The flattened index is read as a day count from 2010-01-01.
    let t = ds.time().unwrap();
    let day = |d| {
        NaiveDate::from_ymd_opt(2010, 1, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    };
    assert_eq!(t, &[day(1), day(2), day(3), day(4), day(5), day(6)]);
}

#[test]
fn keeps_thickness_name_by_default() {
    let dir = tempdir().unwrap();
    fixture(dir.path());

    let ds = read_piomas(dir.path(), PiomasOptions::default()).unwrap();
    assert!(ds.contains("thickness"));
    assert!(!ds.contains("volume"));
}

#[test]
fn rename_option_binds_volume() {
    let dir = tempdir().unwrap();
    fixture(dir.path());

    let ds = read_piomas(
        dir.path(),
        PiomasOptions {
            rename_thickness_to_volume: true,
        },
    )
    .unwrap();
    assert!(ds.contains("volume"));
    assert!(!ds.contains("thickness"));
}

#[test]
fn empty_directory_has_no_match() {
    let dir = tempdir().unwrap();
    let err = read_piomas(dir.path(), PiomasOptions::default()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DataError>(),
        Some(DataError::NoMatch { .. })
    ));
}

#[test]
fn grid_variables_are_repeated_along_time() {
    let dir = tempdir().unwrap();
    for (year, base) in [(2010, 0.0), (2011, 100.0)] {
        write_year_with(
            dir.path(),
            year,
            base,
            vec![Var::new("lat", &["y", "x"], vec![80.0, 81.0]).units("degrees_north")],
        );
    }

    let ds = read_piomas(dir.path(), PiomasOptions::default()).unwrap();

    let lat = ds.data_var("lat").unwrap();
    assert_eq!(lat.dims(), &["time", "y", "x"]);
    assert_eq!(lat.shape(), &[6, 1, 2]);
    for step in 0..6 {
        assert_eq!(lat.values()[[step, 0, 0]], 80.0);
        assert_eq!(lat.values()[[step, 0, 1]], 81.0);
    }
    assert_eq!(lat.attrs().get("units").map(String::as_str), Some("degrees_north"));
    assert_eq!(ds.data_var("thickness").unwrap().values()[[4, 0, 1]], 103.0);
    assert_eq!(ds.time().unwrap().len(), 6);
}

#[test]
fn differing_step_coordinates_are_rejected() {
    let dir = tempdir().unwrap();
    write_year(dir.path(), 2010, 0.0);
    write_nc(
        &dir.path().join("2011.nc"),
        &[("t", 3), ("y", 1), ("x", 2)],
        vec![
            Var::new("t", &["t"], vec![5.0, 6.0, 7.0]),
            Var::new("thickness", &["t", "y", "x"], vec![0.0; 6]),
        ],
    );

    let err = read_piomas(dir.path(), PiomasOptions::default()).unwrap_err();
    assert!(format!("{err:#}").contains("'t' differs"), "{err:#}");
}
