//! An in-memory labeled-array container.
//!
//! A [`Dataset`] holds named [`DataArray`]s whose axes are named dimensions
//! shared across the dataset, plus an optional decoded time axis along the
//! `time` dimension. Transformations consume the dataset and return the
//! transformed value; they never mutate behind the caller's back.

use anyhow::{Context, Result, anyhow, bail};
use chrono::NaiveDateTime;
use ndarray::{ArrayD, Axis, IxDyn};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::error::DataError;

pub const TIME_DIM: &str = "time";

/// An n-dimensional `f64` array with named axes. Missing values are `NaN`.
#[derive(Debug, Clone, PartialEq)]
pub struct DataArray {
    dims: Vec<String>,
    values: ArrayD<f64>,
    attrs: BTreeMap<String, String>,
}

impl DataArray {
    pub fn new(dims: Vec<String>, values: ArrayD<f64>) -> Result<Self> {
        if dims.len() != values.ndim() {
            return Err(DataError::DimensionMismatch {
                name: "number of dimensions".to_string(),
                expected: values.ndim(),
                got: dims.len(),
            }
            .into());
        }
        for (i, d) in dims.iter().enumerate() {
            if dims[..i].contains(d) {
                bail!("dimension '{}' appears twice", d);
            }
        }
        Ok(Self {
            dims,
            values,
            attrs: BTreeMap::new(),
        })
    }

    pub fn from_vec(dims: &[&str], shape: &[usize], values: Vec<f64>) -> Result<Self> {
        let values = ArrayD::from_shape_vec(IxDyn(shape), values)
            .with_context(|| format!("values do not fit shape {:?}", shape))?;
        Self::new(dims.iter().map(|d| d.to_string()).collect(), values)
    }

    pub fn with_attrs(mut self, attrs: BTreeMap<String, String>) -> Self {
        self.attrs = attrs;
        self
    }

    pub fn dims(&self) -> &[String] {
        &self.dims
    }

    pub fn values(&self) -> &ArrayD<f64> {
        &self.values
    }

    pub fn attrs(&self) -> &BTreeMap<String, String> {
        &self.attrs
    }

    pub fn shape(&self) -> &[usize] {
        self.values.shape()
    }

    pub fn axis_of(&self, dim: &str) -> Option<usize> {
        self.dims.iter().position(|d| d == dim)
    }

    pub fn len_of(&self, dim: &str) -> Option<usize> {
        self.axis_of(dim).map(|i| self.values.len_of(Axis(i)))
    }

    /// Elementwise product. Both operands must have the same dimensions in the
    /// same order; a `NaN` in either operand gives `NaN`.
    pub fn mul(&self, other: &DataArray) -> Result<DataArray> {
        if self.dims != other.dims {
            bail!(
                "cannot multiply arrays over ({}) and ({})",
                self.dims.join(", "),
                other.dims.join(", ")
            );
        }
        for (d, (&a, &b)) in self
            .dims
            .iter()
            .zip(self.shape().iter().zip(other.shape()))
        {
            if a != b {
                return Err(DataError::DimensionMismatch {
                    name: d.clone(),
                    expected: a,
                    got: b,
                }
                .into());
            }
        }
        DataArray::new(self.dims.clone(), &self.values * &other.values)
    }

    /// Same dimensions and values, counting `NaN` as equal to `NaN`.
    pub fn same_as(&self, other: &DataArray) -> bool {
        self.dims == other.dims
            && self.shape() == other.shape()
            && self
                .values
                .iter()
                .zip(other.values.iter())
                .all(|(a, b)| a == b || (a.is_nan() && b.is_nan()))
    }

    fn rename_dim(&mut self, from: &str, to: &str) {
        for d in &mut self.dims {
            if d == from {
                *d = to.to_string();
            }
        }
    }
}

/// A collection of arrays over shared, named dimensions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    dims: Vec<(String, usize)>,
    coords: BTreeMap<String, DataArray>,
    data_vars: BTreeMap<String, DataArray>,
    time: Option<Vec<NaiveDateTime>>,
    attrs: BTreeMap<String, String>,
    sources: Vec<PathBuf>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dims(&self) -> &[(String, usize)] {
        &self.dims
    }

    pub fn dim_len(&self, name: &str) -> Option<usize> {
        self.dims.iter().find(|(d, _)| d == name).map(|(_, n)| *n)
    }

    pub fn coords(&self) -> &BTreeMap<String, DataArray> {
        &self.coords
    }

    pub fn data_vars(&self) -> &BTreeMap<String, DataArray> {
        &self.data_vars
    }

    pub fn coord(&self, name: &str) -> Option<&DataArray> {
        self.coords.get(name)
    }

    pub fn data_var(&self, name: &str) -> Option<&DataArray> {
        self.data_vars.get(name)
    }

    /// Looks a name up among data variables, then coordinates.
    pub fn variable(&self, name: &str) -> Option<&DataArray> {
        self.data_vars.get(name).or_else(|| self.coords.get(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variable(name).is_some()
    }

    /// The decoded time axis, one timestamp per step of the `time` dimension.
    pub fn time(&self) -> Option<&[NaiveDateTime]> {
        self.time.as_deref()
    }

    pub fn attrs(&self) -> &BTreeMap<String, String> {
        &self.attrs
    }

    pub fn set_attrs(&mut self, attrs: BTreeMap<String, String>) {
        self.attrs = attrs;
    }

    /// Files this dataset was read from, in read order.
    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    pub(crate) fn push_source(&mut self, path: PathBuf) {
        self.sources.push(path);
    }

    pub fn insert_coord(&mut self, name: impl Into<String>, array: DataArray) -> Result<()> {
        let name = name.into();
        if self.data_vars.contains_key(&name) {
            bail!("'{}' is already a data variable", name);
        }
        self.register_dims(&array)?;
        self.coords.insert(name, array);
        Ok(())
    }

    pub fn insert_data_var(&mut self, name: impl Into<String>, array: DataArray) -> Result<()> {
        let name = name.into();
        if self.coords.contains_key(&name) {
            bail!("'{}' is already a coordinate", name);
        }
        self.register_dims(&array)?;
        self.data_vars.insert(name, array);
        Ok(())
    }

    fn register_dims(&mut self, array: &DataArray) -> Result<()> {
        for (dim, &len) in array.dims.iter().zip(array.shape()) {
            match self.dim_len(dim) {
                Some(existing) if existing != len => {
                    return Err(DataError::DimensionMismatch {
                        name: dim.clone(),
                        expected: existing,
                        got: len,
                    }
                    .into());
                }
                Some(_) => {}
                None => self.dims.push((dim.clone(), len)),
            }
        }
        Ok(())
    }

    fn arrays(&self) -> impl Iterator<Item = &DataArray> {
        self.coords.values().chain(self.data_vars.values())
    }

    /// Drops dimensions no array uses, keeping `time` while a time axis is attached.
    fn prune_dims(&mut self) {
        let used: Vec<String> = self
            .arrays()
            .flat_map(|a| a.dims.iter().cloned())
            .collect();
        let keep_time = self.time.is_some();
        self.dims
            .retain(|(d, _)| used.contains(d) || (keep_time && d == TIME_DIM));
    }

    /// Attaches a decoded time axis, replacing any raw `time` coordinate.
    #[must_use = "with_time returns the updated dataset"]
    pub fn with_time(mut self, times: Vec<NaiveDateTime>) -> Result<Self> {
        let len = self
            .dim_len(TIME_DIM)
            .ok_or_else(|| anyhow!("dataset has no '{}' dimension", TIME_DIM))?;
        if len != times.len() {
            return Err(DataError::DimensionMismatch {
                name: TIME_DIM.to_string(),
                expected: len,
                got: times.len(),
            }
            .into());
        }
        self.coords.remove(TIME_DIM);
        self.time = Some(times);
        Ok(self)
    }

    /// Renames a data variable or coordinate.
    #[must_use = "rename returns the renamed dataset and leaves nothing changed in place"]
    pub fn rename(mut self, from: &str, to: &str) -> Result<Self> {
        if from == to {
            return Ok(self);
        }
        if self.contains(to) {
            bail!("cannot rename '{}' to '{}': name already in use", from, to);
        }
        if let Some(a) = self.data_vars.remove(from) {
            self.data_vars.insert(to.to_string(), a);
        } else if let Some(a) = self.coords.remove(from) {
            self.coords.insert(to.to_string(), a);
        } else {
            bail!("cannot rename '{}': no such variable", from);
        }
        Ok(self)
    }

    #[must_use = "rename_dim returns the renamed dataset"]
    pub fn rename_dim(mut self, from: &str, to: &str) -> Result<Self> {
        if from == to {
            return Ok(self);
        }
        if self.dim_len(from).is_none() {
            bail!("cannot rename dimension '{}': no such dimension", from);
        }
        if self.dim_len(to).is_some() {
            bail!("cannot rename dimension '{}' to '{}': already present", from, to);
        }
        if from == TIME_DIM && self.time.is_some() {
            bail!("cannot rename '{}' while a decoded time axis is attached", TIME_DIM);
        }
        for (d, _) in &mut self.dims {
            if d == from {
                *d = to.to_string();
            }
        }
        for a in self.coords.values_mut().chain(self.data_vars.values_mut()) {
            a.rename_dim(from, to);
        }
        Ok(self)
    }

    #[must_use = "drop_var returns the dataset without the variable"]
    pub fn drop_var(mut self, name: &str) -> Result<Self> {
        if self.data_vars.remove(name).is_none() && self.coords.remove(name).is_none() {
            bail!("cannot drop '{}': no such variable", name);
        }
        self.prune_dims();
        Ok(self)
    }

    /// Concatenates datasets along `dim`.
    ///
    /// When every part has `dim`, arrays over it are joined end to end and arrays
    /// without it are taken from the first part. When no part has `dim`, every data
    /// variable gains a new leading `dim` axis with one entry per part, and
    /// coordinates are taken from the first part. Arrays taken from the first
    /// part must be identical in every part.
    pub fn concat(parts: Vec<Dataset>, dim: &str) -> Result<Dataset> {
        let first = parts
            .first()
            .ok_or_else(|| anyhow!("nothing to concatenate"))?;
        let existing = first.dim_len(dim).is_some();
        for (i, p) in parts.iter().enumerate() {
            if p.dim_len(dim).is_some() != existing {
                bail!(
                    "dimension '{}' is present in some parts but not in part {}",
                    dim,
                    i
                );
            }
            if p.data_vars.keys().ne(first.data_vars.keys()) {
                bail!(
                    "part {} has data variables [{}], expected [{}]",
                    i,
                    p.data_vars.keys().cloned().collect::<Vec<_>>().join(", "),
                    first.data_vars.keys().cloned().collect::<Vec<_>>().join(", ")
                );
            }
            for (d, n) in &first.dims {
                if d == dim {
                    continue;
                }
                match p.dim_len(d) {
                    Some(m) if m != *n => {
                        return Err(DataError::DimensionMismatch {
                            name: d.clone(),
                            expected: *n,
                            got: m,
                        }
                        .into());
                    }
                    _ => {}
                }
            }
        }

        let mut out = Dataset {
            attrs: first.attrs.clone(),
            sources: parts.iter().flat_map(|p| p.sources.clone()).collect(),
            ..Dataset::default()
        };

        if existing {
            for (name, array) in &first.coords {
                let joined = join_along(&parts, name, array, dim, |p| &p.coords)?;
                out.insert_coord(name.clone(), joined)?;
            }
            for (name, array) in &first.data_vars {
                let joined = join_along(&parts, name, array, dim, |p| &p.data_vars)?;
                out.insert_data_var(name.clone(), joined)?;
            }
            out.time = if dim == TIME_DIM {
                let all: Option<Vec<&Vec<NaiveDateTime>>> =
                    parts.iter().map(|p| p.time.as_ref()).collect();
                all.map(|ts| ts.into_iter().flatten().copied().collect())
            } else {
                first.time.clone()
            };
        } else {
            out.dims.push((dim.to_string(), parts.len()));
            for (name, array) in &first.coords {
                check_agrees(&parts, name, array, |p| &p.coords)?;
                out.insert_coord(name.clone(), array.clone())?;
            }
            for (name, array) in &first.data_vars {
                let views: Vec<_> = parts
                    .iter()
                    .map(|p| p.data_vars[name].values.view())
                    .collect();
                let stacked = ndarray::stack(Axis(0), &views)
                    .with_context(|| format!("cannot stack '{}' along new '{}'", name, dim))?;
                let mut dims = vec![dim.to_string()];
                dims.extend(array.dims.iter().cloned());
                out.insert_data_var(
                    name.clone(),
                    DataArray::new(dims, stacked)?.with_attrs(array.attrs.clone()),
                )?;
            }
            out.time = first.time.clone();
        }

        // Keep the first part's dimension order, with a new `dim` in front.
        let mut order: Vec<&str> = first.dims.iter().map(|(d, _)| d.as_str()).collect();
        if !existing {
            order.insert(0, dim);
        }
        out.dims
            .sort_by_key(|(d, _)| order.iter().position(|o| o == d).unwrap_or(usize::MAX));
        Ok(out)
    }

    /// Combines datasets over the same dimensions into one.
    ///
    /// A name present in several parts (shared grid or bounds variables) is kept
    /// once when every copy is identical, `NaN` matching `NaN`; differing copies
    /// are an error.
    pub fn merge(parts: Vec<Dataset>) -> Result<Dataset> {
        let mut out = Dataset::default();
        for (i, p) in parts.into_iter().enumerate() {
            if i == 0 {
                out.attrs = p.attrs.clone();
            }
            for (name, array) in p.coords {
                match out.coords.get(&name) {
                    Some(existing) if !existing.same_as(&array) => {
                        bail!("coordinate '{}' differs between merged datasets", name);
                    }
                    Some(_) => {}
                    None => out.insert_coord(name, array)?,
                }
            }
            // Shared auxiliaries (bounds, 2-D lat/lon) repeat in every file; they must agree.
            for (name, array) in p.data_vars {
                match out.data_vars.get(&name) {
                    Some(existing) if !existing.same_as(&array) => {
                        bail!("data variable '{}' conflicts between merged datasets", name);
                    }
                    Some(_) => {}
                    None => out.insert_data_var(name, array)?,
                }
            }
            if let Some(t) = p.time {
                match &out.time {
                    Some(existing) if *existing != t => {
                        bail!("time axes differ between merged datasets");
                    }
                    Some(_) => {}
                    None => {
                        if let Some(len) = out.dim_len(TIME_DIM) {
                            if len != t.len() {
                                return Err(DataError::DimensionMismatch {
                                    name: TIME_DIM.to_string(),
                                    expected: len,
                                    got: t.len(),
                                }
                                .into());
                            }
                        }
                        out.time = Some(t);
                    }
                }
            }
            out.sources.extend(p.sources);
        }
        Ok(out)
    }

    /// Collapses the adjacent dimensions `outer` and `inner` into `new_dim`,
    /// `outer` varying slowest. Coordinates over either collapsed dimension are
    /// dropped. A data variable over only one of them is first repeated along
    /// the other, next to the one it has.
    #[must_use = "stack returns the reshaped dataset"]
    pub fn stack(self, new_dim: &str, [outer, inner]: [&str; 2]) -> Result<Self> {
        let n_outer = self
            .dim_len(outer)
            .ok_or_else(|| anyhow!("cannot stack: no dimension '{}'", outer))?;
        let n_inner = self
            .dim_len(inner)
            .ok_or_else(|| anyhow!("cannot stack: no dimension '{}'", inner))?;
        if new_dim != outer && new_dim != inner && self.dim_len(new_dim).is_some() {
            bail!("cannot stack into '{}': dimension already present", new_dim);
        }

        let mut out = Dataset {
            attrs: self.attrs,
            sources: self.sources,
            ..Dataset::default()
        };

        for (name, array) in self.coords {
            if array.axis_of(outer).is_some() || array.axis_of(inner).is_some() {
                continue;
            }
            out.insert_coord(name, array)?;
        }

        for (name, array) in self.data_vars {
            let array = match (array.axis_of(outer), array.axis_of(inner)) {
                (Some(o), None) => broadcast_axis(array, o + 1, inner, n_inner)?,
                (None, Some(i)) => broadcast_axis(array, i, outer, n_outer)?,
                _ => array,
            };
            let stacked = match (array.axis_of(outer), array.axis_of(inner)) {
                (None, None) => array,
                (Some(o), Some(i)) if i == o + 1 => {
                    let mut shape = array.shape().to_vec();
                    shape[o] = n_outer * n_inner;
                    shape.remove(i);
                    let mut dims = array.dims.clone();
                    dims[o] = new_dim.to_string();
                    dims.remove(i);
                    let values = array
                        .values
                        .as_standard_layout()
                        .into_owned()
                        .into_shape_with_order(shape)
                        .with_context(|| format!("cannot reshape '{}'", name))?;
                    DataArray::new(dims, values)?.with_attrs(array.attrs)
                }
                _ => bail!(
                    "cannot stack '{}': '{}' must directly precede '{}' in ({})",
                    name,
                    outer,
                    inner,
                    array.dims.join(", ")
                ),
            };
            out.insert_data_var(name, stacked)?;
        }

        // The old time axis, if any, no longer lines up with anything.
        let collapses_time = outer == TIME_DIM || inner == TIME_DIM;
        out.time = if collapses_time { None } else { self.time };

        // Place the new dimension where `outer` used to be.
        let order: Vec<String> = self
            .dims
            .iter()
            .filter(|(d, _)| d != inner)
            .map(|(d, _)| if d == outer { new_dim.to_string() } else { d.clone() })
            .collect();
        if out.dim_len(new_dim).is_none() {
            out.dims.push((new_dim.to_string(), n_outer * n_inner));
        }
        out.dims.sort_by_key(|(d, _)| {
            order.iter().position(|o| o == d).unwrap_or(usize::MAX)
        });
        Ok(out)
    }
}

/// Errors unless every part holds an array `name` identical to `first`.
fn check_agrees(
    parts: &[Dataset],
    name: &str,
    first: &DataArray,
    pick: impl Fn(&Dataset) -> &BTreeMap<String, DataArray>,
) -> Result<()> {
    for (i, p) in parts.iter().enumerate().skip(1) {
        match pick(p).get(name) {
            Some(a) if a.same_as(first) => {}
            Some(_) => bail!("'{}' differs between part 0 and part {}", name, i),
            None => bail!("part {} has no variable '{}'", i, name),
        }
    }
    Ok(())
}

/// Inserts `dim` of length `len` at axis `at`, repeating the values along it.
fn broadcast_axis(array: DataArray, at: usize, dim: &str, len: usize) -> Result<DataArray> {
    let mut dims = array.dims.clone();
    dims.insert(at, dim.to_string());
    let mut shape = array.shape().to_vec();
    shape.insert(at, len);
    let values = array
        .values
        .insert_axis(Axis(at))
        .broadcast(IxDyn(&shape))
        .ok_or_else(|| anyhow!("cannot broadcast over '{}'", dim))?
        .to_owned();
    Ok(DataArray::new(dims, values)?.with_attrs(array.attrs))
}

fn join_along(
    parts: &[Dataset],
    name: &str,
    first: &DataArray,
    dim: &str,
    pick: impl Fn(&Dataset) -> &BTreeMap<String, DataArray>,
) -> Result<DataArray> {
    let Some(axis) = first.axis_of(dim) else {
        check_agrees(parts, name, first, &pick)?;
        return Ok(first.clone());
    };
    let mut views = Vec::with_capacity(parts.len());
    for (i, p) in parts.iter().enumerate() {
        let a = pick(p)
            .get(name)
            .ok_or_else(|| anyhow!("part {} has no variable '{}'", i, name))?;
        if a.dims != first.dims {
            bail!(
                "'{}' is over ({}) in part {} but ({}) in part 0",
                name,
                a.dims.join(", "),
                i,
                first.dims.join(", ")
            );
        }
        views.push(a.values.view());
    }
    let values = ndarray::concatenate(Axis(axis), &views)
        .with_context(|| format!("cannot concatenate '{}' along '{}'", name, dim))?;
    Ok(DataArray::new(first.dims.clone(), values)?.with_attrs(first.attrs.clone()))
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dims: Vec<String> = self
            .dims
            .iter()
            .map(|(d, n)| format!("{}: {}", d, n))
            .collect();
        writeln!(f, "Dimensions:  ({})", dims.join(", "))?;

        let width = self
            .coords
            .keys()
            .chain(self.data_vars.keys())
            .map(|k| k.len())
            .max()
            .unwrap_or(0);

        writeln!(f, "Coordinates:")?;
        for (name, a) in &self.coords {
            writeln!(f, "    {:width$}  ({})", name, a.dims.join(", "))?;
        }
        writeln!(f, "Data variables:")?;
        for (name, a) in &self.data_vars {
            writeln!(f, "    {:width$}  ({})", name, a.dims.join(", "))?;
        }
        match self.time.as_deref() {
            Some(all @ [first, .., last]) => {
                writeln!(f, "Time:        {} .. {} ({} steps)", first, last, all.len())
            }
            Some([only]) => writeln!(f, "Time:        {} (1 step)", only),
            _ => writeln!(f, "Time:        (not decoded)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn arr(dims: &[&str], shape: &[usize], values: Vec<f64>) -> DataArray {
        DataArray::from_vec(dims, shape, values).unwrap()
    }

    fn day(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2010, 1, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn year_file(offset: f64) -> Dataset {
        // (t: 3, x: 2)
        let mut ds = Dataset::new();
        ds.insert_coord("x", arr(&["x"], &[2], vec![10.0, 20.0]))
            .unwrap();
        ds.insert_coord("t", arr(&["t"], &[3], vec![0.0, 1.0, 2.0]))
            .unwrap();
        ds.insert_data_var(
            "thickness",
            arr(
                &["t", "x"],
                &[3, 2],
                (0..6).map(|v| v as f64 + offset).collect(),
            ),
        )
        .unwrap();
        ds
    }

    #[test]
    fn insert_rejects_conflicting_dimension_sizes() {
        let mut ds = Dataset::new();
        ds.insert_data_var("a", arr(&["x"], &[2], vec![1.0, 2.0]))
            .unwrap();
        let err = ds
            .insert_data_var("b", arr(&["x"], &[3], vec![1.0, 2.0, 3.0]))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DataError>(),
            Some(DataError::DimensionMismatch { expected: 2, got: 3, .. })
        ));
    }

    #[test]
    fn mul_propagates_nan() {
        let a = arr(&["y", "x"], &[1, 3], vec![1.5, f64::NAN, 2.0]);
        let b = arr(&["y", "x"], &[1, 3], vec![0.5, 0.8, f64::NAN]);
        let p = a.mul(&b).unwrap();
        assert_eq!(p.values()[[0, 0]], 0.75);
        assert!(p.values()[[0, 1]].is_nan());
        assert!(p.values()[[0, 2]].is_nan());
    }

    #[test]
    fn mul_requires_same_dims() {
        let a = arr(&["y", "x"], &[1, 2], vec![1.0, 2.0]);
        let b = arr(&["x", "y"], &[2, 1], vec![1.0, 2.0]);
        assert!(a.mul(&b).is_err());
    }

    #[test]
    fn rename_returns_new_dataset() {
        let ds = year_file(0.0);
        let renamed = ds.clone().rename("thickness", "volume").unwrap();
        assert!(ds.contains("thickness"));
        assert!(renamed.contains("volume"));
        assert!(!renamed.contains("thickness"));
        assert!(ds.rename("missing", "other").is_err());
    }

    #[test]
    fn rename_refuses_to_clobber() {
        let ds = year_file(0.0);
        assert!(ds.rename("thickness", "x").is_err());
    }

    #[test]
    fn drop_var_prunes_unused_dims() {
        let mut ds = Dataset::new();
        ds.insert_data_var("Time", arr(&["n"], &[2], vec![367.0, 368.0]))
            .unwrap();
        ds.insert_data_var("h", arr(&["n", "x"], &[2, 1], vec![1.0, 2.0]))
            .unwrap();
        ds.insert_coord("lon", arr(&["lon"], &[1], vec![0.0]))
            .unwrap();
        let ds = ds.drop_var("lon").unwrap().drop_var("Time").unwrap();
        assert_eq!(ds.dims(), &[("n".to_string(), 2), ("x".to_string(), 1)]);
    }

    #[test]
    fn with_time_checks_length() {
        let mut ds = Dataset::new();
        ds.insert_data_var("v", arr(&["time"], &[2], vec![1.0, 2.0]))
            .unwrap();
        assert!(ds.clone().with_time(vec![day(1)]).is_err());
        let ds = ds.with_time(vec![day(1), day(2)]).unwrap();
        assert_eq!(ds.time().unwrap(), &[day(1), day(2)]);
        assert!(Dataset::new().with_time(vec![]).is_err());
    }

    #[test]
    fn concat_along_new_dimension_then_stack() {
        let ds = Dataset::concat(vec![year_file(0.0), year_file(100.0)], "year").unwrap();
        assert_eq!(ds.dim_len("year"), Some(2));
        assert_eq!(ds.data_var("thickness").unwrap().dims(), &["year", "t", "x"]);
        assert_eq!(ds.dims()[0].0, "year");

        let ds = ds.stack("time", ["year", "t"]).unwrap();
        let th = ds.data_var("thickness").unwrap();
        assert_eq!(th.dims(), &["time", "x"]);
        assert_eq!(th.shape(), &[6, 2]);
        // Year 0 rows come first, then year 1.
        assert_eq!(th.values()[[0, 0]], 0.0);
        assert_eq!(th.values()[[2, 1]], 5.0);
        assert_eq!(th.values()[[3, 0]], 100.0);
        assert_eq!(th.values()[[5, 1]], 105.0);
        assert!(ds.coord("t").is_none());
        assert!(ds.coord("x").is_some());
        assert_eq!(ds.dims(), &[("time".to_string(), 6), ("x".to_string(), 2)]);
    }

    #[test]
    fn concat_along_existing_dimension() {
        let mut a = Dataset::new();
        a.insert_data_var("v", arr(&["time", "x"], &[1, 2], vec![1.0, 2.0]))
            .unwrap();
        let a = a.with_time(vec![day(1)]).unwrap();
        let mut b = Dataset::new();
        b.insert_data_var("v", arr(&["time", "x"], &[2, 2], vec![3.0, 4.0, 5.0, 6.0]))
            .unwrap();
        let b = b.with_time(vec![day(2), day(3)]).unwrap();

        let ds = Dataset::concat(vec![a, b], "time").unwrap();
        assert_eq!(ds.dim_len("time"), Some(3));
        assert_eq!(ds.data_var("v").unwrap().values()[[2, 1]], 6.0);
        assert_eq!(ds.time().unwrap(), &[day(1), day(2), day(3)]);
        assert_eq!(ds.dims()[0].0, "time");
    }

    #[test]
    fn concat_rejects_mismatched_variables() {
        let mut other = year_file(0.0);
        other
            .insert_data_var("extra", arr(&["x"], &[2], vec![0.0, 0.0]))
            .unwrap();
        assert!(Dataset::concat(vec![year_file(0.0), other], "year").is_err());
        assert!(Dataset::concat(vec![], "year").is_err());
    }

    #[test]
    fn merge_unions_variables() {
        let mut a = Dataset::new();
        a.insert_coord("time", arr(&["time"], &[2], vec![0.0, 31.0]))
            .unwrap();
        a.insert_data_var("siconc", arr(&["time"], &[2], vec![80.0, 90.0]))
            .unwrap();
        let mut b = Dataset::new();
        b.insert_coord("time", arr(&["time"], &[2], vec![0.0, 31.0]))
            .unwrap();
        b.insert_data_var("sithick", arr(&["time"], &[2], vec![1.0, 1.2]))
            .unwrap();

        let ds = Dataset::merge(vec![a.clone(), b]).unwrap();
        assert!(ds.contains("siconc") && ds.contains("sithick"));
        assert_eq!(ds.coords().len(), 1);

        let again = Dataset::merge(vec![a.clone(), a.clone()]).unwrap();
        assert_eq!(again.data_vars().len(), 1);

        let mut conflicting = Dataset::new();
        conflicting
            .insert_data_var("siconc", arr(&["time"], &[2], vec![0.0, f64::NAN]))
            .unwrap();
        assert!(Dataset::merge(vec![a, conflicting]).is_err());
    }

    #[test]
    fn stack_requires_adjacent_dims() {
        let mut ds = Dataset::new();
        ds.insert_data_var(
            "v",
            arr(&["t", "x", "year"], &[1, 1, 1], vec![0.0]),
        )
        .unwrap();
        assert!(ds.clone().stack("time", ["year", "t"]).is_err());
        assert!(ds.stack("time", ["year", "missing"]).is_err());
    }

    #[test]
    fn stack_repeats_variables_missing_a_stacked_dim() {
        let with_area = |offset| {
            let mut ds = year_file(offset);
            ds.insert_data_var("area", arr(&["x"], &[2], vec![5.0, 7.0]))
                .unwrap();
            ds
        };
        let ds = Dataset::concat(vec![with_area(0.0), with_area(100.0)], "year").unwrap();
        assert_eq!(ds.data_var("area").unwrap().dims(), &["year", "x"]);

        let ds = ds.stack("time", ["year", "t"]).unwrap();
        let area = ds.data_var("area").unwrap();
        assert_eq!(area.dims(), &["time", "x"]);
        assert_eq!(area.shape(), &[6, 2]);
        assert!(area.values().outer_iter().all(|row| row[[0]] == 5.0 && row[[1]] == 7.0));
        assert_eq!(ds.data_var("thickness").unwrap().shape(), &[6, 2]);
    }

    #[test]
    fn stack_repeats_along_outer_dim() {
        let mut ds = Dataset::new();
        ds.insert_data_var("a", arr(&["year"], &[2], vec![1.0, 2.0]))
            .unwrap();
        ds.insert_data_var("b", arr(&["year", "t"], &[2, 3], vec![0.0; 6]))
            .unwrap();
        ds.insert_data_var("c", arr(&["t"], &[3], vec![7.0, 8.0, 9.0]))
            .unwrap();
        let ds = ds.stack("time", ["year", "t"]).unwrap();
        assert_eq!(
            ds.data_var("a").unwrap().values().iter().copied().collect::<Vec<_>>(),
            vec![1.0, 1.0, 1.0, 2.0, 2.0, 2.0]
        );
        assert_eq!(
            ds.data_var("c").unwrap().values().iter().copied().collect::<Vec<_>>(),
            vec![7.0, 8.0, 9.0, 7.0, 8.0, 9.0]
        );
    }

    #[test]
    fn concat_rejects_differing_coordinates() {
        let mut other = year_file(100.0);
        other
            .insert_coord("x", arr(&["x"], &[2], vec![10.0, 30.0]))
            .unwrap();
        let err = Dataset::concat(vec![year_file(0.0), other], "year").unwrap_err();
        assert!(err.to_string().contains("'x' differs"), "{err}");
    }

    #[test]
    fn display_lists_variables() {
        let text = year_file(0.0).to_string();
        assert!(text.contains("Dimensions:  (x: 2, t: 3)"));
        assert!(text.contains("thickness"));
        assert!(text.contains("(not decoded)"));
    }
}
