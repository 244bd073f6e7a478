//! CMIP6 directory conventions and glob resolution.

use anyhow::{Context, Result};
use glob::Pattern;
use std::path::{Path, PathBuf};

use crate::error::DataError;

/// Where one model run lives in a CMIP6 collection laid out as
/// `<root>/<activity>/<institution>/<model>/<experiment>/<variant>/<table>/<variable>/<grid>/files/<version>/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmipLayout {
    pub root: PathBuf,
    pub activity: String,
    pub institution: String,
    pub source_id: String,
    pub experiment: String,
    pub variant: String,
    pub grid: String,
    pub version: String,
}

impl Default for CmipLayout {
    fn default() -> Self {
        Self::cesm2_historical("/glade/collections/cmip/CMIP6")
    }
}

impl CmipLayout {
    /// The NCAR CESM2 historical run, first ensemble member, native grid.
    pub fn cesm2_historical(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            activity: "CMIP".to_string(),
            institution: "NCAR".to_string(),
            source_id: "CESM2".to_string(),
            experiment: "historical".to_string(),
            variant: "r1i1p1f1".to_string(),
            grid: "gn".to_string(),
            version: "d20190308".to_string(),
        }
    }

    pub fn variable_dir(&self, category: &str, variable: &str) -> PathBuf {
        self.root
            .join(&self.activity)
            .join(&self.institution)
            .join(&self.source_id)
            .join(&self.experiment)
            .join(&self.variant)
            .join(category)
            .join(variable)
            .join(&self.grid)
            .join("files")
            .join(&self.version)
    }

    /// Glob for the files of `variable` inside `dir`, e.g.
    /// `<dir>/siconc_SImon_CESM2_historical_r1i1p1f1_gn_*[0-9]*`.
    pub fn file_pattern(&self, dir: &Path, category: &str, variable: &str) -> String {
        let name = format!(
            "{}_{}_{}_{}_{}_{}_*[0-9]*",
            variable, category, self.source_id, self.experiment, self.variant, self.grid
        );
        format!(
            "{}/{}",
            Pattern::escape(&dir.display().to_string()).trim_end_matches('/'),
            name
        )
    }
}

/// Every path matching `pattern`, sorted. No match is an error.
pub fn resolve_all(pattern: &str) -> Result<Vec<PathBuf>> {
    let mut paths = glob::glob(pattern)
        .with_context(|| format!("invalid glob pattern {}", pattern))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("failed to list matches of {}", pattern))?;
    if paths.is_empty() {
        return Err(DataError::NoMatch {
            pattern: pattern.to_string(),
        }
        .into());
    }
    paths.sort();
    Ok(paths)
}

/// The single path matching `pattern`; zero or several matches are errors.
pub fn resolve_single(pattern: &str) -> Result<PathBuf> {
    let mut paths = resolve_all(pattern)?;
    if paths.len() > 1 {
        return Err(DataError::AmbiguousMatch {
            pattern: pattern.to_string(),
            count: paths.len(),
        }
        .into());
    }
    Ok(paths.remove(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn variable_dir_follows_cmip_convention() {
        let layout = CmipLayout::default();
        assert_eq!(
            layout.variable_dir("SImon", "siconc"),
            PathBuf::from(
                "/glade/collections/cmip/CMIP6/CMIP/NCAR/CESM2/historical/r1i1p1f1/SImon/siconc/gn/files/d20190308"
            )
        );
    }

    #[test]
    fn file_pattern_names_variable_and_table() {
        let layout = CmipLayout::cesm2_historical("/cmip");
        let dir = layout.variable_dir("SImon", "sithick");
        assert_eq!(
            layout.file_pattern(&dir, "SImon", "sithick"),
            "/cmip/CMIP/NCAR/CESM2/historical/r1i1p1f1/SImon/sithick/gn/files/d20190308/sithick_SImon_CESM2_historical_r1i1p1f1_gn_*[0-9]*"
        );
    }

    #[test]
    fn file_pattern_escapes_directory() {
        let layout = CmipLayout::cesm2_historical("/data[1]");
        let dir = layout.variable_dir("SImon", "siconc");
        let pattern = layout.file_pattern(&dir, "SImon", "siconc");
        assert!(pattern.starts_with("/data[[]1[]]/CMIP"));
    }

    #[test]
    fn resolve_single_requires_exactly_one_match() {
        let dir = tempdir().unwrap();
        let pattern = format!("{}/siconc_*[0-9]*", dir.path().display());

        let err = resolve_single(&pattern).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DataError>(),
            Some(DataError::NoMatch { .. })
        ));

        fs::write(dir.path().join("siconc_185001-201412.nc"), b"").unwrap();
        assert_eq!(
            resolve_single(&pattern).unwrap(),
            dir.path().join("siconc_185001-201412.nc")
        );

        fs::write(dir.path().join("siconc_185001-189912.nc"), b"").unwrap();
        let err = resolve_single(&pattern).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DataError>(),
            Some(DataError::AmbiguousMatch { count: 2, .. })
        ));
    }

    #[test]
    fn resolve_all_sorts() {
        let dir = tempdir().unwrap();
        for name in ["2012.nc", "2010.nc", "2011.nc", "notes.txt"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        let found = resolve_all(&format!("{}/20*[0-9]*.nc", dir.path().display())).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["2010.nc", "2011.nc", "2012.nc"]);
    }
}
