use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

const DEFAULT_PYTHON: &str = "python";
const DEFAULT_DOWNLOADER: &str = "cmip6_downloader.py";
const DEFAULT_CMIP_ROOT: &str = "/glade/collections/cmip/CMIP6";
const DEFAULT_CRYOSAT2: &str = "/glade/scratch/mollyw/external_data/CryoSat-2/YR_Cryosat-2/ubristol_cryosat2_seaicethickness_nh_80km_v1p7.nc";
const DEFAULT_PIOMAS_DIR: &str =
    "/glade/scratch/mollyw/external_data/PIOMAS/daily/piomas_bin_reader/output";

/// Where the external tools and input datasets live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Interpreter used to run the downloader script.
    pub python: String,
    /// Path to `cmip6_downloader.py`.
    pub downloader_script: PathBuf,
    /// Root of the CMIP6 collection (the directory holding `CMIP/`).
    pub cmip_root: PathBuf,
    /// The CryoSat-2 thickness/concentration file.
    pub cryosat2_file: PathBuf,
    /// Directory holding the PIOMAS yearly NetCDF files.
    pub piomas_dir: PathBuf,
}

/// Values given on the command line; each one beats the environment and rc file.
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub python: Option<String>,
    pub downloader_script: Option<PathBuf>,
    pub cmip_root: Option<PathBuf>,
    pub cryosat2_file: Option<PathBuf>,
    pub piomas_dir: Option<PathBuf>,
}

#[derive(Debug, Default, PartialEq, Eq)]
struct RcConfig {
    python: Option<String>,
    downloader: Option<String>,
    cmip_root: Option<String>,
    cryosat2: Option<String>,
    piomas_dir: Option<String>,
}

impl RcConfig {
    fn set(&mut self, key: &str, value: &str) {
        let slot = match key {
            "python" => &mut self.python,
            "downloader" => &mut self.downloader,
            "cmip_root" => &mut self.cmip_root,
            "cryosat2" => &mut self.cryosat2,
            "piomas_dir" => &mut self.piomas_dir,
            _ => return,
        };
        *slot = Some(value.to_string());
    }

    fn is_known(key: &str) -> bool {
        matches!(
            key,
            "python" | "downloader" | "cmip_root" | "cryosat2" | "piomas_dir"
        )
    }
}

impl Settings {
    /// Equivalent to `Settings::load(SettingsOverrides::default())`.
    pub fn from_env() -> Result<Self> {
        Self::load(SettingsOverrides::default())
    }

    /// Resolves settings using (in order of precedence):
    /// - explicit overrides
    /// - environment variables `SITVAR_PYTHON`, `SITVAR_DOWNLOADER`, `SITVAR_CMIP_ROOT`,
    ///   `SITVAR_CRYOSAT2`, `SITVAR_PIOMAS_DIR`
    /// - config file from `SITVAR_RC` or `.sitvarrc`
    /// - built-in defaults
    pub fn load(overrides: SettingsOverrides) -> Result<Self> {
        let env = SettingsOverrides {
            python: std::env::var("SITVAR_PYTHON").ok(),
            downloader_script: std::env::var_os("SITVAR_DOWNLOADER").map(PathBuf::from),
            cmip_root: std::env::var_os("SITVAR_CMIP_ROOT").map(PathBuf::from),
            cryosat2_file: std::env::var_os("SITVAR_CRYOSAT2").map(PathBuf::from),
            piomas_dir: std::env::var_os("SITVAR_PIOMAS_DIR").map(PathBuf::from),
        };
        let layered = overlay(overrides, env);

        let mut rc = RcConfig::default();
        if !layered.is_complete() {
            for rc_path in rc_candidates() {
                if rc_path.exists() {
                    rc = read_rc(&rc_path).with_context(|| {
                        format!("failed to read configuration file {}", rc_path.display())
                    })?;
                    tracing::debug!(path = %rc_path.display(), "loaded rc file");
                    break;
                }
            }
        }

        Ok(resolve(layered, rc))
    }
}

impl SettingsOverrides {
    fn is_complete(&self) -> bool {
        self.python.is_some()
            && self.downloader_script.is_some()
            && self.cmip_root.is_some()
            && self.cryosat2_file.is_some()
            && self.piomas_dir.is_some()
    }
}

fn overlay(top: SettingsOverrides, below: SettingsOverrides) -> SettingsOverrides {
    SettingsOverrides {
        python: top.python.or(below.python),
        downloader_script: top.downloader_script.or(below.downloader_script),
        cmip_root: top.cmip_root.or(below.cmip_root),
        cryosat2_file: top.cryosat2_file.or(below.cryosat2_file),
        piomas_dir: top.piomas_dir.or(below.piomas_dir),
    }
}

fn resolve(layered: SettingsOverrides, rc: RcConfig) -> Settings {
    Settings {
        python: layered
            .python
            .or(rc.python)
            .unwrap_or_else(|| DEFAULT_PYTHON.to_string()),
        downloader_script: layered
            .downloader_script
            .or(rc.downloader.map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DOWNLOADER)),
        cmip_root: layered
            .cmip_root
            .or(rc.cmip_root.map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CMIP_ROOT)),
        cryosat2_file: layered
            .cryosat2_file
            .or(rc.cryosat2.map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CRYOSAT2)),
        piomas_dir: layered
            .piomas_dir
            .or(rc.piomas_dir.map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PIOMAS_DIR)),
    }
}

fn read_rc(path: &Path) -> Result<RcConfig> {
    let text = std::fs::read_to_string(path)?;
    Ok(parse_rc(&text))
}

fn parse_rc(text: &str) -> RcConfig {
    let mut cfg = RcConfig::default();

    // A key with an empty value takes its value from the next line.
    let mut pending_key: Option<&str> = None;

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(pk) = pending_key.take() {
            if !line.contains(':') {
                cfg.set(pk, strip_quotes(line));
                continue;
            }
        }

        if let Some((k, v)) = line.split_once(':') {
            let k = k.trim();
            let v = strip_quotes(v.trim());
            if !RcConfig::is_known(k) {
                continue;
            }
            if v.is_empty() {
                pending_key = Some(k);
            } else {
                cfg.set(k, v);
            }
        }
    }

    cfg
}

fn strip_quotes(s: &str) -> &str {
    let s = s.trim();
    if (s.starts_with('"') && s.ends_with('"') && s.len() >= 2)
        || (s.starts_with('\'') && s.ends_with('\'') && s.len() >= 2)
    {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

fn rc_candidates() -> Vec<PathBuf> {
    // 1) SITVAR_RC (explicit)
    // 2) ./.sitvarrc
    // 3) ~/.sitvarrc
    if let Ok(p) = std::env::var("SITVAR_RC") {
        return vec![PathBuf::from(p)];
    }

    let mut v = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        v.push(cwd.join(".sitvarrc"));
    }
    if let Some(home) = dirs::home_dir() {
        v.push(home.join(".sitvarrc"));
    }
    v
}
