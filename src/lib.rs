//! Sea-ice data plumbing for CMIP6, CryoSat-2 and PIOMAS.
//!
//! Two independent pieces:
//! - a download sweep that runs the external `cmip6_downloader.py` once per
//!   (model, experiment, variable) of a [`SweepManifest`] and reports how each
//!   invocation went;
//! - readers that load the CMIP6 historical output, the CryoSat-2 thickness
//!   product and the PIOMAS reanalysis into a common [`Dataset`].
//!
//! ## Quick start
//! Paths default to the original Casper/Glade locations and can be changed via
//! environment variables (`SITVAR_CMIP_ROOT`, `SITVAR_CRYOSAT2`, ...) or a
//! `.sitvarrc` file (current directory or home directory).
//!
//! ```no_run
//! use anyhow::Result;
//! use sitvar::{Downloader, Settings, SweepManifest, read_cryosat2};
//!
//! fn main() -> Result<()> {
//!     let settings = Settings::from_env()?;
//!
//!     let report = Downloader::new(&settings).run(&SweepManifest::builtin()?);
//!     for failed in report.failed() {
//!         eprintln!("{}", failed.request.label());
//!     }
//!
//!     let cs2 = read_cryosat2(&settings.cryosat2_file)?;
//!     println!("{cs2}");
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]

mod config;
mod dataset;
mod downloader;
mod error;
mod manifest;
mod netcdf_io;
mod paths;
mod readers;
mod request;
pub mod time;
mod util;

pub use config::{Settings, SettingsOverrides};
pub use dataset::{DataArray, Dataset, TIME_DIM};
pub use downloader::{Downloader, FetchOutcome, FetchStatus, SweepReport};
pub use error::DataError;
pub use manifest::{ModelEntry, SweepManifest};
pub use netcdf_io::{OpenOptions, open_dataset};
pub use paths::{CmipLayout, resolve_all, resolve_single};
pub use readers::{
    DirectoryPolicy, PIOMAS_FILE_GLOB, PiomasOptions, SEA_ICE_VOLUME, historical_patterns,
    read_cryosat2, read_historical, read_piomas,
};
pub use request::DownloadRequest;
