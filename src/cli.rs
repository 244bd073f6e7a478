use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// CMIP6 sea-ice download sweeps and dataset readers.
#[derive(Parser)]
#[command(name = "sitvar", version, about = "CMIP6 sea-ice downloads and dataset readers")]
pub struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// List the models of a sweep and whether each one is downloaded.
    Models(ManifestArgs),
    /// Print the downloader command line for every request of a sweep.
    Plan(PlanArgs),
    /// Run the download sweep.
    Download(DownloadArgs),
    /// Read a dataset and print a summary of it.
    #[command(subcommand)]
    Read(ReadCommand),
}

#[derive(clap::Args)]
pub struct ManifestArgs {
    /// Sweep manifest (TOML). Defaults to the built-in historical siconc sweep.
    #[arg(short, long)]
    pub manifest: Option<PathBuf>,
}

#[derive(clap::Args)]
pub struct PlanArgs {
    #[command(flatten)]
    pub manifest: ManifestArgs,

    #[command(flatten)]
    pub downloader: DownloaderArgs,
}

/// Where the external downloader lives.
#[derive(clap::Args)]
pub struct DownloaderArgs {
    /// Python interpreter (overrides SITVAR_PYTHON / .sitvarrc).
    #[arg(long)]
    pub python: Option<String>,

    /// Path to cmip6_downloader.py (overrides SITVAR_DOWNLOADER / .sitvarrc).
    #[arg(long)]
    pub downloader: Option<PathBuf>,
}

#[derive(clap::Args)]
pub struct DownloadArgs {
    #[command(flatten)]
    pub manifest: ManifestArgs,

    #[command(flatten)]
    pub downloader: DownloaderArgs,

    /// Log the commands without running them.
    #[arg(long)]
    pub dry_run: bool,

    /// Attempts per request, including the first.
    #[arg(long, default_value_t = 1)]
    pub retry_max: usize,

    /// Write a JSON report of every request's outcome.
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Disable the progress bar.
    #[arg(long)]
    pub no_progress: bool,
}

#[derive(Subcommand)]
pub enum ReadCommand {
    /// CMIP6 historical output for two variables of one run.
    Historical(HistoricalArgs),
    /// The CryoSat-2 thickness/concentration product.
    Cryosat2(Cryosat2Args),
    /// The PIOMAS yearly files.
    Piomas(PiomasArgs),
}

#[derive(clap::Args)]
pub struct HistoricalArgs {
    /// CMIP6 collection root (overrides SITVAR_CMIP_ROOT / .sitvarrc).
    #[arg(long)]
    pub cmip_root: Option<PathBuf>,

    /// The two variables to read.
    #[arg(long, num_args = 2, default_values = ["siconc", "sithick"])]
    pub variables: Vec<String>,

    /// MIP table, e.g. SImon.
    #[arg(long, default_value = "SImon")]
    pub category: String,

    #[arg(long, default_value = "CESM2")]
    pub source_id: String,

    #[arg(long, default_value = "NCAR")]
    pub institution: String,

    #[arg(long, default_value = "d20190308")]
    pub version: String,

    /// Search the second variable under the first variable's directory.
    #[arg(long)]
    pub reuse_first_dir: bool,
}

#[derive(clap::Args)]
pub struct Cryosat2Args {
    /// CryoSat-2 file (overrides SITVAR_CRYOSAT2 / .sitvarrc).
    #[arg(long)]
    pub file: Option<PathBuf>,
}

#[derive(clap::Args)]
pub struct PiomasArgs {
    /// Directory of yearly files (overrides SITVAR_PIOMAS_DIR / .sitvarrc).
    #[arg(long)]
    pub dir: Option<PathBuf>,

    /// Rename `thickness` to `volume` in the result.
    #[arg(long)]
    pub rename_thickness: bool,
}
