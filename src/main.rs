mod cli;
mod logging;

use std::process;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::info;

use sitvar::{
    CmipLayout, DirectoryPolicy, Downloader, PiomasOptions, Settings, SettingsOverrides,
    SweepManifest, read_cryosat2, read_historical, read_piomas,
};

use crate::cli::{
    Cli, Command, DownloadArgs, DownloaderArgs, ManifestArgs, PlanArgs, ReadCommand,
};

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    if let Err(e) = run(cli.command) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Models(args) => models(args),
        Command::Plan(args) => plan(args),
        Command::Download(args) => download(args),
        Command::Read(cmd) => read(cmd),
    }
}

fn load_manifest(args: &ManifestArgs) -> Result<SweepManifest> {
    match &args.manifest {
        Some(path) => SweepManifest::from_path(path),
        None => SweepManifest::builtin(),
    }
}

fn downloader_settings(args: DownloaderArgs) -> Result<Settings> {
    Settings::load(SettingsOverrides {
        python: args.python,
        downloader_script: args.downloader,
        ..Default::default()
    })
}

fn models(args: ManifestArgs) -> Result<()> {
    let manifest = load_manifest(&args)?;
    for m in &manifest.models {
        let state = if m.enabled { "enabled" } else { "disabled" };
        match &m.reason {
            Some(reason) => println!("{:<20} {:<9} {}", m.source_id, state, reason),
            None => println!("{:<20} {}", m.source_id, state),
        }
    }
    Ok(())
}

fn plan(args: PlanArgs) -> Result<()> {
    let manifest = load_manifest(&args.manifest)?;
    let downloader = Downloader::new(&downloader_settings(args.downloader)?);
    for request in manifest.requests() {
        println!("{}", downloader.display_command(&request));
    }
    Ok(())
}

fn download(args: DownloadArgs) -> Result<()> {
    let manifest = load_manifest(&args.manifest)?;
    let downloader = Downloader::new(&downloader_settings(args.downloader)?)
        .with_dry_run(args.dry_run)
        .with_retry_max(args.retry_max)
        .with_progress(!args.no_progress);

    let report = downloader.run(&manifest);

    if let Some(path) = &args.report {
        report.write_json(path)?;
        info!(path = %path.display(), "report written");
    }

    let failed: Vec<_> = report.failed().collect();
    for outcome in &failed {
        if let Some(e) = outcome.error() {
            eprintln!("{e:#}\n");
        }
    }
    if !failed.is_empty() {
        bail!(
            "{} of {} downloads failed",
            failed.len(),
            report.outcomes.len()
        );
    }
    Ok(())
}

fn read(cmd: ReadCommand) -> Result<()> {
    let ds = match cmd {
        ReadCommand::Historical(args) => {
            let settings = Settings::load(SettingsOverrides {
                cmip_root: args.cmip_root,
                ..Default::default()
            })?;
            let layout = CmipLayout {
                institution: args.institution,
                source_id: args.source_id,
                version: args.version,
                ..CmipLayout::cesm2_historical(settings.cmip_root)
            };
            let [first, second] = args.variables.as_slice() else {
                bail!("expected exactly two variables");
            };
            let policy = if args.reuse_first_dir {
                DirectoryPolicy::ReuseFirst
            } else {
                DirectoryPolicy::PerVariable
            };
            read_historical(
                &layout,
                [first.as_str(), second.as_str()],
                &args.category,
                policy,
            )?
        }
        ReadCommand::Cryosat2(args) => {
            let settings = Settings::load(SettingsOverrides {
                cryosat2_file: args.file,
                ..Default::default()
            })?;
            read_cryosat2(&settings.cryosat2_file)
                .with_context(|| format!("reading {}", settings.cryosat2_file.display()))?
        }
        ReadCommand::Piomas(args) => {
            let settings = Settings::load(SettingsOverrides {
                piomas_dir: args.dir,
                ..Default::default()
            })?;
            let options = PiomasOptions {
                rename_thickness_to_volume: args.rename_thickness,
            };
            read_piomas(&settings.piomas_dir, options)?
        }
    };

    print!("{ds}");
    Ok(())
}
