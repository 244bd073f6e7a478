use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::error::format_fetch_failure;
use crate::manifest::SweepManifest;
use crate::request::DownloadRequest;
use crate::util::{backoff, shell_join, tail_lines};

const STDERR_TAIL_LINES: usize = 20;

/// Runs `cmip6_downloader.py` once per request, one process at a time.
#[derive(Debug, Clone)]
pub struct Downloader {
    python: String,
    script: PathBuf,

    retry_max: usize,
    sleep_max: Duration,
    progress: bool,
    dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FetchStatus {
    Succeeded,
    /// The process ran and exited unsuccessfully. `code` is `None` when it was killed by a signal.
    Failed {
        code: Option<i32>,
        stderr_tail: String,
    },
    /// The process could not be started at all.
    SpawnFailed {
        reason: String,
    },
    /// Dry run: the command was planned but not executed.
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchOutcome {
    pub request: DownloadRequest,
    #[serde(flatten)]
    pub status: FetchStatus,
    pub attempts: usize,
    #[serde(rename = "elapsed_secs", serialize_with = "serialize_secs")]
    pub elapsed: Duration,
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.status, FetchStatus::Succeeded | FetchStatus::Skipped)
    }

    /// A descriptive error for a failed outcome, `None` otherwise.
    pub fn error(&self) -> Option<anyhow::Error> {
        match &self.status {
            FetchStatus::Failed { code, stderr_tail } => {
                Some(format_fetch_failure(&self.request, *code, stderr_tail))
            }
            FetchStatus::SpawnFailed { reason } => Some(anyhow::anyhow!(
                "could not start downloader for {}: {}",
                self.request.label(),
                reason
            )),
            _ => None,
        }
    }
}

/// Per-request results of one sweep, in execution order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    pub outcomes: Vec<FetchOutcome>,
}

impl SweepReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &FetchOutcome> {
        self.outcomes.iter().filter(|o| o.is_success())
    }

    pub fn failed(&self) -> impl Iterator<Item = &FetchOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    pub fn is_success(&self) -> bool {
        self.failed().next().is_none()
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("failed to create report {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)
            .with_context(|| format!("failed to write report {}", path.display()))
    }
}

impl Downloader {
    pub fn new(settings: &Settings) -> Self {
        Self {
            python: settings.python.clone(),
            script: settings.downloader_script.clone(),
            retry_max: 1,
            sleep_max: Duration::from_secs(30),
            progress: true,
            dry_run: false,
        }
    }

    /// Total attempts per request, including the first. Zero is treated as one.
    pub fn with_retry_max(mut self, retry_max: usize) -> Self {
        self.retry_max = retry_max.max(1);
        self
    }

    pub fn with_sleep_max(mut self, sleep_max: Duration) -> Self {
        self.sleep_max = sleep_max;
        self
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Program followed by its arguments, as they will be executed.
    pub fn command_line(&self, request: &DownloadRequest) -> Vec<String> {
        let mut parts = vec![self.python.clone(), self.script.display().to_string()];
        parts.extend(request.to_args());
        parts
    }

    /// The command line quoted for a POSIX shell.
    pub fn display_command(&self, request: &DownloadRequest) -> String {
        shell_join(self.command_line(request))
    }

    pub fn command_for(&self, request: &DownloadRequest) -> Command {
        let mut cmd = Command::new(&self.python);
        cmd.arg(&self.script).args(request.to_args());
        cmd
    }

    /// Runs the downloader for one request and reports how it went.
    pub fn fetch(&self, request: &DownloadRequest) -> FetchOutcome {
        let started = Instant::now();

        if self.dry_run {
            info!(command = %self.display_command(request), "dry run");
            return FetchOutcome {
                request: request.clone(),
                status: FetchStatus::Skipped,
                attempts: 0,
                elapsed: started.elapsed(),
            };
        }

        let mut sleep = Duration::from_secs(1).min(self.sleep_max);
        let mut attempts = 0usize;
        let status = loop {
            attempts += 1;
            debug!(request = %request.label(), attempt = attempts, "starting downloader");
            let status = match self.command_for(request).output() {
                Ok(output) => status_from_output(&output),
                Err(e) => FetchStatus::SpawnFailed {
                    reason: e.to_string(),
                },
            };

            // Spawn failures will not fix themselves between attempts.
            let retriable = matches!(status, FetchStatus::Failed { .. });
            if !retriable || attempts >= self.retry_max {
                break status;
            }

            warn!(request = %request.label(), attempt = attempts, "downloader failed, retrying");
            thread::sleep(sleep);
            sleep = backoff(sleep, self.sleep_max);
        };

        FetchOutcome {
            request: request.clone(),
            status,
            attempts,
            elapsed: started.elapsed(),
        }
    }

    /// Fetches every request of the manifest in order. A failed request never stops the sweep.
    pub fn run(&self, manifest: &SweepManifest) -> SweepReport {
        let requests = manifest.requests();
        info!(
            requests = requests.len(),
            skipped_models = manifest.disabled_models().count(),
            "starting sweep"
        );

        let pb = if self.progress {
            let pb = ProgressBar::new(requests.len() as u64);
            if let Ok(style) = ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] {wide_bar} {pos}/{len} {msg}",
            ) {
                pb.set_style(style.progress_chars("=>-"));
            }
            Some(pb)
        } else {
            None
        };

        let mut report = SweepReport::default();
        for request in &requests {
            if let Some(pb) = &pb {
                pb.set_message(request.label());
            }

            let outcome = self.fetch(request);
            match outcome.error() {
                Some(e) => warn!(request = %request.label(), "{e:#}"),
                None => info!(request = %request.label(), attempts = outcome.attempts, "done"),
            }
            report.outcomes.push(outcome);

            if let Some(pb) = &pb {
                pb.inc(1);
            }
        }

        if let Some(pb) = &pb {
            pb.finish_and_clear();
        }

        info!(
            succeeded = report.succeeded().count(),
            failed = report.failed().count(),
            "sweep finished"
        );
        report
    }
}

fn status_from_output(output: &Output) -> FetchStatus {
    if !output.stdout.is_empty() {
        debug!(stdout = %tail_lines(&output.stdout, STDERR_TAIL_LINES), "downloader output");
    }
    if output.status.success() {
        FetchStatus::Succeeded
    } else {
        FetchStatus::Failed {
            code: output.status.code(),
            stderr_tail: tail_lines(&output.stderr, STDERR_TAIL_LINES),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ModelEntry;

    fn settings() -> Settings {
        Settings {
            python: "python".to_string(),
            downloader_script: PathBuf::from("cmip6_downloader.py"),
            cmip_root: PathBuf::from("/cmip"),
            cryosat2_file: PathBuf::from("/cs2.nc"),
            piomas_dir: PathBuf::from("/piomas"),
        }
    }

    fn manifest(models: Vec<ModelEntry>) -> SweepManifest {
        SweepManifest {
            frequency: "mon".to_string(),
            variant: "r1i1p1f1".to_string(),
            experiments: vec!["historical".to_string()],
            variables: vec!["siconc".to_string()],
            models,
        }
    }

    #[test]
    fn command_line_carries_five_flags_with_model_name() {
        let d = Downloader::new(&settings());
        for req in SweepManifest::builtin().unwrap().requests() {
            let line = d.command_line(&req);
            assert_eq!(line[0], "python");
            assert_eq!(line[1], "cmip6_downloader.py");
            let flags: Vec<_> = line.iter().filter(|a| a.starts_with("--")).collect();
            assert_eq!(
                flags,
                vec![
                    "--variable_id",
                    "--frequency",
                    "--experiment",
                    "--source_id",
                    "--variant_label"
                ]
            );
            let pos = line.iter().position(|a| a == "--source_id").unwrap();
            assert_eq!(line[pos + 1], req.source_id);
        }
    }

    #[test]
    fn dry_run_skips_every_request() {
        let d = Downloader::new(&settings())
            .with_progress(false)
            .with_dry_run(true);
        let report = d.run(&manifest(vec![
            ModelEntry::enabled("CESM2"),
            ModelEntry::disabled("MIROC6", None),
            ModelEntry::enabled("NESM3"),
        ]));
        assert_eq!(report.outcomes.len(), 2);
        assert!(report.is_success());
        assert!(
            report
                .outcomes
                .iter()
                .all(|o| o.status == FetchStatus::Skipped && o.attempts == 0)
        );
    }

    #[test]
    fn missing_interpreter_is_a_spawn_failure() {
        let mut s = settings();
        s.python = "/nonexistent/sitvar-python".to_string();
        let d = Downloader::new(&s).with_progress(false).with_retry_max(3);
        let report = d.run(&manifest(vec![ModelEntry::enabled("CESM2")]));
        let o = &report.outcomes[0];
        assert!(matches!(o.status, FetchStatus::SpawnFailed { .. }));
        assert_eq!(o.attempts, 1);
        assert!(!report.is_success());
        assert!(o.error().unwrap().to_string().contains("CESM2"));
    }

    #[test]
    fn report_serializes_status_inline() {
        let report = SweepReport {
            outcomes: vec![FetchOutcome {
                request: manifest(vec![ModelEntry::enabled("CESM2")]).requests()[0].clone(),
                status: FetchStatus::Failed {
                    code: Some(2),
                    stderr_tail: "boom".to_string(),
                },
                attempts: 1,
                elapsed: Duration::from_millis(1500),
            }],
        };
        let v = serde_json::to_value(&report).unwrap();
        let o = &v["outcomes"][0];
        assert_eq!(o["status"], "failed");
        assert_eq!(o["code"], 2);
        assert_eq!(o["request"]["source_id"], "CESM2");
        assert_eq!(o["elapsed_secs"], 1.5);
    }
}
