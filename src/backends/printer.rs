// SPDX-License-Identifier: GPL-3.0-only

//! Printer dispatch with fallback
//!
//! A strip is submitted through the primary mechanism (CUPS `lp`). If that
//! mechanism is *unavailable* (tool missing, no queues) the secondary mechanism
//! (`lpr`) gets exactly one attempt. A job the primary rejects is a print
//! failure and is not retried.

use super::process::{RunError, run_with_timeout};
use crate::config::PrinterConfig;
use crate::errors::{PrintError, SubmitError};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Options sent with each job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintJob {
    pub title: String,
    pub media: String,
    pub color_model: String,
}

/// One submission mechanism
pub trait PrintBackend: Send {
    fn name(&self) -> &'static str;

    fn submit(&self, file: &Path, job: &PrintJob) -> Result<(), SubmitError>;
}

/// Printer capability used by the session
pub trait Printer: Send {
    fn print(&mut self, strip: &Path) -> Result<(), PrintError>;
}

/// CUPS queue submission via `lp`
#[derive(Debug, Clone)]
pub struct CupsBackend {
    lp: String,
    lpstat: String,
    queue: Option<String>,
    timeout: Duration,
}

impl CupsBackend {
    pub fn from_config(config: &PrinterConfig) -> Self {
        Self {
            lp: config.lp_command.clone(),
            lpstat: config.lpstat_command.clone(),
            queue: config.queue.clone(),
            timeout: config.timeout(),
        }
    }

    /// First destination reported by `lpstat -e`
    fn discover_queue(&self) -> Result<String, SubmitError> {
        let output = run_with_timeout(&self.lpstat, &["-e"], self.timeout)
            .map_err(|e| unavailable(self.name(), e))?;

        if !output.success() {
            return Err(SubmitError::Unavailable {
                backend: self.name(),
                reason: format!("lpstat exited with {}: {}", output.status, output.stderr),
            });
        }

        parse_destinations(&String::from_utf8_lossy(&output.stdout))
            .into_iter()
            .next()
            .ok_or_else(|| SubmitError::Unavailable {
                backend: self.name(),
                reason: "no printers found".to_string(),
            })
    }
}

impl PrintBackend for CupsBackend {
    fn name(&self) -> &'static str {
        "cups"
    }

    fn submit(&self, file: &Path, job: &PrintJob) -> Result<(), SubmitError> {
        let queue = match &self.queue {
            Some(queue) => queue.clone(),
            None => self.discover_queue()?,
        };
        info!(queue = %queue, file = %file.display(), "Submitting to CUPS");

        let args = vec![
            "-d".to_string(),
            queue.clone(),
            "-t".to_string(),
            job.title.clone(),
            "-o".to_string(),
            format!("media={}", job.media),
            "-o".to_string(),
            format!("ColorModel={}", job.color_model),
            "-o".to_string(),
            "scaling=100".to_string(),
            "-o".to_string(),
            "output-order=normal".to_string(),
            file.to_string_lossy().to_string(),
        ];

        match run_with_timeout(&self.lp, &args, self.timeout) {
            Ok(output) if output.success() => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                debug!(queue = %queue, response = %stdout.trim(), "lp accepted job");
                Ok(())
            }
            Ok(output) => Err(SubmitError::Failed {
                backend: self.name(),
                reason: format!("lp exited with {}: {}", output.status, output.stderr),
            }),
            Err(RunError::Timeout(t)) => Err(SubmitError::Failed {
                backend: self.name(),
                reason: format!("lp timed out after {:?}", t),
            }),
            Err(e) => Err(unavailable(self.name(), e)),
        }
    }
}

/// BSD-style spooler submission via `lpr`
#[derive(Debug, Clone)]
pub struct LprBackend {
    lpr: String,
    timeout: Duration,
}

impl LprBackend {
    pub fn from_config(config: &PrinterConfig) -> Self {
        Self {
            lpr: config.lpr_command.clone(),
            timeout: config.timeout(),
        }
    }
}

impl PrintBackend for LprBackend {
    fn name(&self) -> &'static str {
        "lpr"
    }

    fn submit(&self, file: &Path, job: &PrintJob) -> Result<(), SubmitError> {
        info!(file = %file.display(), "Submitting via lpr");
        let args = vec![
            "-T".to_string(),
            job.title.clone(),
            "-o".to_string(),
            format!("media={}", job.media),
            "-o".to_string(),
            format!("ColorModel={}", job.color_model),
            file.to_string_lossy().to_string(),
        ];

        match run_with_timeout(&self.lpr, &args, self.timeout) {
            Ok(output) if output.success() => Ok(()),
            Ok(output) => Err(SubmitError::Failed {
                backend: self.name(),
                reason: format!("lpr exited with {}: {}", output.status, output.stderr),
            }),
            Err(RunError::Timeout(t)) => Err(SubmitError::Failed {
                backend: self.name(),
                reason: format!("lpr timed out after {:?}", t),
            }),
            Err(e) => Err(unavailable(self.name(), e)),
        }
    }
}

fn unavailable(backend: &'static str, err: RunError) -> SubmitError {
    SubmitError::Unavailable {
        backend,
        reason: err.to_string(),
    }
}

/// Destination names from `lpstat -e` output (one per line)
fn parse_destinations(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| line.split_whitespace().next().unwrap_or(line).to_string())
        .collect()
}

/// Primary + fallback submission chain
pub struct PrinterDispatch {
    primary: Box<dyn PrintBackend>,
    fallback: Box<dyn PrintBackend>,
    media: String,
    color_model: String,
    job_prefix: String,
}

impl PrinterDispatch {
    pub fn new(
        primary: Box<dyn PrintBackend>,
        fallback: Box<dyn PrintBackend>,
        config: &PrinterConfig,
    ) -> Self {
        Self {
            primary,
            fallback,
            media: config.media.clone(),
            color_model: config.color_model.clone(),
            job_prefix: config.job_prefix.clone(),
        }
    }

    /// CUPS first, lpr as fallback
    pub fn from_config(config: &PrinterConfig) -> Self {
        Self::new(
            Box::new(CupsBackend::from_config(config)),
            Box::new(LprBackend::from_config(config)),
            config,
        )
    }

    fn job(&self) -> PrintJob {
        PrintJob {
            title: format!("{}-{}", self.job_prefix, chrono::Local::now().to_rfc3339()),
            media: self.media.clone(),
            color_model: self.color_model.clone(),
        }
    }
}

impl Printer for PrinterDispatch {
    fn print(&mut self, strip: &Path) -> Result<(), PrintError> {
        if !strip.is_file() {
            return Err(PrintError::MissingFile(strip.to_path_buf()));
        }
        let job = self.job();

        let primary_err = match self.primary.submit(strip, &job) {
            Ok(()) => {
                info!(backend = self.primary.name(), file = %strip.display(), "Print job queued");
                return Ok(());
            }
            Err(e) if e.is_unavailable() => e,
            Err(e) => {
                error!(backend = self.primary.name(), error = %e, "Print job failed");
                return Err(PrintError::Primary(e));
            }
        };

        warn!(
            primary = self.primary.name(),
            fallback = self.fallback.name(),
            error = %primary_err,
            "Primary print path unavailable, using fallback"
        );

        match self.fallback.submit(strip, &job) {
            Ok(()) => {
                info!(backend = self.fallback.name(), file = %strip.display(), "Print job queued");
                Ok(())
            }
            Err(fallback) => {
                error!(backend = self.fallback.name(), error = %fallback, "Fallback print failed");
                Err(PrintError::Fallback {
                    primary: primary_err,
                    fallback,
                })
            }
        }
    }
}
