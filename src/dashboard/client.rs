// SPDX-License-Identifier: GPL-3.0-only

//! HTTP delivery of status reports to the booth dashboard
//!
//! Reports are queued on an unbounded channel and posted from a dedicated
//! thread running a current-thread tokio runtime, so the controller loop never
//! waits on the network.

use super::{StatusReport, StatusSink};
use crate::config::DashboardConfig;
use crate::constants;
use serde::Serialize;
use serde_json::{Value, json};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// First retry delay; doubled per attempt
const BACKOFF_BASE: Duration = Duration::from_secs(1);

const FLUSH_POLL: Duration = Duration::from_millis(20);

/// Identity sent with the registration report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoothIdentity {
    pub booth_id: String,
    pub hardware_id: String,
    pub device_type: String,
    pub region: String,
    pub address: String,
    pub firmware_version: String,
}

impl BoothIdentity {
    pub fn from_config(config: &DashboardConfig) -> Self {
        Self {
            booth_id: config.booth_id.clone(),
            hardware_id: super::metrics::hardware_id(),
            device_type: constants::dashboard::DEVICE_TYPE.to_string(),
            region: config.region.clone(),
            address: config.address.clone(),
            firmware_version: env!("GIT_VERSION").to_string(),
        }
    }
}

/// Status sink posting to the dashboard HTTP API
pub struct DashboardClient {
    sender: Option<UnboundedSender<StatusReport>>,
    worker: Option<JoinHandle<()>>,
}

impl DashboardClient {
    /// Spawn the delivery thread
    pub fn start(server_url: &str, identity: BoothIdentity) -> std::io::Result<Self> {
        let routes = Routes::new(server_url, identity);
        let (sender, receiver) = mpsc::unbounded_channel();

        info!(server = %routes.base_url, booth_id = %routes.identity.booth_id, "Starting dashboard client");

        let worker = thread::Builder::new()
            .name("dashboard".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        error!(error = %e, "Failed to build dashboard runtime");
                        return;
                    }
                };
                runtime.block_on(deliver_reports(routes, receiver));
            })?;

        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
        })
    }
}

impl StatusSink for DashboardClient {
    fn report(&self, report: StatusReport) {
        let Some(sender) = &self.sender else {
            return;
        };
        if let Err(e) = sender.send(report) {
            warn!(report = e.0.label(), "Dashboard thread has stopped, report dropped");
        }
    }
}

impl Drop for DashboardClient {
    /// Close the queue and give queued reports a bounded time to be delivered
    fn drop(&mut self) {
        self.sender.take();
        let Some(worker) = self.worker.take() else {
            return;
        };

        let deadline = Instant::now() + constants::dashboard::FLUSH_TIMEOUT;
        while !worker.is_finished() {
            if Instant::now() >= deadline {
                warn!(
                    timeout = ?constants::dashboard::FLUSH_TIMEOUT,
                    "Dashboard reports still pending at shutdown, abandoning them"
                );
                return;
            }
            thread::sleep(FLUSH_POLL);
        }
        if worker.join().is_err() {
            warn!("Dashboard thread panicked");
        }
    }
}

async fn deliver_reports(routes: Routes, mut receiver: UnboundedReceiver<StatusReport>) {
    let http = match reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(REQUEST_TIMEOUT)
        .build()
    {
        Ok(http) => http,
        Err(e) => {
            error!(error = %e, "Failed to build dashboard HTTP client");
            return;
        }
    };

    while let Some(report) = receiver.recv().await {
        let label = report.label();
        let Some((url, body)) = routes.request_for(&report) else {
            debug!(report = label, "Status report has no dashboard endpoint");
            continue;
        };
        match post_with_retry(&http, &url, &body).await {
            Ok(()) => debug!(report = label, url = %url, "Status report delivered"),
            Err(e) => error!(report = label, url = %url, error = %e, "Failed to deliver status report"),
        }
    }

    debug!("Dashboard report queue closed");
}

async fn post_with_retry(http: &reqwest::Client, url: &str, body: &Value) -> Result<(), String> {
    let mut last_error = String::new();

    for attempt in 1..=constants::dashboard::MAX_ATTEMPTS {
        if attempt > 1 {
            tokio::time::sleep(BACKOFF_BASE * 2u32.pow(attempt - 2)).await;
        }

        match http.post(url).json(body).send().await {
            Ok(response) if response.status().is_success() => return Ok(()),
            Ok(response) => {
                let status = response.status();
                last_error = format!("HTTP {}", status);
                if !is_retryable(status.as_u16()) {
                    return Err(last_error);
                }
            }
            Err(e) => {
                last_error = e.to_string();
                if !(e.is_connect() || e.is_timeout() || e.is_request()) {
                    return Err(last_error);
                }
            }
        }
        warn!(url, attempt, error = %last_error, "Dashboard request failed");
    }

    Err(last_error)
}

fn is_retryable(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

/// Endpoint and payload construction for each report kind
struct Routes {
    base_url: String,
    identity: BoothIdentity,
}

impl Routes {
    fn new(server_url: &str, identity: BoothIdentity) -> Self {
        Self {
            base_url: server_url.trim_end_matches('/').to_string(),
            identity,
        }
    }

    fn booth_url(&self, leaf: &str) -> String {
        format!("{}/api/booths/{}/{}", self.base_url, self.identity.booth_id, leaf)
    }

    /// URL and JSON body, or `None` for reports that are only logged locally
    fn request_for(&self, report: &StatusReport) -> Option<(String, Value)> {
        let booth_id = &self.identity.booth_id;
        let now = chrono::Local::now().to_rfc3339();

        match report {
            StatusReport::Registration => {
                let mut body = serde_json::to_value(&self.identity).ok()?;
                body["name"] = json!(format!("Booth {}", booth_id));
                Some((format!("{}/api/booths/register", self.base_url), body))
            }
            StatusReport::SessionStarted { .. } | StatusReport::PhotoCaptured(_) => None,
            StatusReport::SessionFinished(record) => {
                let mut body = serde_json::to_value(record).ok()?;
                body["booth_id"] = json!(booth_id);
                Some((self.booth_url("session"), body))
            }
            StatusReport::Error {
                error_type,
                message,
            } => Some((
                self.booth_url("error"),
                json!({
                    "booth_id": booth_id,
                    "timestamp": now,
                    "error_type": error_type,
                    "error_message": message,
                }),
            )),
            StatusReport::Health(metrics) => {
                let mut body = serde_json::to_value(metrics).ok()?;
                body["booth_id"] = json!(booth_id);
                body["timestamp"] = json!(now);
                Some((self.booth_url("health"), body))
            }
        }
    }
}
