// SPDX-License-Identifier: GPL-3.0-only

//! Controller loop
//!
//! Owns the transport and the session machine. Polls the message FIFO at a
//! fixed interval and hands at most one message per iteration to the machine,
//! which runs it to completion before the next poll.

use super::machine::{Capabilities, SessionMachine};
use super::session::SessionStatus;
use crate::backends::camera::camera_from_config;
use crate::backends::printer::PrinterDispatch;
use crate::config::BoothConfig;
use crate::dashboard::{
    BoothIdentity, DashboardClient, NullSink, StatusReport, StatusSink, SystemMetrics,
};
use crate::errors::{BoothError, BoothResult};
use crate::pipelines::strip::StripPipeline;
use crate::storage::BoothDirs;
use crate::transport::{Link, MessageTransport, Outbound};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub struct BoothController {
    poll_interval: Duration,
    health_interval: Option<Duration>,
    storage_root: std::path::PathBuf,
    machine: SessionMachine,
    transport: Option<MessageTransport>,
    running: Arc<AtomicBool>,
    last_health: Instant,
}

impl BoothController {
    pub fn new(config: &BoothConfig, machine: SessionMachine) -> Self {
        Self {
            poll_interval: config.session.poll_interval(),
            health_interval: config
                .dashboard
                .enabled
                .then(|| config.dashboard.health_interval()),
            storage_root: config.storage.resolved_base_dir(),
            machine,
            transport: None,
            running: Arc::new(AtomicBool::new(true)),
            last_health: Instant::now(),
        }
    }

    /// Build the production capability set from configuration
    pub fn from_config(config: &BoothConfig) -> BoothResult<Self> {
        let dirs = BoothDirs::new(&config.storage.resolved_base_dir());
        dirs.ensure()?;
        info!(base = %config.storage.resolved_base_dir().display(), "Booth storage ready");

        let status: Box<dyn StatusSink> = if config.dashboard.enabled {
            let identity = BoothIdentity::from_config(&config.dashboard);
            Box::new(DashboardClient::start(&config.dashboard.server_url, identity)?)
        } else {
            info!("Dashboard reporting disabled");
            Box::new(NullSink)
        };

        let machine = SessionMachine::new(
            config,
            StripPipeline::from_config(config, dirs),
            Capabilities {
                camera: camera_from_config(&config.camera),
                printer: Box::new(PrinterDispatch::from_config(&config.printer)),
                status,
            },
        );

        Ok(Self::new(config, machine))
    }

    /// Connect to the controller board and announce readiness
    ///
    /// A link that cannot be opened is fatal.
    pub fn initialize<L: Link>(&mut self, link: L) -> BoothResult<()> {
        let mut transport = MessageTransport::connect(link)?;
        transport.send(Outbound::Ready)?;
        info!(endpoint = %transport.endpoint(), "Booth ready");

        self.transport = Some(transport);
        self.machine.status_sink().report(StatusReport::Registration);
        self.last_health = Instant::now();
        Ok(())
    }

    /// Flag that keeps [`run`](Self::run) looping; clear it to stop
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn status(&self) -> SessionStatus {
        self.machine.status()
    }

    pub fn machine(&self) -> &SessionMachine {
        &self.machine
    }

    /// One poll: wait up to the poll interval for a message and handle it
    ///
    /// Returns `true` if a message was handled.
    pub fn poll_once(&mut self) -> BoothResult<bool> {
        self.maybe_report_health();

        let transport = self.transport.as_mut().ok_or_else(|| {
            BoothError::Transport(crate::errors::TransportError::Disconnected)
        })?;
        let Some(message) = transport.receive(self.poll_interval) else {
            if !transport.is_reading() && transport.pending() == 0 {
                warn!(endpoint = %transport.endpoint(), "Link read loop stopped");
                return Err(BoothError::Transport(
                    crate::errors::TransportError::Disconnected,
                ));
            }
            return Ok(false);
        };

        debug!(message = %message, pending = transport.pending(), "Dequeued message");
        self.machine.handle(message, transport);
        Ok(true)
    }

    /// Loop until the running flag is cleared, then shut down
    pub fn run(&mut self) -> BoothResult<()> {
        info!(poll_interval = ?self.poll_interval, "Controller loop started");
        let result = loop {
            if !self.running.load(Ordering::SeqCst) {
                break Ok(());
            }
            if let Err(e) = self.poll_once() {
                break Err(e);
            }
        };
        self.shutdown();
        result
    }

    /// Stop the read loop and release the link. Pending messages are dropped.
    pub fn shutdown(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(mut transport) = self.transport.take() {
            transport.disconnect();
        }
        info!(status = %self.machine.status(), "Booth shut down");
    }

    fn maybe_report_health(&mut self) {
        let Some(interval) = self.health_interval else {
            return;
        };
        if self.last_health.elapsed() < interval {
            return;
        }
        self.last_health = Instant::now();
        let metrics = SystemMetrics::collect(&self.storage_root);
        self.machine.status_sink().report(StatusReport::Health(metrics));
    }
}

impl Drop for BoothController {
    fn drop(&mut self) {
        if self.transport.is_some() {
            warn!("Booth controller dropped without shutdown");
            self.shutdown();
        }
    }
}
