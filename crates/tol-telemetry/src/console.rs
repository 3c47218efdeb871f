//! Telemetry console controller.
//!
//! Orchestrates one [`LogTransport`] and renders classified records onto a
//! persistent output surface. Two independent axes of state: enabled
//! (rendering) and connected (ingestion). `toggle` is a display-only mute;
//! ingestion continues and records received while disabled are dropped,
//! not buffered.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use tol_core::output::OutputSink;
use tol_core::settings::Settings;

use crate::parse::{ParsedLine, parse_line};
use crate::transport::{LogTransport, TransportEvent};

pub struct ConsoleController {
    transport: Box<dyn LogTransport>,
    sink: Arc<dyn OutputSink>,
    enabled: Arc<AtomicBool>,
    connected: bool,
    shown: bool,
    pump: Option<JoinHandle<()>>,
    tooltip: String,
}

impl ConsoleController {
    pub fn new(
        transport: Box<dyn LogTransport>,
        sink: Arc<dyn OutputSink>,
        settings: &Settings,
    ) -> Self {
        Self {
            transport,
            sink,
            enabled: Arc::new(AtomicBool::new(false)),
            connected: false,
            shown: false,
            pump: None,
            tooltip: render_tooltip(settings),
        }
    }

    /// Connect the transport using the given settings snapshot and enable
    /// rendering. The host/port are read here, on each start; a settings
    /// change takes effect on the next start, never while connected.
    pub async fn start(&mut self, settings: &Settings) {
        if !self.shown {
            self.sink.show();
            self.shown = true;
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        self.transport
            .connect(settings.log_port, &settings.log_host, tx)
            .await;

        // The first event decides whether the endpoint is usable.
        match rx.recv().await {
            Some(TransportEvent::Connected(addr)) => {
                info!(%addr, "Telemetry started");
                self.sink.append(&format!("Telemetry started {addr}\n"));
                self.enabled.store(true, Ordering::SeqCst);
                self.connected = true;
            }
            Some(TransportEvent::Error(cause)) => {
                warn!(error = %cause, "Failed to start telemetry");
                self.sink
                    .append(&format!("Failed to start telemetry: {cause}\n"));
                return;
            }
            _ => return,
        }

        let sink = Arc::clone(&self.sink);
        let enabled = Arc::clone(&self.enabled);
        self.pump = Some(tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match event {
                    TransportEvent::Data(payload) => {
                        if !enabled.load(Ordering::SeqCst) {
                            continue;
                        }
                        let text = String::from_utf8_lossy(&payload);
                        match parse_line(&text) {
                            ParsedLine::Record(record) => sink.append(&record.render()),
                            ParsedLine::Raw(raw) => sink.append(&raw),
                        }
                    }
                    TransportEvent::Peer(notice) => debug!(notice = %notice, "Telemetry peer"),
                    TransportEvent::Error(cause) => {
                        warn!(error = %cause, "Telemetry transport error");
                        sink.append(&format!("Telemetry error: {cause}\n"));
                    }
                    TransportEvent::Connected(_) => {}
                }
            }
        }));
    }

    /// Disable rendering, disconnect the transport and release the event
    /// pump. Retrying requires an explicit `start`.
    pub fn stop(&mut self) {
        self.enabled.store(false, Ordering::SeqCst);
        self.transport.disconnect();
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        self.connected = false;
        info!("Telemetry stopped");
    }

    /// Flip the display mute without touching the connection. Returns the
    /// new enabled state.
    pub fn toggle(&self) -> bool {
        let enabled = !self.enabled.load(Ordering::SeqCst);
        self.enabled.store(enabled, Ordering::SeqCst);
        info!(
            "{}",
            if enabled {
                "Telemetry resumes"
            } else {
                "Telemetry is paused"
            }
        );
        enabled
    }

    /// Clear the output surface; only honored while enabled.
    pub fn clear(&self) {
        if self.enabled.load(Ordering::SeqCst) {
            self.sink.clear();
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub const fn is_connected(&self) -> bool {
        self.connected
    }

    /// The displayed (not necessarily active) endpoint description.
    pub fn tooltip(&self) -> &str {
        &self.tooltip
    }

    /// Refresh the displayed endpoint text after a settings reload. Does
    /// not affect an active connection.
    pub fn refresh_tooltip(&mut self, settings: &Settings) {
        self.tooltip = render_tooltip(settings);
    }
}

impl Drop for ConsoleController {
    fn drop(&mut self) {
        self.stop();
    }
}

fn render_tooltip(settings: &Settings) -> String {
    format!("Host:{} Port:{}", settings.log_host, settings.log_port)
}
