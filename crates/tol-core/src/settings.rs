//! Configuration snapshot.
//!
//! Components receive an explicit [`Settings`] value at construction or
//! start time instead of reading global editor state ad hoc. A change on
//! disk takes effect only when a consumer is handed a freshly loaded
//! snapshot (the telemetry console re-reads on `start`, not while
//! connected).

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Default host the telemetry listener binds to.
pub const DEFAULT_LOG_HOST: &str = "127.0.0.1";

/// Default port of the telemetry listener.
pub const DEFAULT_LOG_PORT: u16 = 5140;

/// Well-known JVM debug-attach port.
pub const DEFAULT_DEBUG_PORT: u16 = 8004;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed settings: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// A custom environment variable overlaid onto the inherited environment
/// of spawned server processes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

/// Snapshot of the external configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Host the telemetry transport binds to.
    pub log_host: String,
    /// Port the telemetry transport binds to.
    pub log_port: u16,
    /// Environment overlay for spawned server processes.
    pub custom_env: Vec<EnvVar>,
    /// Debugger attach port assigned to a debug start.
    pub debug_port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_host: DEFAULT_LOG_HOST.to_string(),
            log_port: DEFAULT_LOG_PORT,
            custom_env: Vec::new(),
            debug_port: DEFAULT_DEBUG_PORT,
        }
    }
}

impl Settings {
    /// Load a snapshot from a JSON file. A missing file yields defaults;
    /// a malformed one is an error the caller reports.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        match fs::read_to_string(path) {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }
}
