//! Domain types for the tol server toolkit.
//!
//! This crate holds the pure domain model shared by the runtime and
//! telemetry crates: server descriptors and their derived launch data,
//! the JSON-backed server registry, the configuration snapshot, and the
//! output-sink port that stands in for the editor's output channel.

pub mod output;
pub mod registry;
pub mod server;
pub mod settings;

// Re-export commonly used types for convenience
pub use output::{BufferSink, NoopSink, OutputSink};
pub use registry::{RegistryError, ServerRegistry, validate_install_path};
pub use server::{
    DEBUG_SESSION_NAME, DebugConfiguration, ServerDescriptor, ServerKind, ServerState,
};
pub use settings::{
    DEFAULT_DEBUG_PORT, DEFAULT_LOG_HOST, DEFAULT_LOG_PORT, EnvVar, Settings, SettingsError,
};
