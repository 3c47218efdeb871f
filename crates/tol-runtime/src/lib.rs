//! Process supervision for the tol server toolkit.
//!
//! [`LifecycleController`] owns every server state transition: it spawns
//! server commands through a [`ProcessSpawner`], streams their output to
//! the configured sink, watches the server's config file while it runs and
//! hands debug-attach descriptors to a [`DebugLauncher`]. Stop and restart
//! are expressed as commands of the server executable itself; the
//! controller never signals a child process.

pub mod command;
pub mod controller;
pub mod watcher;

pub use command::{ProcessSpawner, SpawnError, SpawnOptions, TokioSpawner};
pub use controller::{
    DEBUG_ATTACH_DELAY, DebugLauncher, LifecycleController, LifecycleError, NoopDebugLauncher,
};
pub use watcher::{ConfigWatcher, DEFAULT_DEBOUNCE_MS, WatchError, WatchEvent};
