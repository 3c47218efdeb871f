//! Lifecycle controller: the single authority over server run state.
//!
//! Every start, stop, restart and delete goes through
//! [`LifecycleController`]. A start guards against double launches,
//! derives the launch data from the descriptor, supervises the spawned
//! process to completion and tears the run state down afterwards. Stop is
//! expressed as a second command of the same executable; the controller
//! never signals the child directly. Restart is stop with a flag: when the
//! supervised process exits with the flag set, the same launch is armed
//! again.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use tol_core::output::OutputSink;
use tol_core::registry::ServerRegistry;
use tol_core::server::DebugConfiguration;
use tol_core::settings::Settings;

use crate::command::{ProcessSpawner, SpawnOptions};
use crate::watcher::{ConfigWatcher, DEFAULT_DEBOUNCE_MS, WatchEvent};

/// Grace period between spawning a debug start and launching the
/// debugger attach, giving the JVM time to open the agent socket.
pub const DEBUG_ATTACH_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("unknown server: {0}")]
    UnknownServer(String),
}

/// Front-end that attaches a debugger to a running server.
#[async_trait]
pub trait DebugLauncher: Send + Sync {
    async fn launch(&self, config: DebugConfiguration);
}

/// Launcher for hosts without a debugger front-end.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDebugLauncher;

#[async_trait]
impl DebugLauncher for NoopDebugLauncher {
    async fn launch(&self, config: DebugConfiguration) {
        debug!(name = %config.name, port = config.port, "No debugger front-end registered");
    }
}

/// Per-run bookkeeping, keyed by server name while the run is live.
#[derive(Debug, Default)]
struct RunState {
    restart: bool,
}

/// Everything a run needs, captured from the descriptor under the
/// registry lock so the supervised run itself never holds it.
struct Launch {
    title: String,
    command: PathBuf,
    args: Vec<String>,
    config_path: PathBuf,
    debug_config: Option<DebugConfiguration>,
}

#[derive(Clone)]
pub struct LifecycleController {
    registry: Arc<Mutex<ServerRegistry>>,
    spawner: Arc<dyn ProcessSpawner>,
    debugger: Arc<dyn DebugLauncher>,
    sink: Arc<dyn OutputSink>,
    settings: Settings,
    runs: Arc<Mutex<HashMap<String, RunState>>>,
}

impl LifecycleController {
    pub fn new(
        registry: ServerRegistry,
        spawner: Arc<dyn ProcessSpawner>,
        debugger: Arc<dyn DebugLauncher>,
        sink: Arc<dyn OutputSink>,
        settings: Settings,
    ) -> Self {
        Self {
            registry: Arc::new(Mutex::new(registry)),
            spawner,
            debugger,
            sink,
            settings,
            runs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn registry(&self) -> &Arc<Mutex<ServerRegistry>> {
        &self.registry
    }

    pub async fn is_running(&self, name: &str) -> bool {
        self.registry
            .lock()
            .await
            .get(name)
            .is_some_and(|descriptor| descriptor.is_started())
    }

    /// Start a server and supervise it until it exits. Resolves after the
    /// final run finishes, including any restarts requested while it ran.
    /// Starting an already running server is an accepted no-op.
    ///
    /// A debug start needs a workspace to place the attach session in;
    /// without one the server starts plainly and says so on the sink.
    pub async fn start(
        &self,
        name: &str,
        debug: bool,
        workspace: Option<&Path>,
    ) -> Result<(), LifecycleError> {
        loop {
            let Some(launch) = self.arm(name, debug, workspace).await? else {
                return Ok(());
            };
            let restart = self.run(name, &launch).await;
            if !restart {
                return Ok(());
            }
            info!(server = name, "Restarting server");
        }
    }

    /// Issue the stop command of a running server. The supervised run
    /// resolves on its own once the process obeys; `restart` marks the run
    /// to be armed again at that point. Stopping an idle server is an
    /// accepted no-op.
    pub async fn stop(&self, name: &str, restart: bool) -> Result<(), LifecycleError> {
        let (title, command, args) = {
            let registry = self.registry.lock().await;
            let descriptor = registry
                .get(name)
                .ok_or_else(|| LifecycleError::UnknownServer(name.to_string()))?;
            if !descriptor.is_started() {
                info!(server = name, "Server not running, stop ignored");
                return Ok(());
            }
            // The restart intent is recorded in the same critical section
            // as the liveness check; a run that tore down in between would
            // otherwise drop it.
            let mut runs = self.runs.lock().await;
            let Some(state) = runs.get_mut(name) else {
                info!(server = name, "Server already shut down, stop ignored");
                return Ok(());
            };
            state.restart = restart;
            (
                descriptor.title(),
                descriptor.command(),
                descriptor.arguments("stop"),
            )
        };

        info!(server = name, restart, "Stopping server");
        let result = self
            .spawner
            .spawn(
                Arc::clone(&self.sink),
                &title,
                &command,
                self.spawn_options(),
                &args,
            )
            .await;
        if let Err(e) = result {
            self.sink.append(&format!("{e}\n"));
            warn!(server = name, error = %e, "Stop command failed");
        }
        Ok(())
    }

    /// Stop the server if it is running, then remove it from the registry.
    /// Returns whether a registry entry was removed.
    pub async fn delete_server(&self, name: &str) -> bool {
        if self.is_running(name).await {
            if let Err(e) = self.stop(name, false).await {
                warn!(server = name, error = %e, "Failed to stop server before deletion");
            }
        }
        self.registry.lock().await.delete_server(name)
    }

    /// Stop every running server and persist the registry. Called once on
    /// host shutdown.
    pub async fn dispose(&self) {
        let running: Vec<String> = self
            .registry
            .lock()
            .await
            .servers()
            .iter()
            .filter(|descriptor| descriptor.is_started())
            .map(|descriptor| descriptor.name().to_string())
            .collect();
        for name in running {
            if let Err(e) = self.stop(&name, false).await {
                warn!(server = %name, error = %e, "Failed to stop server on dispose");
            }
        }
        self.registry.lock().await.save();
    }

    /// Transition the descriptor to running and capture the launch data.
    /// `Ok(None)` means the server is already running.
    async fn arm(
        &self,
        name: &str,
        debug: bool,
        workspace: Option<&Path>,
    ) -> Result<Option<Launch>, LifecycleError> {
        let mut registry = self.registry.lock().await;
        let descriptor = registry
            .get_mut(name)
            .ok_or_else(|| LifecycleError::UnknownServer(name.to_string()))?;
        if descriptor.is_started() {
            info!(server = name, "Server already running, start ignored");
            return Ok(None);
        }

        if debug {
            if workspace.is_some() {
                descriptor.set_debug_port(i32::from(self.settings.debug_port));
            } else {
                descriptor.set_debug_port(-1);
                self.sink
                    .append("No workspace found! Starting without debugging!\n");
            }
        }
        descriptor.set_started(true);

        let launch = Launch {
            title: descriptor.title(),
            command: descriptor.command(),
            args: descriptor.arguments("start"),
            config_path: descriptor.config_path(),
            debug_config: if descriptor.is_debugging() {
                descriptor.debug_configuration()
            } else {
                None
            },
        };

        // State flip and bookkeeping entry change together under the
        // registry lock.
        self.runs
            .lock()
            .await
            .insert(name.to_string(), RunState::default());
        Ok(Some(launch))
    }

    /// Supervise one run to completion and tear its state down. Returns
    /// whether a restart was requested while it ran.
    async fn run(&self, name: &str, launch: &Launch) -> bool {
        let watch_task = match ConfigWatcher::new(&launch.config_path, DEFAULT_DEBOUNCE_MS) {
            Ok(mut watcher) => Some(tokio::spawn(async move {
                while let Some(WatchEvent::Modified(path)) = watcher.recv().await {
                    info!(path = %path.display(), "Server config changed on disk");
                }
            })),
            Err(e) => {
                debug!(server = name, error = %e, "Config watch unavailable");
                None
            }
        };

        let attach_task = launch.debug_config.clone().map(|config| {
            let debugger = Arc::clone(&self.debugger);
            tokio::spawn(async move {
                tokio::time::sleep(DEBUG_ATTACH_DELAY).await;
                debugger.launch(config).await;
            })
        });

        let result = self
            .spawner
            .spawn(
                Arc::clone(&self.sink),
                &launch.title,
                &launch.command,
                self.spawn_options(),
                &launch.args,
            )
            .await;

        if let Some(task) = watch_task {
            task.abort();
        }
        if let Some(task) = attach_task {
            task.abort();
        }

        if let Err(e) = &result {
            self.sink.append(&format!("{e}\n"));
            error!(server = name, error = %e, "Server run failed");
        }

        let mut registry = self.registry.lock().await;
        if let Some(descriptor) = registry.get_mut(name) {
            descriptor.set_started(false);
            descriptor.clear_debug_info();
        }
        self.runs
            .lock()
            .await
            .remove(name)
            .map(|state| state.restart)
            .unwrap_or_default()
    }

    fn spawn_options(&self) -> SpawnOptions {
        SpawnOptions {
            env: self.settings.custom_env.clone(),
            cwd: None,
        }
    }
}
