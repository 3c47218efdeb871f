//! Server descriptors and their derived launch data.
//!
//! A [`ServerDescriptor`] represents one configured server installation.
//! The two supported kinds are the platform runtime (a JVM daemon) and the
//! OQL database server. A `smartio-cli` install is recognized by discovery
//! but launches through the platform descriptor; it has no specialization
//! of its own.
//!
//! All derived values (command, arguments, file lists) are pure functions
//! of the current descriptor state: they are assembled fresh on every call,
//! never cached, and never fail. Absent optional paths simply produce
//! shorter lists or `None`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name prefix for debugger attach sessions.
pub const DEBUG_SESSION_NAME: &str = "Platform Debug (Attach)";

const HEAP_MIN_ARG: &str = "-Xms1024m";
const HEAP_MAX_ARG: &str = "-Xmx4096m";
const TLS_PROTOCOLS_ARG: &str = "-Dhttps.protocols=TLSv1,TLSv1.1,TLSv1.2";
const DEBUG_AGENT_PREFIX: &str =
    "-agentlib:jdwp=transport=dt_socket,server=y,suspend=y,address=";
const USER_DIR_PROPERTY: &str = "-Dsmartio.user=";

const IS_WINDOWS: bool = cfg!(target_os = "windows");

/// Append the platform executable suffix to a binary name.
fn exe(name: &str) -> String {
    if IS_WINDOWS {
        format!("{name}.exe")
    } else {
        name.to_string()
    }
}

/// Append the platform script suffix to a launcher name.
fn script(name: &str) -> String {
    if IS_WINDOWS {
        format!("{name}.bat")
    } else {
        format!("{name}.sh")
    }
}

/// The closed set of server variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerKind {
    /// Platform runtime daemon (JVM based).
    #[serde(rename = "platform")]
    Platform,
    /// OQL database server.
    #[serde(rename = "server")]
    Oql,
}

impl ServerKind {
    /// The marker executables (relative to the install path) whose presence
    /// identifies which kinds an installation contains. `smartio-cli`
    /// installs launch through the platform descriptor.
    pub fn markers() -> [(Self, PathBuf); 3] {
        [
            (Self::Platform, Path::new("bin").join(exe("smartIO"))),
            (Self::Oql, Path::new("bin").join(exe("smartIO-odb"))),
            (Self::Platform, Path::new("bin").join(exe("smartio-cli"))),
        ]
    }
}

/// Lifecycle state of a descriptor. There is no transient starting or
/// stopping state; the lifecycle controller guards transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServerState {
    #[default]
    Idle,
    Running,
}

/// Debugger-attach descriptor, consumed by an external debugger front-end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugConfiguration {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub request: String,
    pub host_name: String,
    pub port: u16,
}

/// One configured server installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerDescriptor {
    name: String,
    kind: ServerKind,
    install_path: PathBuf,
    storage_path: PathBuf,
    user_dir: Option<PathBuf>,
    debug_port: i32,
    state: ServerState,
}

impl ServerDescriptor {
    pub fn new(
        name: impl Into<String>,
        kind: ServerKind,
        install_path: impl Into<PathBuf>,
        storage_path: impl Into<PathBuf>,
        user_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            install_path: install_path.into(),
            storage_path: storage_path.into(),
            user_dir,
            debug_port: 0,
            state: ServerState::Idle,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn kind(&self) -> ServerKind {
        self.kind
    }

    /// Human-readable title shown on output surfaces.
    pub fn title(&self) -> String {
        match self.kind {
            ServerKind::Platform => format!("{} Platform", self.name),
            ServerKind::Oql => format!("{} Server", self.name),
        }
    }

    pub fn install_path(&self) -> &Path {
        &self.install_path
    }

    pub fn storage_path(&self) -> &Path {
        &self.storage_path
    }

    pub fn user_dir(&self) -> Option<&Path> {
        self.user_dir.as_deref()
    }

    pub fn set_user_dir(&mut self, user_dir: Option<PathBuf>) {
        self.user_dir = user_dir;
    }

    pub const fn state(&self) -> ServerState {
        self.state
    }

    pub fn set_started(&mut self, started: bool) {
        self.state = if started {
            ServerState::Running
        } else {
            ServerState::Idle
        };
    }

    pub const fn is_started(&self) -> bool {
        matches!(self.state, ServerState::Running)
    }

    pub const fn debug_port(&self) -> i32 {
        self.debug_port
    }

    pub fn set_debug_port(&mut self, port: i32) {
        self.debug_port = port;
    }

    pub const fn is_debugging(&self) -> bool {
        self.debug_port > 0
    }

    pub fn clear_debug_info(&mut self) {
        self.debug_port = 0;
    }

    /// The config file the lifecycle controller watches while running.
    pub fn config_path(&self) -> PathBuf {
        match self.kind {
            ServerKind::Platform => self.install_path.join("conf").join("server.properties"),
            ServerKind::Oql => self.install_path.join("conf").join("odb-server.properties"),
        }
    }

    /// The executable used for both the start and stop commands.
    pub fn command(&self) -> PathBuf {
        match self.kind {
            ServerKind::Platform => self.install_path.join("bin").join(exe("java")),
            ServerKind::Oql => self.install_path.join("bin").join(script("smartIO-odb")),
        }
    }

    /// Assemble the argument list for a `start` or `stop` command.
    pub fn arguments(&self, command: &str) -> Vec<String> {
        match self.kind {
            ServerKind::Platform => self.platform_arguments(command),
            ServerKind::Oql => self.oql_arguments(command),
        }
    }

    fn platform_arguments(&self, command: &str) -> Vec<String> {
        let mut args = vec![
            HEAP_MIN_ARG.to_string(),
            HEAP_MAX_ARG.to_string(),
            TLS_PROTOCOLS_ARG.to_string(),
        ];

        if self.debug_port > 0 && command == "start" {
            args.push(format!("{DEBUG_AGENT_PREFIX}{}", self.debug_port));
        }

        if let Some(user_dir) = &self.user_dir {
            if user_dir.exists() {
                args.push(format!("{USER_DIR_PROPERTY}{}", user_dir.display()));
            }
        }

        args.push("--add-opens=java.base/java.lang=ALL-UNNAMED".to_string());
        args.push("--add-opens=java.base/java.io=tomcat.embed".to_string());
        args.push("-m".to_string());
        args.push("smartio.daemon/it.smartio.daemon.Bootstrap".to_string());
        args.push(command.to_string());
        args.push("--shutdown".to_string());
        args.push("8005".to_string());
        args.push("--enable".to_string());
        args.push("NOLOGIN".to_string());

        args
    }

    fn oql_arguments(&self, command: &str) -> Vec<String> {
        if command != "start" {
            return vec!["-t".to_string()];
        }

        let mut args = Vec::new();
        for file in self.user_files() {
            match file.file_name().and_then(|n| n.to_str()) {
                Some("odb-server.properties") => {
                    args.push("-s".to_string());
                    args.push(file.display().to_string());
                }
                Some("odb-logging.properties") => {
                    args.push("-l".to_string());
                    args.push(file.display().to_string());
                }
                _ => {}
            }
        }
        args
    }

    /// Config files of this installation that exist on disk, order-stable.
    pub fn files(&self) -> Vec<PathBuf> {
        let conf = self.install_path.join("conf");
        let candidates: &[&str] = match self.kind {
            ServerKind::Platform => &[
                "server.properties",
                "logging.properties",
                "worker.properties",
            ],
            ServerKind::Oql => &["odb-server.properties", "odb-logging.properties"],
        };
        candidates
            .iter()
            .map(|name| conf.join(name))
            .filter(|path| path.exists())
            .collect()
    }

    /// Override config files in the user/model directory that exist on disk.
    pub fn user_files(&self) -> Vec<PathBuf> {
        let Some(user_dir) = &self.user_dir else {
            return Vec::new();
        };
        let candidates: &[&str] = match self.kind {
            ServerKind::Platform => &["server.properties", "context.properties"],
            ServerKind::Oql => &["odb-server.properties", "odb-logging.properties"],
        };
        candidates
            .iter()
            .map(|name| user_dir.join(name))
            .filter(|path| path.exists())
            .collect()
    }

    /// Debugger-attach descriptor. `None` signals that debugging is not
    /// supported for this variant.
    pub fn debug_configuration(&self) -> Option<DebugConfiguration> {
        match self.kind {
            ServerKind::Platform => {
                let base = self
                    .storage_path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                Some(DebugConfiguration {
                    kind: "java".to_string(),
                    name: format!("{DEBUG_SESSION_NAME}_{base}"),
                    request: "attach".to_string(),
                    host_name: "localhost".to_string(),
                    port: u16::try_from(self.debug_port).unwrap_or(0),
                })
            }
            ServerKind::Oql => None,
        }
    }
}
