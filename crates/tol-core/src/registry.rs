//! The server registry: the owning collection of configured descriptors.
//!
//! Registry membership and the on-disk `servers.json` are kept consistent
//! after every mutating call: each mutation rewrites the full list. Writes
//! and storage-directory cleanup are best effort — failures are logged and
//! never propagated to the caller. A malformed or missing list file yields
//! an empty registry.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::server::{ServerDescriptor, ServerKind};

/// File name of the persisted server list inside the workspace directory.
pub const SERVERS_FILE: &str = "servers.json";

#[derive(Debug, Error)]
pub enum RegistryError {
    /// The install path contains no marker executable of any known kind.
    #[error("no server marker executable found under {0}")]
    InvalidInstallPath(PathBuf),
}

/// Durable projection of a descriptor, serialized as a flat JSON list.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedServer {
    #[serde(rename = "_name")]
    name: String,
    #[serde(rename = "_installPath")]
    install_path: PathBuf,
    #[serde(rename = "_storagePath")]
    storage_path: PathBuf,
    #[serde(rename = "_type")]
    kind: ServerKind,
    #[serde(rename = "_model", skip_serializing_if = "Option::is_none")]
    model: Option<PathBuf>,
}

impl PersistedServer {
    fn of(descriptor: &ServerDescriptor) -> Self {
        Self {
            name: descriptor.name().to_string(),
            install_path: descriptor.install_path().to_path_buf(),
            storage_path: descriptor.storage_path().to_path_buf(),
            kind: descriptor.kind(),
            model: descriptor.user_dir().map(Path::to_path_buf),
        }
    }

    fn into_descriptor(self) -> ServerDescriptor {
        ServerDescriptor::new(
            self.name,
            self.kind,
            self.install_path,
            self.storage_path,
            self.model,
        )
    }
}

/// Check whether a directory looks like a valid server installation:
/// either the platform config pair or the OQL config pair must be present.
pub fn validate_install_path(install_path: &Path) -> bool {
    let conf = install_path.join("conf");
    let bin = install_path.join("bin");
    let platform = conf.join("server.properties").exists()
        && conf.join("logging.properties").exists();
    let oql = bin.join("odb-server.properties").exists()
        && bin.join("odb-logging.properties").exists();
    platform || oql
}

/// The set of configured server descriptors, backed by `servers.json` in
/// the workspace directory. The registry exclusively owns the descriptors
/// and their storage directories.
#[derive(Debug)]
pub struct ServerRegistry {
    workspace_dir: PathBuf,
    servers: Vec<ServerDescriptor>,
}

impl ServerRegistry {
    /// Load the persisted server list from the workspace directory.
    /// A missing or malformed file yields an empty registry.
    pub fn load(workspace_dir: impl Into<PathBuf>) -> Self {
        let workspace_dir = workspace_dir.into();
        let file = workspace_dir.join(SERVERS_FILE);
        let servers = match fs::read_to_string(&file) {
            Ok(text) => match serde_json::from_str::<Vec<PersistedServer>>(&text) {
                Ok(list) => list
                    .into_iter()
                    .map(PersistedServer::into_descriptor)
                    .collect(),
                Err(e) => {
                    warn!(file = %file.display(), error = %e, "Malformed server list, starting empty");
                    Vec::new()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                warn!(file = %file.display(), error = %e, "Failed to read server list, starting empty");
                Vec::new()
            }
        };
        debug!(count = servers.len(), dir = %workspace_dir.display(), "Loaded server registry");
        Self {
            workspace_dir,
            servers,
        }
    }

    pub fn workspace_dir(&self) -> &Path {
        &self.workspace_dir
    }

    pub fn servers(&self) -> &[ServerDescriptor] {
        &self.servers
    }

    pub fn get(&self, name: &str) -> Option<&ServerDescriptor> {
        self.servers.iter().find(|s| s.name() == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut ServerDescriptor> {
        self.servers.iter_mut().find(|s| s.name() == name)
    }

    /// Probe an install path for marker executables and register a
    /// descriptor per kind found. Returns the registered names.
    pub fn add_server_path(&mut self, install_path: &Path) -> Result<Vec<String>, RegistryError> {
        let kinds: Vec<ServerKind> = ServerKind::markers()
            .into_iter()
            .filter(|(_, marker)| install_path.join(marker).exists())
            .map(|(kind, _)| kind)
            .collect();
        if kinds.is_empty() {
            return Err(RegistryError::InvalidInstallPath(install_path.to_path_buf()));
        }

        let base = install_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "server".to_string());

        let mut added = Vec::new();
        for kind in kinds {
            let name = self.dedup_name(&base);
            let storage = self.workspace_dir.join(&name);
            if let Err(e) = fs::remove_dir_all(&storage) {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!(dir = %storage.display(), error = %e, "Failed to clear storage directory");
                }
            }
            if let Err(e) = fs::create_dir_all(&storage) {
                warn!(dir = %storage.display(), error = %e, "Failed to create storage directory");
            }
            self.add_server(ServerDescriptor::new(
                name.clone(),
                kind,
                install_path,
                storage,
                None,
            ));
            added.push(name);
        }
        Ok(added)
    }

    /// Register a descriptor, replacing any existing entry with the same
    /// name (last write wins), and persist the list.
    pub fn add_server(&mut self, descriptor: ServerDescriptor) {
        self.servers.retain(|s| s.name() != descriptor.name());
        self.servers.push(descriptor);
        self.save();
    }

    /// Remove a descriptor by name. Deletes its storage directory best
    /// effort and persists. Returns whether a removal occurred.
    pub fn delete_server(&mut self, name: &str) -> bool {
        let Some(index) = self.servers.iter().position(|s| s.name() == name) else {
            return false;
        };
        let removed = self.servers.remove(index);
        if let Err(e) = fs::remove_dir_all(removed.storage_path()) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(dir = %removed.storage_path().display(), error = %e,
                    "Failed to remove storage directory");
            }
        }
        self.save();
        true
    }

    /// Set or clear the user/model directory override and persist.
    /// Returns whether the named descriptor exists.
    pub fn set_model_path(&mut self, name: &str, user_dir: Option<PathBuf>) -> bool {
        let Some(descriptor) = self.get_mut(name) else {
            return false;
        };
        descriptor.set_user_dir(user_dir);
        self.save();
        true
    }

    /// Rewrite `servers.json` wholesale. Best effort: failures are logged,
    /// never propagated.
    pub fn save(&self) {
        if let Err(e) = fs::create_dir_all(&self.workspace_dir) {
            warn!(dir = %self.workspace_dir.display(), error = %e,
                "Failed to create workspace directory");
        }
        let list: Vec<PersistedServer> = self.servers.iter().map(PersistedServer::of).collect();
        let file = self.workspace_dir.join(SERVERS_FILE);
        match serde_json::to_string_pretty(&list) {
            Ok(json) => {
                if let Err(e) = fs::write(&file, json) {
                    warn!(file = %file.display(), error = %e, "Failed to write server list");
                }
            }
            Err(e) => warn!(error = %e, "Failed to serialize server list"),
        }
    }

    /// De-duplicate a name against live registry entries and file names
    /// already present in the workspace directory: `base`, `base-1`, ...
    fn dedup_name(&self, base: &str) -> String {
        let mut name = base.to_string();
        let mut index = 1;
        while self.is_name_taken(&name) {
            name = format!("{base}-{index}");
            index += 1;
        }
        name
    }

    fn is_name_taken(&self, name: &str) -> bool {
        if self.servers.iter().any(|s| s.name() == name) {
            return true;
        }
        self.workspace_dir.join(name).exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    /// Create an install directory carrying the given marker executables.
    fn install_dir(root: &Path, name: &str, markers: &[&str]) -> PathBuf {
        let install = root.join(name);
        let bin = install.join("bin");
        fs::create_dir_all(&bin).unwrap();
        for marker in markers {
            fs::write(bin.join(marker), "").unwrap();
        }
        install
    }

    fn platform_marker() -> &'static str {
        if cfg!(target_os = "windows") {
            "smartIO.exe"
        } else {
            "smartIO"
        }
    }

    #[test]
    fn add_server_path_rejects_unmarked_directory() {
        let temp = TempDir::new().unwrap();
        let install = install_dir(temp.path(), "empty", &[]);
        let mut registry = ServerRegistry::load(temp.path().join("ws"));
        assert!(matches!(
            registry.add_server_path(&install),
            Err(RegistryError::InvalidInstallPath(_))
        ));
        assert!(registry.servers().is_empty());
    }

    #[test]
    fn add_server_path_registers_platform_descriptor() {
        let temp = TempDir::new().unwrap();
        let install = install_dir(temp.path(), "alpha", &[platform_marker()]);
        let mut registry = ServerRegistry::load(temp.path().join("ws"));

        let added = registry.add_server_path(&install).unwrap();
        assert_eq!(added, vec!["alpha"]);
        let descriptor = registry.get("alpha").unwrap();
        assert_eq!(descriptor.kind(), ServerKind::Platform);
        assert_eq!(descriptor.install_path(), install);
        assert!(descriptor.storage_path().is_dir());
    }

    #[test]
    fn colliding_basenames_get_numeric_suffixes() {
        let temp = TempDir::new().unwrap();
        let mut registry = ServerRegistry::load(temp.path().join("ws"));

        for parent in ["a", "b", "c"] {
            let install = install_dir(&temp.path().join(parent), "tol", &[platform_marker()]);
            registry.add_server_path(&install).unwrap();
        }

        let names: Vec<&str> = registry.servers().iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["tol", "tol-1", "tol-2"]);
    }

    #[test]
    fn add_server_is_last_write_wins() {
        let temp = TempDir::new().unwrap();
        let mut registry = ServerRegistry::load(temp.path());

        registry.add_server(ServerDescriptor::new(
            "alpha",
            ServerKind::Platform,
            "/opt/old",
            temp.path().join("alpha"),
            None,
        ));
        registry.add_server(ServerDescriptor::new(
            "alpha",
            ServerKind::Platform,
            "/opt/new",
            temp.path().join("alpha"),
            None,
        ));

        assert_eq!(registry.servers().len(), 1);
        assert_eq!(
            registry.get("alpha").unwrap().install_path(),
            Path::new("/opt/new")
        );
    }

    #[test]
    fn save_and_load_round_trip_with_model_override() {
        let temp = TempDir::new().unwrap();
        let ws = temp.path().join("ws");
        let model = temp.path().join("model");

        {
            let mut registry = ServerRegistry::load(&ws);
            registry.add_server(ServerDescriptor::new(
                "alpha",
                ServerKind::Platform,
                "/opt/alpha",
                ws.join("alpha"),
                None,
            ));
            assert!(registry.set_model_path("alpha", Some(model.clone())));
        }

        let reloaded = ServerRegistry::load(&ws);
        assert_eq!(reloaded.servers().len(), 1);
        let descriptor = reloaded.get("alpha").unwrap();
        assert_eq!(descriptor.kind(), ServerKind::Platform);
        assert_eq!(descriptor.install_path(), Path::new("/opt/alpha"));
        assert_eq!(descriptor.storage_path(), ws.join("alpha"));
        assert_eq!(descriptor.user_dir(), Some(model.as_path()));
    }

    #[test]
    fn delete_server_removes_entry_and_storage_dir() {
        let temp = TempDir::new().unwrap();
        let install = install_dir(temp.path(), "alpha", &[platform_marker()]);
        let ws = temp.path().join("ws");
        let mut registry = ServerRegistry::load(&ws);
        registry.add_server_path(&install).unwrap();
        let storage = registry.get("alpha").unwrap().storage_path().to_path_buf();
        assert!(storage.is_dir());

        assert!(registry.delete_server("alpha"));
        assert!(!storage.exists());
        assert!(!registry.delete_server("alpha"));

        let reloaded = ServerRegistry::load(&ws);
        assert!(reloaded.servers().is_empty());
    }

    #[test]
    fn malformed_list_file_yields_empty_registry() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(SERVERS_FILE), "{not json").unwrap();
        let registry = ServerRegistry::load(temp.path());
        assert!(registry.servers().is_empty());
    }

    #[test]
    fn persisted_projection_uses_underscore_field_names() {
        let temp = TempDir::new().unwrap();
        let mut registry = ServerRegistry::load(temp.path());
        registry.add_server(ServerDescriptor::new(
            "odb",
            ServerKind::Oql,
            "/opt/odb",
            temp.path().join("odb"),
            None,
        ));

        let text = fs::read_to_string(temp.path().join(SERVERS_FILE)).unwrap();
        assert!(text.contains("\"_name\": \"odb\""));
        assert!(text.contains("\"_type\": \"server\""));
        assert!(!text.contains("\"_model\""));
    }

    #[test]
    fn validate_install_path_requires_a_config_pair() {
        let temp = TempDir::new().unwrap();
        assert!(!validate_install_path(temp.path()));

        let conf = temp.path().join("conf");
        fs::create_dir_all(&conf).unwrap();
        fs::write(conf.join("server.properties"), "").unwrap();
        assert!(!validate_install_path(temp.path()));
        fs::write(conf.join("logging.properties"), "").unwrap();
        assert!(validate_install_path(temp.path()));
    }
}
