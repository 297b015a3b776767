//! Config Provider boundary
//!
//! The client only ever reads configuration through [`ConfigProvider`].
//! Loading, hot reload and change detection live behind this trait.

use parking_lot::RwLock;
use std::path::{Path, PathBuf};

use super::client::ClientConfig;
use crate::error::ConfigError;

/// Source of the client's configuration
pub trait ConfigProvider: Send + Sync {
    /// Current configuration
    fn snapshot(&self) -> ClientConfig;
}

/// A fixed configuration
impl ConfigProvider for ClientConfig {
    fn snapshot(&self) -> ClientConfig {
        self.clone()
    }
}

/// Sections that differ between two configurations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangedSections {
    pub klipper: bool,
    pub websocket: bool,
    pub response: bool,
}

impl ChangedSections {
    /// Compare two configurations section by section
    pub fn between(old: &ClientConfig, new: &ClientConfig) -> Self {
        Self {
            klipper: old.klipper != new.klipper,
            websocket: old.websocket != new.websocket,
            response: old.response != new.response,
        }
    }

    /// Whether the connection has to be rebuilt
    ///
    /// Template changes take effect on the next text event without a reconnect.
    pub fn requires_reconnect(&self) -> bool {
        self.klipper || self.websocket
    }

    /// Whether anything changed
    pub fn any(&self) -> bool {
        self.klipper || self.websocket || self.response
    }
}

/// Shared, replaceable configuration, optionally backed by a TOML file
#[derive(Debug)]
pub struct SharedConfig {
    path: Option<PathBuf>,
    current: RwLock<ClientConfig>,
}

impl SharedConfig {
    /// Wrap an in-memory configuration
    pub fn new(config: ClientConfig) -> Self {
        Self {
            path: None,
            current: RwLock::new(config),
        }
    }

    /// Load from a TOML file; later [`reload`](Self::reload) calls re-read it
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let config = load_validated(&path)?;
        tracing::info!("Loaded configuration from {:?}", path);
        Ok(Self {
            path: Some(path),
            current: RwLock::new(config),
        })
    }

    /// Like [`from_file`](Self::from_file), but a missing file yields the
    /// defaults. The path is kept so a later reload picks the file up.
    pub fn from_file_or_default(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        match load_validated(&path) {
            Ok(config) => {
                tracing::info!("Loaded configuration from {:?}", path);
                Ok(Self {
                    path: Some(path),
                    current: RwLock::new(config),
                })
            }
            Err(ConfigError::NotFound(_)) => {
                tracing::warn!("Config file {:?} not found, using defaults", path);
                Ok(Self {
                    path: Some(path),
                    current: RwLock::new(ClientConfig::default()),
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Backing file, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Swap in a new configuration and report what changed
    pub fn replace(&self, config: ClientConfig) -> ChangedSections {
        let mut current = self.current.write();
        let changed = ChangedSections::between(&current, &config);
        *current = config;
        changed
    }

    /// Re-read the backing file.
    ///
    /// On error the previous configuration stays in effect. Without a
    /// backing file this is a no-op.
    pub fn reload(&self) -> Result<ChangedSections, ConfigError> {
        self.reload_with(|_| {})
    }

    /// Re-read the backing file and pass the result through `adjust`
    /// before it replaces the current configuration.
    ///
    /// Command-line overrides go here so a reload does not drop them.
    pub fn reload_with(
        &self,
        adjust: impl FnOnce(&mut ClientConfig),
    ) -> Result<ChangedSections, ConfigError> {
        let Some(path) = self.path.as_deref() else {
            return Ok(ChangedSections::default());
        };
        let mut config = load_validated(path)?;
        adjust(&mut config);
        let changed = self.replace(config);
        tracing::info!(
            "Reloaded configuration from {:?} (klipper: {}, websocket: {}, response: {})",
            path,
            changed.klipper,
            changed.websocket,
            changed.response
        );
        Ok(changed)
    }
}

impl ConfigProvider for SharedConfig {
    fn snapshot(&self) -> ClientConfig {
        self.current.read().clone()
    }
}

fn load_validated(path: &Path) -> Result<ClientConfig, ConfigError> {
    let config: ClientConfig = super::load_config(path)?;
    config.websocket.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_replace_reports_sections() {
        let shared = SharedConfig::new(ClientConfig::default());

        let mut next = ClientConfig::default();
        next.response.insert("a", "b", "c");
        let changed = shared.replace(next.clone());
        assert!(changed.response);
        assert!(!changed.requires_reconnect());

        next.klipper.host = Some("printer".to_string());
        let changed = shared.replace(next);
        assert!(changed.klipper);
        assert!(changed.requires_reconnect());
        assert_eq!(shared.snapshot().klipper.host.as_deref(), Some("printer"));
    }

    #[test]
    fn test_reload_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[klipper]\nhost = \"a\"\n").unwrap();

        let shared = SharedConfig::from_file(&path).unwrap();
        assert_eq!(shared.snapshot().klipper.host.as_deref(), Some("a"));

        std::fs::write(&path, "[klipper]\nhost = \"a\"\n[websocket]\nreconnect_delay = 5\n").unwrap();
        let changed = shared.reload().unwrap();
        assert!(!changed.klipper);
        assert!(changed.websocket);
        assert_eq!(shared.snapshot().websocket.reconnect_delay, Duration::from_secs(5));
    }

    #[test]
    fn test_reload_keeps_previous_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[klipper]\nhost = \"a\"\n").unwrap();
        let shared = SharedConfig::from_file(&path).unwrap();

        std::fs::write(&path, "[websocket]\nbackoff_multiplier = 0.1\n").unwrap();
        assert!(matches!(shared.reload(), Err(ConfigError::Invalid(_))));
        assert_eq!(shared.snapshot().klipper.host.as_deref(), Some("a"));
    }

    #[test]
    fn test_missing_file_then_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let shared = SharedConfig::from_file_or_default(&path).unwrap();
        assert!(shared.snapshot().endpoint().is_err());

        std::fs::write(&path, "[klipper]\nhost = \"printer\"\n").unwrap();
        assert!(shared.reload().unwrap().requires_reconnect());
        assert_eq!(shared.snapshot().endpoint().unwrap(), "ws://printer:7125/websocket");
    }

    #[test]
    fn test_reload_with_keeps_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[klipper]\nhost = \"from-file\"\n").unwrap();

        let shared = SharedConfig::from_file(&path).unwrap();
        let mut overridden = shared.snapshot();
        overridden.klipper.host = Some("from-cli".to_string());
        shared.replace(overridden);

        std::fs::write(&path, "[klipper]\nhost = \"from-file\"\n[response.a]\nb = [\"c\"]\n")
            .unwrap();
        let changed = shared
            .reload_with(|config| config.klipper.host = Some("from-cli".to_string()))
            .unwrap();
        assert!(!changed.requires_reconnect());
        assert!(changed.response);
        assert_eq!(shared.snapshot().klipper.host.as_deref(), Some("from-cli"));
    }

    #[test]
    fn test_reload_without_file_is_noop() {
        let shared = SharedConfig::new(ClientConfig::default());
        assert!(!shared.reload().unwrap().any());
    }
}
