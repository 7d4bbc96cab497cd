//! The shared game config and its on-disk document.
//!
//! One [`GameConfig`] governs every room on the server. It is created
//! lazily from defaults on first use, updated with partial
//! [`GameConfigUpdate`]s, and read far more often than it is written.
//! Concurrent updates are last-write-wins.

use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use getaway_protocol::{GameConfig, GameConfigUpdate};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Env var naming the config document.
pub const CONFIG_PATH_ENV: &str = "GETAWAY_CONFIG_PATH";

/// Used when [`CONFIG_PATH_ENV`] is unset.
pub const DEFAULT_CONFIG_PATH: &str = "config/game.json";

// ---------------------------------------------------------------------------
// ConfigStore
// ---------------------------------------------------------------------------

/// A cheaply cloneable handle to the server's game config.
///
/// The lock is only ever held for a clone or a field merge, never across
/// an `.await`.
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
    inner: Arc<RwLock<Option<Arc<GameConfig>>>>,
}

impl ConfigStore {
    /// Creates a store with no config yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `config`.
    pub fn with_config(config: GameConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Some(Arc::new(config)))),
        }
    }

    /// Loads the document at `path`.
    ///
    /// A missing file gives an empty store. An unreadable or malformed
    /// one is logged and also gives an empty store, so a bad file never
    /// keeps the server from starting.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match StoredConfig::read(path) {
            Ok(Some(stored)) => {
                tracing::info!(path = %path.display(), version = stored.version(), "loaded game config");
                Self::with_config(stored.migrate())
            }
            Ok(None) => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                Self::new()
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unusable config file");
                Self::new()
            }
        }
    }

    /// Loads from `$GETAWAY_CONFIG_PATH`, or [`DEFAULT_CONFIG_PATH`].
    pub fn from_env() -> Self {
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load(path)
    }

    /// The current config, or `None` if none was created yet.
    pub fn get(&self) -> Option<Arc<GameConfig>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The current config, created from defaults if absent.
    pub fn get_or_default(&self) -> Arc<GameConfig> {
        if let Some(config) = self.get() {
            return config;
        }
        let mut slot = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slot.get_or_insert_with(|| Arc::new(GameConfig::default())))
    }

    /// Merges `update` into the config and returns the result.
    ///
    /// Fields `update` leaves out keep their current value, or the default
    /// when the config did not exist yet.
    pub fn update(&self, update: GameConfigUpdate) -> Arc<GameConfig> {
        let mut slot = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let mut config = slot.as_deref().cloned().unwrap_or_default();
        config.apply(update);
        let config = Arc::new(config);
        *slot = Some(Arc::clone(&config));
        tracing::info!(
            max_total_players = config.max_total_players,
            stage_count = config.stage_count,
            "game config updated"
        );
        config
    }
}

// ---------------------------------------------------------------------------
// Stored document
// ---------------------------------------------------------------------------

/// The first config schema: player counts only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyConfig {
    pub min_thieves: u32,
    pub min_police: u32,
    pub min_players_to_start: u32,
    pub max_total_players: u32,
}

/// A config document as written on disk, by schema version.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredConfig {
    /// `{"version": 1, ...}`, or an untagged document with only the legacy
    /// fields.
    V1(LegacyConfig),
    /// `{"version": 2, ...}`. Every field is optional.
    V2(GameConfigUpdate),
}

const LEGACY_FIELDS: [&str; 4] = [
    "min_thieves",
    "min_police",
    "min_players_to_start",
    "max_total_players",
];

impl StoredConfig {
    /// Reads and parses `path`. `Ok(None)` when the file does not exist.
    pub fn read(path: &Path) -> Result<Option<Self>, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::parse(&text).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Parses a JSON document, dispatching on its `version` field.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut doc: serde_json::Map<String, serde_json::Value> = serde_json::from_str(text)?;
        let version = match doc.remove("version") {
            Some(v) => v
                .as_u64()
                .ok_or_else(|| ConfigError::Parse(serde::de::Error::custom("version must be an integer")))?,
            None if doc.keys().all(|k| LEGACY_FIELDS.contains(&k.as_str())) => 1,
            None => 2,
        };
        let doc = serde_json::Value::Object(doc);
        match version {
            1 => Ok(Self::V1(serde_json::from_value(doc)?)),
            2 => Ok(Self::V2(serde_json::from_value(doc)?)),
            other => Err(ConfigError::UnsupportedVersion(other)),
        }
    }

    pub fn version(&self) -> u64 {
        match self {
            Self::V1(_) => 1,
            Self::V2(_) => 2,
        }
    }

    /// Upgrades to the current schema, filling gaps from defaults.
    pub fn migrate(self) -> GameConfig {
        let update = match self {
            Self::V1(legacy) => GameConfigUpdate {
                min_thieves: Some(legacy.min_thieves),
                min_police: Some(legacy.min_police),
                min_players_to_start: Some(legacy.min_players_to_start),
                max_total_players: Some(legacy.max_total_players),
                ..GameConfigUpdate::default()
            },
            Self::V2(update) => update,
        };
        let mut config = GameConfig::default();
        config.apply(update);
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_before_creation_is_none() {
        let store = ConfigStore::new();
        assert!(store.get().is_none());
    }

    #[test]
    fn test_get_or_default_creates_once() {
        let store = ConfigStore::new();
        let first = store.get_or_default();
        assert_eq!(*first, GameConfig::default());
        let second = store.get_or_default();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(store.get().is_some());
    }

    #[test]
    fn test_update_on_empty_store_fills_defaults() {
        let store = ConfigStore::new();
        let config = store.update(GameConfigUpdate {
            min_thieves: Some(3),
            ..GameConfigUpdate::default()
        });
        assert_eq!(config.min_thieves, 3);
        assert_eq!(config.min_police, 2);
        assert_eq!(config.stage_count, 4);
    }

    #[test]
    fn test_update_keeps_unset_fields() {
        let store = ConfigStore::new();
        store.update(GameConfigUpdate {
            max_total_players: Some(10),
            ..GameConfigUpdate::default()
        });
        let config = store.update(GameConfigUpdate {
            entry_fee_minimum: Some(0.5),
            ..GameConfigUpdate::default()
        });
        assert_eq!(config.max_total_players, 10);
        assert_eq!(config.entry_fee_minimum, 0.5);
    }

    #[test]
    fn test_clones_share_state() {
        let store = ConfigStore::new();
        let other = store.clone();
        store.update(GameConfigUpdate {
            stage_count: Some(2),
            ..GameConfigUpdate::default()
        });
        assert_eq!(other.get_or_default().stage_count, 2);
    }

    #[test]
    fn test_parse_untagged_legacy_document_is_v1() {
        let stored = StoredConfig::parse(
            r#"{"min_thieves":1,"min_police":1,"min_players_to_start":2,"max_total_players":10}"#,
        )
        .unwrap();
        assert_eq!(stored.version(), 1);

        let config = stored.migrate();
        assert_eq!(config.min_thieves, 1);
        assert_eq!(config.max_total_players, 10);
        assert_eq!(config.stage_count, 4);
        assert_eq!(config.path_names.len(), 12);
    }

    #[test]
    fn test_parse_v2_document_with_sparse_fields() {
        let stored = StoredConfig::parse(
            r#"{"version":2,"stage_count":2,"stage_names":["Heist","Escape"]}"#,
        )
        .unwrap();
        let config = stored.migrate();
        assert_eq!(config.stage_count, 2);
        assert_eq!(config.stage_name(2), "Escape");
        assert_eq!(config.min_police, 2);
    }

    #[test]
    fn test_parse_untagged_full_document_is_v2() {
        let stored = StoredConfig::parse(r#"{"paths_per_stage":2}"#).unwrap();
        assert_eq!(stored.version(), 2);
    }

    #[test]
    fn test_parse_unknown_version_is_rejected() {
        let result = StoredConfig::parse(r#"{"version":9}"#);
        assert!(matches!(result, Err(ConfigError::UnsupportedVersion(9))));
    }

    #[test]
    fn test_parse_v1_missing_field_is_rejected() {
        let result = StoredConfig::parse(r#"{"version":1,"min_thieves":1}"#);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_missing_file_gives_empty_store() {
        let store = ConfigStore::load("/nonexistent/getaway/game.json");
        assert!(store.get().is_none());
    }

    #[test]
    fn test_load_reads_and_migrates_file() {
        let path = std::env::temp_dir().join(format!("getaway-config-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"version":1,"min_thieves":3,"min_police":1,"min_players_to_start":4,"max_total_players":6}"#)
            .unwrap();
        let store = ConfigStore::load(&path);
        std::fs::remove_file(&path).unwrap();

        let config = store.get().unwrap();
        assert_eq!(config.min_thieves, 3);
        assert_eq!(config.team_cap(), 3);
    }

    #[test]
    fn test_load_malformed_file_falls_back() {
        let path = std::env::temp_dir().join(format!("getaway-bad-{}.json", std::process::id()));
        std::fs::write(&path, "{ not json").unwrap();
        let store = ConfigStore::load(&path);
        std::fs::remove_file(&path).unwrap();
        assert!(store.get().is_none());
    }
}
