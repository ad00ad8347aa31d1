use crate::errors::TrackerError;
use crate::storage::write_atomic;
use std::{env, path::Path, path::PathBuf, str::FromStr, time::Duration};
use tokio::fs;
use tracing::{info, warn};

pub const TRACKED_ITEMS_FILE: &str = "non_blockchain_config.json";
pub const EXCLUDED_ITEMS_FILE: &str = "non_blockchain_exclude.json";
pub const SETTINGS_FILE: &str = "settings.json";

pub const DEFAULT_TRACKED_ITEMS: [&str; 3] = ["Deepsea Coffer", "Golden Grind Chest", "Frostfall Shard"];
pub const DEFAULT_EXCLUDED_ITEMS: [&str; 1] = ["Deepsea Coffer"];

const DEFAULT_API_URL: &str = "http://localhost:11990/Player";

/// What happens to the last-seen adventure signature when the UTC date advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RolloverPolicy {
    /// The adventure that is still current at midnight is not counted again.
    #[default]
    KeepSignature,
    ClearSignature,
}

impl FromStr for RolloverPolicy {
    type Err = TrackerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "keep" => Ok(Self::KeepSignature),
            "clear" => Ok(Self::ClearSignature),
            other => Err(TrackerError::Config(format!(
                "TRACKER_ROLLOVER_SIGNATURE must be 'keep' or 'clear', got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub api_url: String,
    pub data_dir: PathBuf,
    pub config_dir: PathBuf,
    pub port: u16,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub shutdown_grace: Duration,
    pub rollover: RolloverPolicy,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            data_dir: PathBuf::from("run_logs"),
            config_dir: PathBuf::from("."),
            port: 11991,
            poll_interval: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
            shutdown_grace: Duration::from_millis(2500),
            rollover: RolloverPolicy::default(),
        }
    }
}

impl TrackerConfig {
    pub fn from_env() -> Result<Self, TrackerError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, TrackerError> {
        let defaults = Self::default();
        Ok(Self {
            api_url: lookup("API_URL").unwrap_or(defaults.api_url),
            data_dir: lookup("TRACKER_DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
            config_dir: lookup("TRACKER_CONFIG_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.config_dir),
            port: parse_var(&lookup, "PORT")?.unwrap_or(defaults.port),
            poll_interval: parse_var(&lookup, "POLL_INTERVAL_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.poll_interval),
            request_timeout: parse_var(&lookup, "REQUEST_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            shutdown_grace: parse_var(&lookup, "SHUTDOWN_GRACE_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.shutdown_grace),
            rollover: parse_var(&lookup, "TRACKER_ROLLOVER_SIGNATURE")?.unwrap_or(defaults.rollover),
        })
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>, TrackerError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|err| TrackerError::Config(format!("{key}={raw}: {err}"))),
    }
}

/// Tracked and excluded non-blockchain item names, fixed for the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemLists {
    pub tracked: Vec<String>,
    pub excluded: Vec<String>,
}

impl Default for ItemLists {
    fn default() -> Self {
        Self {
            tracked: DEFAULT_TRACKED_ITEMS.iter().map(|s| s.to_string()).collect(),
            excluded: DEFAULT_EXCLUDED_ITEMS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ItemLists {
    pub fn new(tracked: &[&str], excluded: &[&str]) -> Self {
        Self {
            tracked: tracked.iter().map(|s| s.to_string()).collect(),
            excluded: excluded.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub async fn load(dir: &Path) -> Self {
        let defaults = Self::default();
        Self {
            tracked: load_list(&dir.join(TRACKED_ITEMS_FILE), defaults.tracked).await,
            excluded: load_list(&dir.join(EXCLUDED_ITEMS_FILE), defaults.excluded).await,
        }
    }

    pub fn is_tracked(&self, name: &str) -> bool {
        self.tracked.iter().any(|item| item == name)
    }

    pub fn is_excluded(&self, name: &str) -> bool {
        self.excluded.iter().any(|item| item == name)
    }
}

async fn load_list(path: &Path, defaults: Vec<String>) -> Vec<String> {
    match fs::read(path).await {
        Ok(bytes) => match serde_json::from_slice::<Vec<String>>(&bytes) {
            Ok(list) => list,
            Err(err) => {
                warn!("ignoring unreadable item list {}: {err}", path.display());
                defaults
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            match serde_json::to_vec_pretty(&defaults) {
                Ok(payload) => match write_atomic(path, &payload).await {
                    Ok(()) => info!("created default item list {}", path.display()),
                    Err(err) => warn!("{err}"),
                },
                Err(err) => warn!("failed to encode default item list: {err}"),
            }
            defaults
        }
        Err(err) => {
            warn!("failed to read item list {}: {err}", path.display());
            defaults
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn config_defaults_when_env_is_empty() {
        let config = TrackerConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.rollover, RolloverPolicy::KeepSignature);
    }

    #[test]
    fn config_reads_overrides_and_rejects_garbage() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("PORT", "9000"),
            ("POLL_INTERVAL_SECS", "1"),
            ("TRACKER_ROLLOVER_SIGNATURE", "clear"),
        ]);
        let config = TrackerConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.rollover, RolloverPolicy::ClearSignature);

        let err = TrackerConfig::from_lookup(|key| (key == "PORT").then(|| "http".to_string())).unwrap_err();
        assert!(matches!(err, TrackerError::Config(_)));
    }

    #[tokio::test]
    async fn missing_lists_are_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let lists = ItemLists::load(dir.path()).await;
        assert_eq!(lists, ItemLists::default());

        let written: Vec<String> =
            serde_json::from_slice(&std::fs::read(dir.path().join(TRACKED_ITEMS_FILE)).unwrap()).unwrap();
        assert_eq!(written, lists.tracked);
        assert!(dir.path().join(EXCLUDED_ITEMS_FILE).exists());
    }

    #[tokio::test]
    async fn existing_lists_are_used_and_corrupt_ones_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(TRACKED_ITEMS_FILE), r#"["Iron Ore"]"#).unwrap();
        std::fs::write(dir.path().join(EXCLUDED_ITEMS_FILE), "not json").unwrap();

        let lists = ItemLists::load(dir.path()).await;
        assert!(lists.is_tracked("Iron Ore"));
        assert!(!lists.is_tracked("Deepsea Coffer"));
        assert!(lists.is_excluded("Deepsea Coffer"));
        assert_eq!(
            std::fs::read_to_string(dir.path().join(EXCLUDED_ITEMS_FILE)).unwrap(),
            "not json"
        );
    }
}
