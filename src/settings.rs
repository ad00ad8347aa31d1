use crate::errors::TrackerError;
use crate::storage::write_atomic;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::PathBuf, sync::Arc};
use tokio::{fs, sync::Mutex};
use tracing::warn;

const TOTALS: [&str; 4] = ["runs", "gold", "estimated_gold", "enj"];
const SECTIONS: [&str; 4] = ["adventures", "experience", "blockchain", "non_blockchain"];

/// Display preferences owned by the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    pub window_width: u32,
    pub window_height: u32,
    pub dark_mode: bool,
    pub show_totals: BTreeMap<String, bool>,
    pub show_sections: BTreeMap<String, bool>,
    pub currency: String,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            window_width: 350,
            window_height: 600,
            dark_mode: true,
            show_totals: TOTALS.iter().map(|key| (key.to_string(), true)).collect(),
            show_sections: SECTIONS.iter().map(|key| (key.to_string(), true)).collect(),
            currency: "usd".to_string(),
        }
    }
}

impl DisplaySettings {
    /// Flips `dark_mode`, `totals.<key>` or `sections.<key>` and returns the new value.
    pub fn toggle(&mut self, name: &str) -> Result<bool, TrackerError> {
        let flag = match name.split_once('.') {
            None if name == "dark_mode" => &mut self.dark_mode,
            Some(("totals", key)) if TOTALS.contains(&key) => {
                self.show_totals.entry(key.to_string()).or_insert(true)
            }
            Some(("sections", key)) if SECTIONS.contains(&key) => {
                self.show_sections.entry(key.to_string()).or_insert(true)
            }
            _ => return Err(TrackerError::Config(format!("unknown setting '{name}'"))),
        };
        *flag = !*flag;
        Ok(*flag)
    }
}

#[derive(Clone)]
pub struct SettingsStore {
    path: PathBuf,
    settings: Arc<Mutex<DisplaySettings>>,
}

impl SettingsStore {
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let settings = match fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|err| {
                warn!("ignoring unreadable settings {}: {err}", path.display());
                DisplaySettings::default()
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => DisplaySettings::default(),
            Err(err) => {
                warn!("failed to read settings {}: {err}", path.display());
                DisplaySettings::default()
            }
        };
        Self {
            path,
            settings: Arc::new(Mutex::new(settings)),
        }
    }

    pub async fn current(&self) -> DisplaySettings {
        self.settings.lock().await.clone()
    }

    pub async fn toggle(&self, name: &str) -> Result<bool, TrackerError> {
        let mut settings = self.settings.lock().await;
        let mut updated = settings.clone();
        let enabled = updated.toggle(name)?;
        let payload = serde_json::to_vec_pretty(&updated)
            .map_err(|err| TrackerError::persistence("encode", &self.path, err.into()))?;
        write_atomic(&self.path, &payload).await?;
        *settings = updated;
        Ok(enabled)
    }
}
