use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const UNKNOWN_ADVENTURE: &str = "Unknown";
pub const UNKNOWN_ITEM: &str = "Unknown";
pub const UNKNOWN_PLAYER: &str = "Unknown Player";

/// One poll of the upstream `/Player` resource.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlayerSnapshot {
    #[serde(default)]
    pub player_name: Option<String>,
    #[serde(default)]
    pub last_adventure: Option<AdventureEvent>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AdventureEvent {
    #[serde(default)]
    pub adventure_name: Option<String>,
    #[serde(default)]
    pub experience_amount: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub experience: Vec<ExperienceEntry>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub items: Vec<Item>,
}

impl AdventureEvent {
    pub fn name(&self) -> &str {
        self.adventure_name.as_deref().unwrap_or(UNKNOWN_ADVENTURE)
    }

    /// Payloads without an adventure name are placeholders the endpoint
    /// serves before the first adventure of a session.
    pub fn is_named(&self) -> bool {
        self.adventure_name
            .as_deref()
            .is_some_and(|name| !name.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperienceEntry {
    #[serde(rename = "Type", default)]
    pub skill: String,
    #[serde(rename = "Amount", default)]
    pub amount: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Item {
    #[serde(default = "unknown_item")]
    pub name: String,
    #[serde(default = "one")]
    pub amount: u64,
    /// Hundredths of the reference currency unit.
    #[serde(default)]
    pub market_value: f64,
    #[serde(default)]
    pub is_blockchain: bool,
}

impl Item {
    pub fn new(name: impl Into<String>, amount: u64, market_value: f64, is_blockchain: bool) -> Self {
        Self {
            name: name.into(),
            amount,
            market_value,
            is_blockchain,
        }
    }
}

fn unknown_item() -> String {
    UNKNOWN_ITEM.to_string()
}

fn one() -> u64 {
    1
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Hex-encoded SHA-256 fingerprint of an adventure.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(pub String);

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Persisted body of `runs_YYYY-MM-DD.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DailyRecord {
    pub runs: u64,
    pub blockchain_totals: BTreeMap<String, u64>,
    pub non_blockchain_totals: BTreeMap<String, u64>,
    pub adventure_counts: BTreeMap<String, u64>,
    pub total_character_xp: u64,
    pub skill_xp_totals: BTreeMap<String, u64>,
    pub player_name: String,
    #[serde(rename = "total_enj_value")]
    pub market_value_total: f64,
    pub gold_coins_total: u64,
    pub total_estimated_gold: f64,
    #[serde(rename = "last_adventure_signature")]
    pub last_signature: Option<Signature>,
}

impl Default for DailyRecord {
    fn default() -> Self {
        Self {
            runs: 0,
            blockchain_totals: BTreeMap::new(),
            non_blockchain_totals: BTreeMap::new(),
            adventure_counts: BTreeMap::new(),
            total_character_xp: 0,
            skill_xp_totals: BTreeMap::new(),
            player_name: UNKNOWN_PLAYER.to_string(),
            market_value_total: 0.0,
            gold_coins_total: 0,
            total_estimated_gold: 0.0,
            last_signature: None,
        }
    }
}

/// Read-only copy of the running totals handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateSnapshot {
    pub date: NaiveDate,
    pub started_at: DateTime<Utc>,
    pub elapsed_secs: i64,
    pub player_name: String,
    pub runs: u64,
    pub gold_coins_total: u64,
    pub total_estimated_gold: f64,
    pub market_value_total: f64,
    pub total_character_xp: u64,
    pub skill_xp_totals: BTreeMap<String, u64>,
    pub adventure_counts: BTreeMap<String, u64>,
    pub blockchain_totals: BTreeMap<String, u64>,
    pub non_blockchain_totals: BTreeMap<String, u64>,
    pub market_values: BTreeMap<String, f64>,
    pub tracked_items: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ToggleRequest {
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ToggleResponse {
    pub name: String,
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RangeTotals {
    pub runs: u64,
    pub gold_coins: u64,
    pub estimated_gold: f64,
    pub market_value: f64,
    pub character_xp: u64,
    pub skill_xp: BTreeMap<String, u64>,
    pub adventure_counts: BTreeMap<String, u64>,
    pub blockchain_totals: BTreeMap<String, u64>,
    pub non_blockchain_totals: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyAverages {
    pub runs: f64,
    pub estimated_gold: f64,
    pub market_value: f64,
    pub character_xp: f64,
    pub skill_xp: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeSummary {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub elapsed_days: u32,
    pub days_recorded: u32,
    pub totals: RangeTotals,
    pub daily_averages: DailyAverages,
}
