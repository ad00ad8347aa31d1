//! Running totals for one UTC day and the fold that feeds them.

use crate::config::{ItemLists, RolloverPolicy};
use crate::models::{AdventureEvent, AggregateSnapshot, DailyRecord, Signature};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

pub const GOLD_COINS: &str = "Gold Coins";

/// Skills whose experience is totalled; other entries are ignored.
pub const SKILLS: [&str; 4] = ["Fishing", "Mining", "Scavenging", "Woodcutting"];

#[derive(Serialize)]
struct CanonicalEvent<'a> {
    items: Vec<(&'a str, u64, bool)>,
    name: &'a str,
}

/// Fingerprint of an adventure that ignores the order of its items.
pub fn signature_of(event: &AdventureEvent) -> Signature {
    let mut items: Vec<(&str, u64, bool)> = event
        .items
        .iter()
        .map(|item| (item.name.as_str(), item.amount, item.is_blockchain))
        .collect();
    items.sort();

    let canonical = CanonicalEvent {
        items,
        name: event.name(),
    };
    // Only strings, integers and booleans: encoding cannot fail.
    let encoded = serde_json::to_vec(&canonical).unwrap_or_default();
    Signature(hex::encode(Sha256::digest(&encoded)))
}

#[derive(Debug, Clone)]
pub struct AggregateState {
    pub date: NaiveDate,
    pub started_at: DateTime<Utc>,
    pub totals: DailyRecord,
    pub market_values: BTreeMap<String, f64>,
    /// Set when loaded from a record that already carries a signature; the
    /// next event offered is adopted without being folded.
    resuming: bool,
}

impl AggregateState {
    pub fn new(date: NaiveDate, started_at: DateTime<Utc>) -> Self {
        Self {
            date,
            started_at,
            totals: DailyRecord::default(),
            market_values: BTreeMap::new(),
            resuming: false,
        }
    }

    pub fn from_record(date: NaiveDate, started_at: DateTime<Utc>, record: DailyRecord) -> Self {
        Self {
            date,
            started_at,
            resuming: record.last_signature.is_some(),
            totals: record,
            market_values: BTreeMap::new(),
        }
    }

    pub fn is_resuming(&self) -> bool {
        self.resuming
    }

    /// Folds `event` unless it is the one already accounted for.
    pub fn fold_if_new(&mut self, event: &AdventureEvent, lists: &ItemLists) -> bool {
        let signature = signature_of(event);
        if self.resuming {
            self.resuming = false;
            self.totals.last_signature = Some(signature);
            return false;
        }
        if self.totals.last_signature.as_ref() == Some(&signature) {
            return false;
        }

        self.fold(event, lists);
        self.totals.last_signature = Some(signature);
        true
    }

    pub fn fold(&mut self, event: &AdventureEvent, lists: &ItemLists) {
        let totals = &mut self.totals;
        totals.runs = totals.runs.saturating_add(1);
        add_to(&mut totals.adventure_counts, event.name(), 1);
        totals.total_character_xp = totals.total_character_xp.saturating_add(event.experience_amount);

        for entry in &event.experience {
            if SKILLS.contains(&entry.skill.as_str()) {
                add_to(&mut totals.skill_xp_totals, &entry.skill, entry.amount);
            }
        }

        let mut estimated_gold = 0.0;
        for item in &event.items {
            if item.name == GOLD_COINS {
                totals.gold_coins_total = totals.gold_coins_total.saturating_add(item.amount);
                estimated_gold += item.amount as f64;
            }

            if item.is_blockchain {
                add_to(&mut totals.blockchain_totals, &item.name, item.amount);
                if item.market_value != 0.0 {
                    self.market_values.insert(item.name.clone(), item.market_value);
                    totals.market_value_total += (item.market_value / 100.0) * item.amount as f64;
                }
            } else {
                if lists.is_tracked(&item.name) {
                    add_to(&mut totals.non_blockchain_totals, &item.name, item.amount);
                }
                if !lists.is_excluded(&item.name) {
                    estimated_gold += item.amount as f64 * item.market_value;
                }
            }
        }
        totals.total_estimated_gold += estimated_gold;
    }

    /// Zeroes every accumulator for `today`, carrying the player name and,
    /// under [`RolloverPolicy::KeepSignature`], the last-seen signature.
    pub fn reset(&mut self, today: NaiveDate, now: DateTime<Utc>, policy: RolloverPolicy) {
        let player_name = std::mem::take(&mut self.totals.player_name);
        let last_signature = match policy {
            RolloverPolicy::KeepSignature => self.totals.last_signature.take(),
            RolloverPolicy::ClearSignature => None,
        };
        self.resuming = false;
        self.totals = DailyRecord {
            player_name,
            last_signature,
            ..DailyRecord::default()
        };
        self.market_values.clear();
        self.date = today;
        self.started_at = now;
    }

    pub fn rollover_if_new_day(&mut self, today: NaiveDate, now: DateTime<Utc>, policy: RolloverPolicy) -> bool {
        if today == self.date {
            return false;
        }
        self.reset(today, now, policy);
        true
    }

    pub fn snapshot(&self, lists: &ItemLists, now: DateTime<Utc>) -> AggregateSnapshot {
        let totals = &self.totals;
        AggregateSnapshot {
            date: self.date,
            started_at: self.started_at,
            elapsed_secs: (now - self.started_at).num_seconds().max(0),
            player_name: totals.player_name.clone(),
            runs: totals.runs,
            gold_coins_total: totals.gold_coins_total,
            total_estimated_gold: totals.total_estimated_gold,
            market_value_total: totals.market_value_total,
            total_character_xp: totals.total_character_xp,
            skill_xp_totals: totals.skill_xp_totals.clone(),
            adventure_counts: totals.adventure_counts.clone(),
            blockchain_totals: totals.blockchain_totals.clone(),
            non_blockchain_totals: totals
                .non_blockchain_totals
                .iter()
                .filter(|(name, _)| lists.is_tracked(name))
                .map(|(name, amount)| (name.clone(), *amount))
                .collect(),
            market_values: self.market_values.clone(),
            tracked_items: lists.tracked.clone(),
        }
    }
}

fn add_to(totals: &mut BTreeMap<String, u64>, key: &str, amount: u64) {
    let total = totals.entry(key.to_string()).or_default();
    *total = total.saturating_add(amount);
}
