use crate::errors::TrackerError;
use crate::models::{DailyAverages, DailyRecord, RangeSummary, RangeTotals};
use crate::storage::RecordStore;
use chrono::NaiveDate;
use std::collections::BTreeMap;

pub async fn summarize_range(
    records: &RecordStore,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<RangeSummary, TrackerError> {
    let days = records.load_range(start, end).await?;
    Ok(build_summary(start, end, &days))
}

pub fn build_summary(start: NaiveDate, end: NaiveDate, days: &BTreeMap<NaiveDate, DailyRecord>) -> RangeSummary {
    let mut totals = RangeTotals::default();
    let mut days_recorded = 0u32;

    for (_, record) in days.range(start..=end.max(start)) {
        days_recorded += 1;
        totals.runs = totals.runs.saturating_add(record.runs);
        totals.gold_coins = totals.gold_coins.saturating_add(record.gold_coins_total);
        totals.estimated_gold += record.total_estimated_gold;
        totals.market_value += record.market_value_total;
        totals.character_xp = totals.character_xp.saturating_add(record.total_character_xp);
        add_counts(&mut totals.skill_xp, &record.skill_xp_totals);
        add_counts(&mut totals.adventure_counts, &record.adventure_counts);
        add_counts(&mut totals.blockchain_totals, &record.blockchain_totals);
        add_counts(&mut totals.non_blockchain_totals, &record.non_blockchain_totals);
    }

    let elapsed_days = ((end - start).num_days() + 1).max(1) as u32;
    let denom = f64::from(elapsed_days);

    let daily_averages = DailyAverages {
        runs: totals.runs as f64 / denom,
        estimated_gold: totals.estimated_gold / denom,
        market_value: totals.market_value / denom,
        character_xp: totals.character_xp as f64 / denom,
        skill_xp: totals
            .skill_xp
            .iter()
            .map(|(skill, xp)| (skill.clone(), *xp as f64 / denom))
            .collect(),
    };

    RangeSummary {
        start,
        end,
        elapsed_days,
        days_recorded,
        totals,
        daily_averages,
    }
}

fn add_counts(into: &mut BTreeMap<String, u64>, from: &BTreeMap<String, u64>) {
    for (key, value) in from {
        let entry = into.entry(key.clone()).or_default();
        *entry = entry.saturating_add(*value);
    }
}
