use crate::aggregate::AggregateState;
use crate::config::{ItemLists, RolloverPolicy};
use crate::diagnostics::DiagnosticLog;
use crate::errors::TrackerError;
use crate::models::{AdventureEvent, AggregateSnapshot};
use crate::storage::RecordStore;
use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// Shared handle to the one live [`AggregateState`].
#[derive(Clone)]
pub struct AggregateStore {
    state: Arc<Mutex<AggregateState>>,
    lists: Arc<ItemLists>,
    records: RecordStore,
    rollover: RolloverPolicy,
}

impl AggregateStore {
    pub fn new(state: AggregateState, lists: ItemLists, records: RecordStore, rollover: RolloverPolicy) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
            lists: Arc::new(lists),
            records,
            rollover,
        }
    }

    /// Rebuilds the state for `today` from its daily record, or starts zeroed.
    pub async fn load(
        records: RecordStore,
        lists: ItemLists,
        rollover: RolloverPolicy,
        diagnostics: &DiagnosticLog,
        today: NaiveDate,
    ) -> Self {
        let now = Utc::now();
        let state = match records.load(today, diagnostics).await {
            Some(record) => {
                info!(runs = record.runs, "resuming daily record for {today}");
                AggregateState::from_record(today, now, record)
            }
            None => AggregateState::new(today, now),
        };
        Self::new(state, lists, records, rollover)
    }

    pub fn lists(&self) -> &ItemLists {
        &self.lists
    }

    pub fn records(&self) -> &RecordStore {
        &self.records
    }

    pub async fn fold_if_new(&self, event: &AdventureEvent) -> bool {
        let mut state = self.state.lock().await;
        state.fold_if_new(event, &self.lists)
    }

    pub async fn rollover_if_new_day(&self, today: NaiveDate) -> bool {
        let mut state = self.state.lock().await;
        state.rollover_if_new_day(today, Utc::now(), self.rollover)
    }

    pub async fn set_player_name(&self, name: &str) {
        let mut state = self.state.lock().await;
        if state.totals.player_name != name {
            state.totals.player_name = name.to_string();
        }
    }

    /// Zeroes the current day's totals without changing its date.
    pub async fn manual_reset(&self) -> Result<(), TrackerError> {
        {
            let mut state = self.state.lock().await;
            let date = state.date;
            state.reset(date, Utc::now(), RolloverPolicy::KeepSignature);
        }
        self.save().await
    }

    pub async fn snapshot(&self) -> AggregateSnapshot {
        let state = self.state.lock().await;
        state.snapshot(&self.lists, Utc::now())
    }

    /// Copies the persisted fields under the state lock, then writes them
    /// outside it. The record store's write lock keeps saves in order.
    pub async fn save(&self) -> Result<(), TrackerError> {
        let _writes = self.records.lock_writes().await;
        let (date, record) = {
            let state = self.state.lock().await;
            (state.date, state.totals.clone())
        };
        self.records.save_locked(date, &record).await
    }
}
