use crate::client::PlayerSource;
use crate::diagnostics::DiagnosticLog;
use crate::errors::TrackerError;
use crate::store::AggregateStore;
use chrono::{NaiveDate, Utc};
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    NoAdventure,
    AlreadyCounted,
    Folded,
}

pub struct Poller<S> {
    source: S,
    store: AggregateStore,
    diagnostics: DiagnosticLog,
    interval: Duration,
}

impl<S: PlayerSource> Poller<S> {
    pub fn new(source: S, store: AggregateStore, diagnostics: DiagnosticLog, interval: Duration) -> Self {
        Self {
            source,
            store,
            diagnostics,
            interval,
        }
    }

    pub async fn poll_once(&self) -> Result<PollOutcome, TrackerError> {
        self.poll_once_at(Utc::now().date_naive()).await
    }

    /// One iteration: roll the day over if needed, fetch, fold, persist.
    pub async fn poll_once_at(&self, today: NaiveDate) -> Result<PollOutcome, TrackerError> {
        if self.store.rollover_if_new_day(today).await {
            info!("new UTC day {today}, totals reset");
            self.store.save().await?;
        }

        let snapshot = self.source.fetch().await?;
        if let Some(name) = snapshot.player_name.as_deref().filter(|name| !name.is_empty()) {
            self.store.set_player_name(name).await;
        }

        let Some(event) = snapshot.last_adventure.filter(|event| event.is_named()) else {
            return Ok(PollOutcome::NoAdventure);
        };
        if !self.store.fold_if_new(&event).await {
            return Ok(PollOutcome::AlreadyCounted);
        }

        info!(adventure = event.name(), items = event.items.len(), "adventure folded");
        self.store.save().await?;
        Ok(PollOutcome::Folded)
    }

    /// Polls until `shutdown` turns true or its sender goes away. Iteration
    /// failures go to the diagnostic log and never end the loop.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(interval_ms = self.interval.as_millis() as u64, "poller started");
        while !*shutdown.borrow() {
            if let Err(err) = self.poll_once().await {
                self.diagnostics.record(format!("Polling error: {err}")).await;
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
        info!("poller stopped");
    }
}
