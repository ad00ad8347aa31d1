use crate::settings::SettingsStore;
use crate::store::AggregateStore;
use tokio::sync::watch;

#[derive(Clone)]
pub struct AppState {
    pub store: AggregateStore,
    pub settings: SettingsStore,
    pub shutdown: watch::Sender<bool>,
}

impl AppState {
    pub fn new(store: AggregateStore, settings: SettingsStore, shutdown: watch::Sender<bool>) -> Self {
        Self {
            store,
            settings,
            shutdown,
        }
    }
}
