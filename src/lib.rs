pub mod aggregate;
pub mod app;
pub mod client;
pub mod config;
pub mod diagnostics;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod poller;
pub mod settings;
pub mod state;
pub mod stats;
pub mod storage;
pub mod store;
pub mod supervisor;

pub use app::router;
pub use config::{ItemLists, RolloverPolicy, TrackerConfig};
pub use state::AppState;
pub use store::AggregateStore;
