use chrono::Utc;
use relic_tracker::{
    client::EndpointClient,
    config::SETTINGS_FILE,
    diagnostics::DiagnosticLog,
    poller::Poller,
    router,
    settings::SettingsStore,
    storage::RecordStore,
    supervisor::{os_signal, wait_for_stop, Supervisor},
    AggregateStore, AppState, ItemLists, TrackerConfig,
};
use std::{future::IntoFuture, net::SocketAddr};
use tokio::{fs, sync::watch};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let config = TrackerConfig::from_env()?;
    fs::create_dir_all(&config.data_dir).await?;
    fs::create_dir_all(&config.config_dir).await?;

    let diagnostics = DiagnosticLog::new(&config.data_dir);
    let lists = ItemLists::load(&config.config_dir).await;
    let settings = SettingsStore::load(config.config_dir.join(SETTINGS_FILE)).await;
    let store = AggregateStore::load(
        RecordStore::new(&config.data_dir),
        lists,
        config.rollover,
        &diagnostics,
        Utc::now().date_naive(),
    )
    .await;

    let client = EndpointClient::new(&config.api_url, config.request_timeout)?;
    info!("polling {} every {:?}", client.url(), config.poll_interval);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let poller = Poller::new(client, store.clone(), diagnostics.clone(), config.poll_interval);
    let worker = tokio::spawn(poller.run(shutdown_rx.clone()));

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on http://{addr}");
    let app = router(AppState::new(store.clone(), settings, shutdown_tx.clone()));
    let server = tokio::spawn(
        axum::serve(listener, app)
            .with_graceful_shutdown(wait_for_stop(shutdown_rx.clone()))
            .into_future(),
    );

    let supervisor = Supervisor::new(store, diagnostics, shutdown_tx, config.shutdown_grace);
    let outcome = supervisor.supervise(worker, os_signal()).await;

    match tokio::time::timeout(config.shutdown_grace, server).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(err))) => error!("http server failed: {err}"),
        Ok(Err(err)) => error!("http server task failed: {err}"),
        Err(_) => error!("http server did not stop within {:?}", config.shutdown_grace),
    }

    outcome?;
    info!("stopped");
    Ok(())
}
