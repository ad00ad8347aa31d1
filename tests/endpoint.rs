use axum::{http::StatusCode, routing::get, Router};
use relic_tracker::client::{EndpointClient, PlayerSource};
use relic_tracker::errors::TrackerError;
use std::time::Duration;

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/Player")
}

fn client(url: &str) -> EndpointClient {
    EndpointClient::new(url, Duration::from_millis(500)).unwrap()
}

#[tokio::test]
async fn fetch_parses_player_snapshot() {
    let url = serve(Router::new().route(
        "/Player",
        get(|| async {
            r#"{"PlayerName": "Capo", "LastAdventure": {"AdventureName": "Cave Run", "Items": [{"Name": "Gold Coins", "Amount": 5}]}}"#
        }),
    ))
    .await;

    let snapshot = client(&url).fetch().await.unwrap();
    assert_eq!(snapshot.player_name.as_deref(), Some("Capo"));
    let adventure = snapshot.last_adventure.unwrap();
    assert_eq!(adventure.name(), "Cave Run");
    assert_eq!(adventure.items[0].amount, 5);
}

#[tokio::test]
async fn error_status_is_a_protocol_error() {
    let url = serve(Router::new().route(
        "/Player",
        get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "loading") }),
    ))
    .await;

    let err = client(&url).fetch().await.unwrap_err();
    assert!(matches!(err, TrackerError::Protocol(ref msg) if msg.contains("503")));
}

#[tokio::test]
async fn malformed_body_is_a_protocol_error() {
    let url = serve(Router::new().route("/Player", get(|| async { "<html>not json</html>" }))).await;

    let err = client(&url).fetch().await.unwrap_err();
    assert!(matches!(err, TrackerError::Protocol(ref msg) if msg.contains("malformed")));
}

#[tokio::test]
async fn refused_connection_is_a_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let err = client(&format!("http://127.0.0.1:{port}/Player"))
        .fetch()
        .await
        .unwrap_err();
    assert!(matches!(err, TrackerError::Transport(_)));
}

#[tokio::test]
async fn slow_endpoint_times_out_as_transport_error() {
    let url = serve(Router::new().route(
        "/Player",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            "{}"
        }),
    ))
    .await;

    let started = std::time::Instant::now();
    let err = client(&url).fetch().await.unwrap_err();
    assert!(matches!(err, TrackerError::Transport(ref source) if source.is_timeout()));
    assert!(started.elapsed() < Duration::from_secs(3));
}
