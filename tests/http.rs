use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use relic_tracker::models::{AggregateSnapshot, DailyRecord, RangeSummary, ToggleResponse};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::net::TcpListener;
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::time::sleep;

type Payload = Arc<Mutex<Value>>;

struct TestServer {
    base_url: String,
    child: Child,
    data_dir: TempDir,
    _config_dir: TempDir,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[cfg(unix)]
mod cleanup {
    use std::sync::Mutex;
    use std::sync::Once;

    static REGISTER: Once = Once::new();
    static PIDS: Mutex<Vec<i32>> = Mutex::new(Vec::new());

    pub fn register(pid: u32) {
        if let Ok(mut pids) = PIDS.lock() {
            pids.push(pid as i32);
        }
        REGISTER.call_once(|| unsafe {
            libc::atexit(on_exit);
        });
    }

    extern "C" fn on_exit() {
        if let Ok(pids) = PIDS.lock() {
            for pid in pids.iter().copied().filter(|pid| *pid > 0) {
                unsafe {
                    libc::kill(pid, libc::SIGTERM);
                }
            }
        }
    }
}

fn pick_free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind random port");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

fn adventure(name: &str, gold: u64) -> Value {
    json!({
        "PlayerName": "Capo",
        "LastAdventure": {
            "AdventureName": name,
            "ExperienceAmount": 120,
            "Experience": [{"Type": "Mining", "Amount": 40}],
            "Items": [
                {"Name": "Gold Coins", "Amount": gold, "MarketValue": 0, "IsBlockchain": false},
                {"Name": "Iron Ore", "Amount": 3, "MarketValue": 200, "IsBlockchain": false},
                {"Name": "Rare Gem", "Amount": 2, "MarketValue": 150, "IsBlockchain": true}
            ]
        }
    })
}

async fn player(State(payload): State<Payload>) -> Json<Value> {
    Json(payload.lock().unwrap().clone())
}

async fn spawn_upstream(initial: Value) -> (String, Payload) {
    let payload: Payload = Arc::new(Mutex::new(initial));
    let app = Router::new()
        .route("/Player", get(player))
        .with_state(payload.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/Player"), payload)
}

async fn wait_until_ready(base_url: &str) {
    let client = Client::new();
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        if let Ok(resp) = client.get(format!("{base_url}/api/snapshot")).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        if Instant::now() > deadline {
            panic!("tracker did not become ready");
        }
        sleep(Duration::from_millis(100)).await;
    }
}

async fn spawn_tracker(api_url: &str) -> TestServer {
    let port = pick_free_port();
    let data_dir = tempfile::tempdir().unwrap();
    let config_dir = tempfile::tempdir().unwrap();
    std::fs::write(config_dir.path().join("non_blockchain_config.json"), r#"["Iron Ore"]"#).unwrap();
    std::fs::write(config_dir.path().join("non_blockchain_exclude.json"), "[]").unwrap();

    let child = Command::new(env!("CARGO_BIN_EXE_relic_tracker"))
        .env("PORT", port.to_string())
        .env("API_URL", api_url)
        .env("TRACKER_DATA_DIR", data_dir.path())
        .env("TRACKER_CONFIG_DIR", config_dir.path())
        .env("POLL_INTERVAL_SECS", "1")
        .env("REQUEST_TIMEOUT_SECS", "2")
        .env("RUST_LOG", "info")
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .expect("failed to spawn tracker");

    #[cfg(unix)]
    cleanup::register(child.id());

    let base_url = format!("http://127.0.0.1:{port}");
    wait_until_ready(&base_url).await;

    TestServer {
        base_url,
        child,
        data_dir,
        _config_dir: config_dir,
    }
}

async fn snapshot(client: &Client, server: &TestServer) -> AggregateSnapshot {
    client
        .get(format!("{}/api/snapshot", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

async fn wait_for_runs(client: &Client, server: &TestServer, runs: u64) -> AggregateSnapshot {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        let current = snapshot(client, server).await;
        if current.runs == runs {
            return current;
        }
        if Instant::now() > deadline {
            panic!("expected {runs} runs, still at {}", current.runs);
        }
        sleep(Duration::from_millis(100)).await;
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn http_repeated_payload_is_counted_once() {
    let (api_url, payload) = spawn_upstream(adventure("Cave Run", 50)).await;
    let server = spawn_tracker(&api_url).await;
    let client = Client::new();

    let first = wait_for_runs(&client, &server, 1).await;
    assert_eq!(first.player_name, "Capo");
    assert_eq!(first.gold_coins_total, 50);
    assert_eq!(first.total_estimated_gold, 650.0);
    assert_eq!(first.market_value_total, 3.0);
    assert_eq!(first.non_blockchain_totals["Iron Ore"], 3);
    assert_eq!(first.skill_xp_totals["Mining"], 40);

    sleep(Duration::from_millis(2500)).await;
    assert_eq!(snapshot(&client, &server).await.runs, 1);

    *payload.lock().unwrap() = adventure("Forest Run", 20);
    let second = wait_for_runs(&client, &server, 2).await;
    assert_eq!(second.gold_coins_total, 70);
    assert_eq!(second.adventure_counts["Forest Run"], 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn http_settings_reset_and_summary() {
    let (api_url, _payload) = spawn_upstream(adventure("Cave Run", 50)).await;
    let server = spawn_tracker(&api_url).await;
    let client = Client::new();
    wait_for_runs(&client, &server, 1).await;

    let toggled: ToggleResponse = client
        .post(format!("{}/api/settings/toggle", server.base_url))
        .json(&json!({ "name": "dark_mode" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(!toggled.enabled);

    let unknown = client
        .post(format!("{}/api/settings/toggle", server.base_url))
        .json(&json!({ "name": "font_size" }))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);

    let today = Utc::now().date_naive();
    let summary: RangeSummary = client
        .get(format!("{}/api/summary?start={today}&end={today}", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(summary.totals.runs, 1);
    assert_eq!(summary.elapsed_days, 1);

    let backwards = client
        .get(format!(
            "{}/api/summary?start={today}&end={}",
            server.base_url,
            today.pred_opt().unwrap()
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(backwards.status(), StatusCode::BAD_REQUEST);

    let reset: AggregateSnapshot = client
        .post(format!("{}/api/reset", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(reset.runs, 0);
    assert_eq!(reset.player_name, "Capo");

    // The adventure still being served was already counted before the reset.
    sleep(Duration::from_millis(1500)).await;
    assert_eq!(snapshot(&client, &server).await.runs, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn http_shutdown_request_persists_and_exits() {
    let (api_url, _payload) = spawn_upstream(adventure("Cave Run", 50)).await;
    let mut server = spawn_tracker(&api_url).await;
    let client = Client::new();
    wait_for_runs(&client, &server, 1).await;

    let response = client
        .post(format!("{}/api/shutdown", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let deadline = Instant::now() + Duration::from_secs(10);
    let status = loop {
        if let Some(status) = server.child.try_wait().unwrap() {
            break status;
        }
        if Instant::now() > deadline {
            panic!("tracker did not exit after shutdown request");
        }
        sleep(Duration::from_millis(100)).await;
    };
    assert!(status.success());

    let path = server
        .data_dir
        .path()
        .join(format!("runs_{}.json", Utc::now().date_naive().format("%Y-%m-%d")));
    let record: DailyRecord = serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();
    assert_eq!(record.runs, 1);
    assert_eq!(record.player_name, "Capo");
    assert!(record.last_signature.is_some());
}
