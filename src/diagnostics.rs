use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::{path::PathBuf, sync::Arc};
use tokio::{fs::OpenOptions, io::AsyncWriteExt, sync::Mutex};
use tracing::{error, warn};

const REPEAT_WINDOW_MINUTES: i64 = 5;

static ADDRESS: Lazy<Regex> = Lazy::new(|| Regex::new(r"0x[0-9a-fA-F]+").expect("address pattern"));

struct LastEntry {
    normalized: String,
    written_at: DateTime<Utc>,
}

/// Append-only `error_YYYY-MM-DD.txt` files that drop immediate repeats.
#[derive(Clone)]
pub struct DiagnosticLog {
    dir: PathBuf,
    last: Arc<Mutex<Option<LastEntry>>>,
}

impl DiagnosticLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            last: Arc::new(Mutex::new(None)),
        }
    }

    pub fn path_for(&self, now: DateTime<Utc>) -> PathBuf {
        self.dir.join(format!("error_{}.txt", now.format("%Y-%m-%d")))
    }

    pub async fn record(&self, message: impl AsRef<str>) -> bool {
        self.record_at(message.as_ref(), Utc::now()).await
    }

    /// Returns false when the message repeats the last written one within the window.
    pub async fn record_at(&self, message: &str, now: DateTime<Utc>) -> bool {
        let normalized = normalize(message);
        let mut last = self.last.lock().await;
        if let Some(previous) = last.as_ref() {
            if previous.normalized == normalized
                && now - previous.written_at < Duration::minutes(REPEAT_WINDOW_MINUTES)
            {
                return false;
            }
        }

        warn!("{message}");
        let line = format!("[{}] {message}\n", now.format("%Y-%m-%d %H:%M:%S"));
        let path = self.path_for(now);
        let written = async {
            tokio::fs::create_dir_all(&self.dir).await?;
            let mut file = OpenOptions::new().create(true).append(true).open(&path).await?;
            file.write_all(line.as_bytes()).await?;
            file.flush().await
        }
        .await;

        match written {
            Ok(()) => {
                *last = Some(LastEntry {
                    normalized,
                    written_at: now,
                });
                true
            }
            Err(err) => {
                error!("failed to append to {}: {err}", path.display());
                false
            }
        }
    }
}

fn normalize(message: &str) -> String {
    ADDRESS.replace_all(message.trim(), "0x?").into_owned()
}
