use crate::diagnostics::DiagnosticLog;
use crate::errors::TrackerError;
use crate::models::DailyRecord;
use chrono::NaiveDate;
use std::{
    collections::BTreeMap,
    ffi::OsString,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{fs, io::AsyncWriteExt, sync::Mutex};
use tracing::{error, info};

const RECORD_PREFIX: &str = "runs_";
const RECORD_SUFFIX: &str = ".json";

/// Date-partitioned daily records under one directory.
#[derive(Clone)]
pub struct RecordStore {
    dir: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl RecordStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("{RECORD_PREFIX}{}{RECORD_SUFFIX}", date.format("%Y-%m-%d")))
    }

    /// Serializes writers so two saves never share the temporary file.
    pub async fn save(&self, date: NaiveDate, record: &DailyRecord) -> Result<(), TrackerError> {
        let _guard = self.write_lock.lock().await;
        self.save_locked(date, record).await
    }

    pub(crate) async fn lock_writes(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.write_lock.lock().await
    }

    pub(crate) async fn save_locked(&self, date: NaiveDate, record: &DailyRecord) -> Result<(), TrackerError> {
        let path = self.path_for(date);
        let payload = serde_json::to_vec_pretty(record)
            .map_err(|err| TrackerError::persistence("encode", &path, err.into()))?;
        write_atomic(&path, &payload).await
    }

    /// Loads the record for `date`, falling back to a leftover temporary file
    /// from an interrupted save. `None` means start from zeroed totals.
    pub async fn load(&self, date: NaiveDate, diagnostics: &DiagnosticLog) -> Option<DailyRecord> {
        let path = self.path_for(date);
        match read_record(&path).await {
            Ok(record) => return Some(record),
            Err(ReadFailure::Missing) => {}
            Err(ReadFailure::Failed(err)) => {
                error!("{err}");
                diagnostics
                    .record(format!("Corrupted or missing log file {}: {err}", path.display()))
                    .await;
            }
        }

        let tmp = temp_path(&path);
        match read_record(&tmp).await {
            Ok(record) => {
                match fs::rename(&tmp, &path).await {
                    Ok(()) => info!("recovered daily record from {}", tmp.display()),
                    Err(err) => error!("failed to promote {}: {err}", tmp.display()),
                }
                Some(record)
            }
            Err(ReadFailure::Missing) => None,
            Err(ReadFailure::Failed(err)) => {
                error!("{err}");
                None
            }
        }
    }

    /// All record files dated within `[start, end]`; an unreadable one fails the call.
    pub async fn load_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BTreeMap<NaiveDate, DailyRecord>, TrackerError> {
        let mut records = BTreeMap::new();
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(records),
            Err(err) => return Err(TrackerError::persistence("list", &self.dir, err)),
        };

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|err| TrackerError::persistence("list", &self.dir, err))?
        {
            let Some(date) = record_date(entry.file_name()) else {
                continue;
            };
            if date < start || date > end {
                continue;
            }
            let record = read_record(&entry.path()).await.map_err(|failure| match failure {
                ReadFailure::Missing => TrackerError::corruption(entry.path(), "file vanished"),
                ReadFailure::Failed(err) => err,
            })?;
            records.insert(date, record);
        }

        Ok(records)
    }
}

enum ReadFailure {
    Missing,
    Failed(TrackerError),
}

async fn read_record(path: &Path) -> Result<DailyRecord, ReadFailure> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Err(ReadFailure::Missing),
        Err(err) => return Err(ReadFailure::Failed(TrackerError::persistence("read", path, err))),
    };
    serde_json::from_slice(&bytes).map_err(|err| ReadFailure::Failed(TrackerError::corruption(path, err)))
}

fn record_date(file_name: OsString) -> Option<NaiveDate> {
    let name = file_name.into_string().ok()?;
    let stem = name.strip_prefix(RECORD_PREFIX)?.strip_suffix(RECORD_SUFFIX)?;
    NaiveDate::parse_from_str(stem, "%Y-%m-%d").ok()
}

pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Writes `payload` next to `path`, syncs it, then renames it into place.
pub async fn write_atomic(path: &Path, payload: &[u8]) -> Result<(), TrackerError> {
    let tmp = write_temp(path, payload).await?;
    promote(&tmp, path).await
}

pub(crate) async fn write_temp(path: &Path, payload: &[u8]) -> Result<PathBuf, TrackerError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|err| TrackerError::persistence("create directory", parent, err))?;
    }

    let tmp = temp_path(path);
    let mut file = fs::File::create(&tmp)
        .await
        .map_err(|err| TrackerError::persistence("create", &tmp, err))?;
    file.write_all(payload)
        .await
        .map_err(|err| TrackerError::persistence("write", &tmp, err))?;
    file.flush()
        .await
        .map_err(|err| TrackerError::persistence("flush", &tmp, err))?;
    file.sync_all()
        .await
        .map_err(|err| TrackerError::persistence("sync", &tmp, err))?;
    Ok(tmp)
}

pub(crate) async fn promote(tmp: &Path, path: &Path) -> Result<(), TrackerError> {
    fs::rename(tmp, path)
        .await
        .map_err(|err| TrackerError::persistence("rename", tmp, err))
}
