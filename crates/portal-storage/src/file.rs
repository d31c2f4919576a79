use crate::error::{Result, StorageError};
use crate::memory::InMemoryRepository;
use async_trait::async_trait;
use portal_core::{DeleteRequest, ReadRepository, Repository, ShortCode, UrlRecord, UserId};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

/// One line of the snapshot file.
#[derive(Debug, Serialize, Deserialize)]
struct FileLine {
    uuid: UserId,
    short_url: ShortCode,
    original_url: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    is_deleted: bool,
}

impl From<UrlRecord> for FileLine {
    fn from(record: UrlRecord) -> Self {
        Self {
            uuid: record.owner,
            short_url: record.short_code,
            original_url: record.original_url,
            is_deleted: record.deleted,
        }
    }
}

impl From<FileLine> for UrlRecord {
    fn from(line: FileLine) -> Self {
        Self {
            short_code: line.short_url,
            original_url: line.original_url,
            owner: line.uuid,
            deleted: line.is_deleted,
        }
    }
}

/// File-backed repository.
///
/// Serves every request from an [`InMemoryRepository`] and writes the whole
/// map to a JSON-lines file on [`FileRepository::persist`]. Writes that
/// happen after the last snapshot are lost if the process dies.
#[derive(Debug, Clone)]
pub struct FileRepository {
    inner: InMemoryRepository,
    path: PathBuf,
    /// Revision of the last snapshot written to disk.
    persisted: Arc<Mutex<u64>>,
}

impl FileRepository {
    /// Loads the snapshot at `path`, or starts empty if the file is missing.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let records = match tokio::fs::read_to_string(&path).await {
            Ok(content) => parse_snapshot(&content)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(err) => return Err(err.into()),
        };
        info!(path = %path.display(), records = records.len(), "Loaded URL snapshot");

        Ok(Self {
            inner: InMemoryRepository::from_records(records)?,
            path,
            persisted: Arc::new(Mutex::new(0)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the current state to disk if it changed since the last write.
    ///
    /// Returns whether a write happened.
    pub async fn persist(&self) -> Result<bool> {
        let mut persisted = self.persisted.lock().await;

        let (revision, records) = self.inner.snapshot();
        if revision == *persisted {
            return Ok(false);
        }

        let mut content = String::new();
        for record in records {
            let line = serde_json::to_string(&FileLine::from(record))
                .map_err(|e| StorageError::InvalidData(e.to_string()))?;
            content.push_str(&line);
            content.push('\n');
        }
        tokio::fs::write(&self.path, content).await?;

        *persisted = revision;
        debug!(path = %self.path.display(), revision, "Persisted URL snapshot");
        Ok(true)
    }

    /// Persists every `period` until `shutdown` resolves, then once more.
    pub async fn run_persistence(&self, period: Duration, shutdown: impl Future<Output = ()>) {
        let period = period.max(Duration::from_millis(1));
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.persist().await {
                        error!(path = %self.path.display(), error = %e, "Failed to persist URL snapshot");
                    }
                }
            }
        }

        match self.persist().await {
            Ok(_) => info!(path = %self.path.display(), "Final URL snapshot written"),
            Err(e) => error!(path = %self.path.display(), error = %e, "Failed to write final URL snapshot"),
        }
    }
}

fn parse_snapshot(content: &str) -> Result<Vec<UrlRecord>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str::<FileLine>(line)
                .map(UrlRecord::from)
                .map_err(|e| StorageError::InvalidData(format!("line {}: {e}", index + 1)))
        })
        .collect()
}

#[async_trait]
impl ReadRepository for FileRepository {
    async fn get(&self, code: &ShortCode) -> Result<UrlRecord> {
        self.inner.get(code).await
    }

    async fn ping(&self) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let metadata = tokio::fs::metadata(dir).await?;
        if !metadata.is_dir() {
            return Err(StorageError::Unavailable(format!(
                "{} is not a directory",
                dir.display()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Repository for FileRepository {
    async fn store(&self, record: UrlRecord, overwrite: bool) -> Result<()> {
        self.inner.store(record, overwrite).await
    }

    async fn store_batch(&self, records: Vec<UrlRecord>) -> Result<()> {
        self.inner.store_batch(records).await
    }

    async fn list_user_urls(&self, owner: &UserId) -> Result<Vec<UrlRecord>> {
        self.inner.list_user_urls(owner).await
    }

    async fn delete_user_urls(&self, requests: &[DeleteRequest]) -> Result<u64> {
        self.inner.delete_user_urls(requests).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(short: &str, url: &str, owner: &str) -> UrlRecord {
        UrlRecord::new(
            ShortCode::new_unchecked(short),
            url,
            UserId::new(owner).unwrap(),
        )
    }

    #[tokio::test]
    async fn missing_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let repo = FileRepository::open(dir.path().join("urls.jsonl"))
            .await
            .unwrap();

        let err = repo
            .get(&ShortCode::new_unchecked("abc"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
        assert!(!repo.persist().await.unwrap());
    }

    #[tokio::test]
    async fn snapshot_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("urls.jsonl");

        let repo = FileRepository::open(&path).await.unwrap();
        repo.store(record("keep1", "https://keep.example", "u1"), false)
            .await
            .unwrap();
        repo.store(record("gone1", "https://gone.example", "u1"), false)
            .await
            .unwrap();
        repo.delete_user_urls(&[DeleteRequest {
            short_code: ShortCode::new_unchecked("gone1"),
            owner: UserId::new("u1").unwrap(),
            enqueued_at_micros: 0,
        }])
        .await
        .unwrap();
        assert!(repo.persist().await.unwrap());

        let reopened = FileRepository::open(&path).await.unwrap();
        let kept = reopened
            .get(&ShortCode::new_unchecked("keep1"))
            .await
            .unwrap();
        assert_eq!(kept.original_url, "https://keep.example");
        let err = reopened
            .get(&ShortCode::new_unchecked("gone1"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Deleted(_)));
    }

    #[tokio::test]
    async fn file_format_is_one_json_object_per_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("urls.jsonl");

        let repo = FileRepository::open(&path).await.unwrap();
        repo.store(record("abc123", "https://example.com", "u1"), false)
            .await
            .unwrap();
        repo.persist().await.unwrap();

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 1);

        let value: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(value["uuid"], "u1");
        assert_eq!(value["short_url"], "abc123");
        assert_eq!(value["original_url"], "https://example.com");
        assert!(value.get("is_deleted").is_none());
    }

    #[tokio::test]
    async fn loads_hand_written_snapshot_and_skips_blank_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("urls.jsonl");
        tokio::fs::write(
            &path,
            concat!(
                r#"{"uuid":"u1","short_url":"a1","original_url":"https://a.example"}"#,
                "\n\n",
                r#"{"uuid":"u1","short_url":"b1","original_url":"https://b.example","is_deleted":true}"#,
                "\n",
            ),
        )
        .await
        .unwrap();

        let repo = FileRepository::open(&path).await.unwrap();
        let urls = repo
            .list_user_urls(&UserId::new("u1").unwrap())
            .await
            .unwrap();
        assert_eq!(urls.len(), 1);
        assert_eq!(urls[0].short_code.as_str(), "a1");
    }

    #[tokio::test]
    async fn malformed_line_is_invalid_data() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("urls.jsonl");
        tokio::fs::write(&path, "not json\n").await.unwrap();

        let err = FileRepository::open(&path).await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidData(_)));
    }

    #[tokio::test]
    async fn persist_skips_unchanged_state() {
        let dir = TempDir::new().unwrap();
        let repo = FileRepository::open(dir.path().join("urls.jsonl"))
            .await
            .unwrap();
        repo.store(record("abc123", "https://example.com", "u1"), false)
            .await
            .unwrap();

        assert!(repo.persist().await.unwrap());
        assert!(!repo.persist().await.unwrap());
    }

    #[tokio::test]
    async fn persistence_loop_writes_final_snapshot_on_shutdown() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("urls.jsonl");
        let repo = FileRepository::open(&path).await.unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let task = {
            let repo = repo.clone();
            tokio::spawn(async move {
                repo.run_persistence(Duration::from_secs(3600), async move {
                    let _ = rx.await;
                })
                .await
            })
        };

        repo.store(record("abc123", "https://example.com", "u1"), false)
            .await
            .unwrap();
        tx.send(()).unwrap();
        task.await.unwrap();

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(content.contains("abc123"));
    }

    #[tokio::test]
    async fn ping_checks_parent_directory() {
        let dir = TempDir::new().unwrap();
        let repo = FileRepository::open(dir.path().join("urls.jsonl"))
            .await
            .unwrap();
        assert!(repo.ping().await.is_ok());

        let missing = FileRepository::open(dir.path().join("nope").join("urls.jsonl"))
            .await
            .unwrap();
        assert!(missing.ping().await.is_err());
    }
}
