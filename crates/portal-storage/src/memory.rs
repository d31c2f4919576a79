use crate::error::{Result, StorageError};
use async_trait::async_trait;
use parking_lot::RwLock;
use portal_core::{DeleteRequest, ReadRepository, Repository, ShortCode, UrlRecord, UserId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

#[derive(Debug, Default)]
struct State {
    records: HashMap<ShortCode, UrlRecord>,
    /// Original URL of every active record, pointing at its code.
    active_urls: HashMap<String, ShortCode>,
    /// Bumped on every change, so snapshot writers can skip clean states.
    revision: u64,
}

impl State {
    fn check_new(&self, record: &UrlRecord) -> Result<()> {
        if self.records.contains_key(&record.short_code) {
            return Err(StorageError::AlreadyExists(record.short_code.to_string()));
        }
        self.check_url(record)
    }

    fn check_url(&self, record: &UrlRecord) -> Result<()> {
        if record.deleted {
            return Ok(());
        }
        match self.active_urls.get(&record.original_url) {
            Some(existing) if existing != &record.short_code => Err(StorageError::Conflict {
                existing: existing.clone(),
            }),
            _ => Ok(()),
        }
    }

    fn put(&mut self, record: UrlRecord) {
        if let Some(previous) = self.records.get(&record.short_code) {
            if !previous.deleted {
                self.active_urls.remove(&previous.original_url);
            }
        }
        if !record.deleted {
            self.active_urls
                .insert(record.original_url.clone(), record.short_code.clone());
        }
        self.records.insert(record.short_code.clone(), record);
        self.revision += 1;
    }
}

/// In-memory implementation of the [`Repository`] contract.
///
/// One lock guards both the record map and the original-URL index so the
/// uniqueness checks and the insert happen atomically. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<RwLock<State>>,
}

impl InMemoryRepository {
    /// Creates a new in-memory repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a repository from previously persisted records.
    ///
    /// Duplicate codes or duplicate active URLs are reported as
    /// [`StorageError::InvalidData`].
    pub fn from_records(records: impl IntoIterator<Item = UrlRecord>) -> Result<Self> {
        let mut state = State::default();
        for record in records {
            state
                .check_new(&record)
                .map_err(|e| StorageError::InvalidData(e.to_string()))?;
            state.put(record);
        }
        state.revision = 0;

        Ok(Self {
            state: Arc::new(RwLock::new(state)),
        })
    }

    /// Returns the current revision and every record, sorted by code.
    pub(crate) fn snapshot(&self) -> (u64, Vec<UrlRecord>) {
        let state = self.state.read();
        let mut records: Vec<UrlRecord> = state.records.values().cloned().collect();
        records.sort_by(|a, b| a.short_code.cmp(&b.short_code));
        (state.revision, records)
    }

    pub fn len(&self) -> usize {
        self.state.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ReadRepository for InMemoryRepository {
    async fn get(&self, code: &ShortCode) -> Result<UrlRecord> {
        let state = self.state.read();

        match state.records.get(code) {
            Some(record) if record.deleted => Err(StorageError::Deleted(code.to_string())),
            Some(record) => Ok(record.clone()),
            None => Err(StorageError::NotFound(code.to_string())),
        }
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn store(&self, record: UrlRecord, overwrite: bool) -> Result<()> {
        let mut state = self.state.write();

        let Some(current) = state.records.get(&record.short_code) else {
            state.check_url(&record)?;
            state.put(record);
            return Ok(());
        };

        if !overwrite {
            return Err(StorageError::AlreadyExists(record.short_code.to_string()));
        }
        if current == &record {
            return Ok(());
        }
        if current.deleted {
            return Err(StorageError::Deleted(record.short_code.to_string()));
        }

        state.check_url(&record)?;
        state.put(record);
        Ok(())
    }

    async fn store_batch(&self, records: Vec<UrlRecord>) -> Result<()> {
        let mut state = self.state.write();

        {
            let mut codes = HashSet::with_capacity(records.len());
            let mut urls = HashSet::with_capacity(records.len());
            for record in &records {
                let duplicate_in_batch = !codes.insert(&record.short_code)
                    || (!record.deleted && !urls.insert(record.original_url.as_str()));
                if duplicate_in_batch || state.check_new(record).is_err() {
                    return Err(StorageError::AlreadyExists(record.short_code.to_string()));
                }
            }
        }

        for record in records {
            state.put(record);
        }
        Ok(())
    }

    async fn list_user_urls(&self, owner: &UserId) -> Result<Vec<UrlRecord>> {
        let state = self.state.read();

        let mut records: Vec<UrlRecord> = state
            .records
            .values()
            .filter(|record| !record.deleted && &record.owner == owner)
            .cloned()
            .collect();

        if records.is_empty() {
            return Err(StorageError::NotFound(owner.to_string()));
        }
        records.sort_by(|a, b| a.short_code.cmp(&b.short_code));
        Ok(records)
    }

    async fn delete_user_urls(&self, requests: &[DeleteRequest]) -> Result<u64> {
        let mut state = self.state.write();
        let mut affected = 0;

        for request in requests {
            let Some(record) = state.records.get_mut(&request.short_code) else {
                continue;
            };
            if record.deleted || record.owner != request.owner {
                continue;
            }
            record.deleted = true;
            let url = record.original_url.clone();
            state.active_urls.remove(&url);
            affected += 1;
        }

        if affected > 0 {
            state.revision += 1;
        }
        Ok(affected)
    }
}
