use async_trait::async_trait;
use jiff::Timestamp;
use portal_core::{
    DeleteRequest, ReadRepository, Repository, ShortCode, StorageError, UrlRecord, UserId,
};
use sqlx::mysql::MySqlRow;
use sqlx::{Connection, MySqlConnection, MySqlPool, Row};
use tracing::debug;

use crate::error::Result;

/// DDL for the `short_urls` table, safe to run repeatedly.
pub const SCHEMA: &str = include_str!("../ddl/mysql/short_urls.sql");

/// MySQL implementation of the repository contract.
///
/// Soft delete is implemented with `deleted_at`; deleted rows stay in the
/// table so their codes are never reused. A stored generated column holds
/// the hash of the original URL for active rows only, so the unique index
/// on it enforces one active code per URL.
#[derive(Debug, Clone)]
pub struct MySqlRepository {
    pool: MySqlPool,
}

impl MySqlRepository {
    /// Creates a repository from an existing MySQL connection pool.
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Creates a repository by opening a new MySQL connection pool.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = MySqlPool::connect(database_url)
            .await
            .map_err(map_sqlx_error)?;
        Ok(Self::new(pool))
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    /// Creates the `short_urls` table if it does not exist.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}

fn now_unix_seconds() -> i64 {
    Timestamp::now().as_second()
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation)
}

fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut => StorageError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StorageError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::RowNotFound => StorageError::InvalidData(message),
        _ => StorageError::Query(message),
    }
}

fn decode_record(row: &MySqlRow) -> Result<UrlRecord> {
    let short_code: String = row.try_get("short_code").map_err(map_sqlx_error)?;
    let original_url: String = row.try_get("original_url").map_err(map_sqlx_error)?;
    let owner_id: String = row.try_get("owner_id").map_err(map_sqlx_error)?;
    let deleted_at: Option<i64> = row.try_get("deleted_at").map_err(map_sqlx_error)?;

    Ok(UrlRecord {
        short_code: ShortCode::new(short_code)
            .map_err(|e| StorageError::InvalidData(e.to_string()))?,
        original_url,
        owner: UserId::new(owner_id).map_err(|e| StorageError::InvalidData(e.to_string()))?,
        deleted: deleted_at.is_some(),
    })
}

async fn insert(conn: &mut MySqlConnection, record: &UrlRecord, now: i64) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO short_urls (short_code, original_url, owner_id, created_at, deleted_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(record.short_code.as_str())
    .bind(record.original_url.as_str())
    .bind(record.owner.as_str())
    .bind(now)
    .bind(record.deleted.then_some(now))
    .execute(conn)
    .await?;
    Ok(())
}

async fn find_active_by_url(conn: &mut MySqlConnection, url: &str) -> Result<Option<ShortCode>> {
    let row = sqlx::query(
        r#"
        SELECT short_code
        FROM short_urls
        WHERE active_url_hash = UNHEX(SHA2(?, 256))
        "#,
    )
    .bind(url)
    .fetch_optional(conn)
    .await
    .map_err(map_sqlx_error)?;

    row.map(|row| {
        let code: String = row.try_get("short_code").map_err(map_sqlx_error)?;
        ShortCode::new(code).map_err(|e| StorageError::InvalidData(e.to_string()))
    })
    .transpose()
}

async fn code_exists(conn: &mut MySqlConnection, code: &ShortCode) -> Result<bool> {
    let exists = sqlx::query("SELECT 1 FROM short_urls WHERE short_code = ? LIMIT 1")
        .bind(code.as_str())
        .fetch_optional(conn)
        .await
        .map_err(map_sqlx_error)?
        .is_some();
    Ok(exists)
}

/// Works out which unique key a failed insert of `record` hit.
async fn classify_violation(conn: &mut MySqlConnection, record: &UrlRecord) -> StorageError {
    match code_exists(&mut *conn, &record.short_code).await {
        Ok(true) => StorageError::AlreadyExists(record.short_code.to_string()),
        Ok(false) => url_conflict(conn, record).await,
        Err(e) => e,
    }
}

/// Reports the active code already holding `record`'s original URL.
///
/// Used where the code itself is known to be free or owned by `record`, so
/// the only unique key left to violate is the active URL index.
async fn url_conflict(conn: &mut MySqlConnection, record: &UrlRecord) -> StorageError {
    match find_active_by_url(conn, &record.original_url).await {
        Ok(Some(existing)) => StorageError::Conflict { existing },
        Ok(None) => StorageError::AlreadyExists(record.short_code.to_string()),
        Err(e) => e,
    }
}

#[async_trait]
impl ReadRepository for MySqlRepository {
    async fn get(&self, code: &ShortCode) -> Result<UrlRecord> {
        let row = sqlx::query(
            r#"
            SELECT short_code, original_url, owner_id, deleted_at
            FROM short_urls
            WHERE short_code = ?
            LIMIT 1
            "#,
        )
        .bind(code.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let Some(row) = row else {
            return Err(StorageError::NotFound(code.to_string()));
        };

        let record = decode_record(&row)?;
        if record.deleted {
            return Err(StorageError::Deleted(code.to_string()));
        }
        Ok(record)
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await.map_err(map_sqlx_error)?;
        conn.ping().await.map_err(map_sqlx_error)
    }
}

#[async_trait]
impl Repository for MySqlRepository {
    async fn store(&self, record: UrlRecord, overwrite: bool) -> Result<()> {
        let now = now_unix_seconds();

        if !overwrite {
            let mut conn = self.pool.acquire().await.map_err(map_sqlx_error)?;
            return match insert(&mut conn, &record, now).await {
                Ok(()) => Ok(()),
                Err(err) if is_unique_violation(&err) => {
                    Err(classify_violation(&mut conn, &record).await)
                }
                Err(err) => Err(map_sqlx_error(err)),
            };
        }

        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let row = sqlx::query(
            r#"
            SELECT short_code, original_url, owner_id, deleted_at
            FROM short_urls
            WHERE short_code = ?
            FOR UPDATE
            "#,
        )
        .bind(record.short_code.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let result = match row {
            None => insert(&mut tx, &record, now).await,
            Some(row) => {
                let current = decode_record(&row)?;
                if current == record {
                    return Ok(());
                }
                if current.deleted {
                    return Err(StorageError::Deleted(record.short_code.to_string()));
                }
                sqlx::query(
                    r#"
                    UPDATE short_urls
                    SET original_url = ?, owner_id = ?
                    WHERE short_code = ?
                    "#,
                )
                .bind(record.original_url.as_str())
                .bind(record.owner.as_str())
                .bind(record.short_code.as_str())
                .execute(&mut *tx)
                .await
                .map(|_| ())
            }
        };

        match result {
            Ok(()) => {
                tx.commit().await.map_err(map_sqlx_error)?;
                Ok(())
            }
            // The row for this code is locked above, so the clash is on the URL.
            Err(err) if is_unique_violation(&err) => Err(url_conflict(&mut tx, &record).await),
            Err(err) => Err(map_sqlx_error(err)),
        }
    }

    async fn store_batch(&self, records: Vec<UrlRecord>) -> Result<()> {
        let now = now_unix_seconds();
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        for record in &records {
            match insert(&mut tx, record, now).await {
                Ok(()) => {}
                Err(err) if is_unique_violation(&err) => {
                    return Err(StorageError::AlreadyExists(record.short_code.to_string()));
                }
                Err(err) => return Err(map_sqlx_error(err)),
            }
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        debug!(count = records.len(), "Stored URL batch");
        Ok(())
    }

    async fn list_user_urls(&self, owner: &UserId) -> Result<Vec<UrlRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT short_code, original_url, owner_id, deleted_at
            FROM short_urls
            WHERE owner_id = ?
              AND deleted_at IS NULL
            ORDER BY created_at, short_code
            "#,
        )
        .bind(owner.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if rows.is_empty() {
            return Err(StorageError::NotFound(owner.to_string()));
        }
        rows.iter().map(decode_record).collect()
    }

    async fn delete_user_urls(&self, requests: &[DeleteRequest]) -> Result<u64> {
        let now = now_unix_seconds();
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        let mut affected = 0;

        for request in requests {
            let result = sqlx::query(
                r#"
                UPDATE short_urls
                SET deleted_at = ?
                WHERE short_code = ?
                  AND owner_id = ?
                  AND deleted_at IS NULL
                "#,
            )
            .bind(now)
            .bind(request.short_code.as_str())
            .bind(request.owner.as_str())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

            affected += result.rows_affected();
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(affected)
    }
}
