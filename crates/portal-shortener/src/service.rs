use crate::validate::{validate_code, validate_url, DEFAULT_SCHEMES};
use async_trait::async_trait;
use jiff::Timestamp;
use portal_buffer::BufferHandle;
use portal_core::{
    BatchItem, BatchResult, DeleteRequest, Repository, ShortCode, Shortener, ShortenerError,
    StorageError, UrlRecord, User, UserUrl,
};
use portal_generator::Generator;
use std::sync::Arc;
use tracing::{debug, trace, warn};
use typed_builder::TypedBuilder;

type Result<T> = std::result::Result<T, ShortenerError>;

/// Collision retries for a single shorten request.
pub const DEFAULT_MAX_ATTEMPTS: usize = 10;

#[derive(Debug, Clone, TypedBuilder)]
pub struct ShortenerSettings {
    /// Prefix every code is appended to when building the served URL.
    #[builder(setter(into))]
    pub base_url: String,
    /// Accepted URL schemes. Empty accepts any scheme.
    #[builder(default = DEFAULT_SCHEMES.iter().map(|s| s.to_string()).collect())]
    pub allowed_schemes: Vec<String>,
    #[builder(default = DEFAULT_MAX_ATTEMPTS)]
    pub max_attempts: usize,
}

/// A concrete implementation of the `Shortener` trait.
///
/// Creation goes straight to the repository. Deletion requests are pushed
/// into the delete buffer and applied later by a
/// [`DeleteSink`](crate::DeleteSink).
#[derive(Debug, Clone)]
pub struct ShortenerService<R, G> {
    repository: Arc<R>,
    generator: Arc<G>,
    settings: ShortenerSettings,
    deletes: BufferHandle<DeleteRequest>,
}

impl<R: Repository, G: Generator> ShortenerService<R, G> {
    pub fn new(
        repository: R,
        generator: G,
        settings: ShortenerSettings,
        deletes: BufferHandle<DeleteRequest>,
    ) -> Self {
        Self {
            repository: Arc::new(repository),
            generator: Arc::new(generator),
            settings,
            deletes,
        }
    }

    pub fn settings(&self) -> &ShortenerSettings {
        &self.settings
    }

    fn generate_code(&self) -> ShortCode {
        self.generator.generate().into()
    }

    fn served_url(&self, code: &ShortCode) -> String {
        code.to_url(&self.settings.base_url)
    }

    fn ensure_authenticated(user: &User) -> Result<()> {
        if user.is_new {
            return Err(ShortenerError::Unauthorized);
        }
        Ok(())
    }
}

#[async_trait]
impl<R: Repository, G: Generator> Shortener for ShortenerService<R, G> {
    async fn shorten(&self, user: &User, original_url: &str) -> Result<String> {
        validate_url(original_url, &self.settings.allowed_schemes)?;
        let original_url = original_url.trim();

        let max_attempts = self.settings.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            let code = self.generate_code();
            let record = UrlRecord::new(code.clone(), original_url, user.id.clone());

            match self.repository.store(record, false).await {
                Ok(()) => {
                    debug!(code = %code, user = %user.id, "Shortened URL");
                    return Ok(self.served_url(&code));
                }
                Err(StorageError::AlreadyExists(_)) => {
                    trace!(code = %code, attempt, "Short code collision, retrying");
                }
                Err(StorageError::Conflict { existing }) => {
                    debug!(code = %existing, "URL already shortened");
                    return Err(ShortenerError::Conflict {
                        short_url: self.served_url(&existing),
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }

        warn!(attempts = max_attempts, "Gave up generating a unique short code");
        Err(ShortenerError::GiveUp {
            attempts: max_attempts,
        })
    }

    async fn shorten_batch(&self, user: &User, items: Vec<BatchItem>) -> Result<Vec<BatchResult>> {
        if items.is_empty() {
            return Err(ShortenerError::EmptyBatch);
        }
        for item in &items {
            validate_url(&item.original_url, &self.settings.allowed_schemes)?;
        }

        let mut records = Vec::with_capacity(items.len());
        let mut results = Vec::with_capacity(items.len());
        for item in items {
            let code = self.generate_code();
            results.push(BatchResult {
                correlation_id: item.correlation_id,
                short_url: self.served_url(&code),
            });
            records.push(UrlRecord::new(
                code,
                item.original_url.trim(),
                user.id.clone(),
            ));
        }

        self.repository.store_batch(records).await?;
        debug!(count = results.len(), user = %user.id, "Shortened URL batch");
        Ok(results)
    }

    async fn delete_batch(&self, user: &User, codes: Vec<String>) -> Result<()> {
        Self::ensure_authenticated(user)?;
        if codes.is_empty() {
            return Err(ShortenerError::EmptyBatch);
        }

        let codes = codes
            .iter()
            .map(|code| validate_code(code))
            .collect::<Result<Vec<_>>>()?;

        if self.deletes.is_closed() {
            return Err(ShortenerError::Closed);
        }

        let enqueued_at_micros = Timestamp::now().as_microsecond();
        let requests: Vec<_> = codes
            .into_iter()
            .map(|short_code| DeleteRequest {
                short_code,
                owner: user.id.clone(),
                enqueued_at_micros,
            })
            .collect();
        debug!(count = requests.len(), user = %user.id, "Queued URLs for deletion");

        // A push can wait behind a flush in progress, so it runs off the
        // request path.
        let deletes = self.deletes.clone();
        tokio::spawn(async move {
            for request in requests {
                let short_code = request.short_code.clone();
                if deletes.push(request).await.is_err() {
                    warn!(code = %short_code, "Delete buffer closed, dropping deletion");
                    break;
                }
            }
        });

        Ok(())
    }

    async fn list_user_urls(&self, user: &User) -> Result<Vec<UserUrl>> {
        Self::ensure_authenticated(user)?;

        let records = match self.repository.list_user_urls(&user.id).await {
            Ok(records) => records,
            Err(StorageError::NotFound(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        Ok(records
            .into_iter()
            .map(|record| UserUrl {
                short_url: self.served_url(&record.short_code),
                original_url: record.original_url,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DeleteSink;
    use portal_buffer::{BufferSettings, FlushBuffer};
    use portal_core::{ReadRepository, UserId};
    use portal_generator::SeqGenerator;
    use portal_storage::InMemoryRepository;
    use std::time::Duration;
    use tokio::sync::oneshot;

    const BASE: &str = "http://localhost:8080";

    /// Always produces the same code.
    struct FixedGenerator(&'static str);

    impl Generator for FixedGenerator {
        type Output = ShortCode;

        fn generate(&self) -> ShortCode {
            ShortCode::new_unchecked(self.0)
        }
    }

    fn settings() -> ShortenerSettings {
        ShortenerSettings::builder().base_url(BASE).build()
    }

    /// A delete handle whose buffer is gone, for tests that never delete.
    fn closed_handle() -> BufferHandle<DeleteRequest> {
        let (buffer, handle) = FlushBuffer::new(
            BufferSettings::builder()
                .flush_interval(Duration::from_secs(1))
                .flush_threshold(1)
                .build(),
            |_batch: Vec<DeleteRequest>| async {},
        );
        drop(buffer);
        handle
    }

    fn test_service(
        repo: InMemoryRepository,
    ) -> ShortenerService<InMemoryRepository, SeqGenerator> {
        ShortenerService::new(
            repo,
            SeqGenerator::with_prefix("pt"),
            settings(),
            closed_handle(),
        )
    }

    fn known_user(id: &str) -> User {
        User::existing(UserId::new(id).unwrap())
    }

    #[tokio::test]
    async fn shorten_returns_served_url() {
        let repo = InMemoryRepository::new();
        let service = test_service(repo.clone());

        let short_url = service
            .shorten(&known_user("u1"), "https://example.com")
            .await
            .unwrap();

        assert_eq!(short_url, "http://localhost:8080/pt000000");
        let record = repo.get(&ShortCode::new_unchecked("pt000000")).await.unwrap();
        assert_eq!(record.original_url, "https://example.com");
        assert_eq!(record.owner, UserId::new("u1").unwrap());
    }

    #[tokio::test]
    async fn new_user_may_shorten() {
        let service = test_service(InMemoryRepository::new());

        assert!(service
            .shorten(&User::new_session(), "https://example.com")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn shorten_retries_on_collision() {
        let repo = InMemoryRepository::new();
        for (code, url) in [("pt000000", "https://a.example"), ("pt000001", "https://b.example")] {
            repo.store(
                UrlRecord::new(ShortCode::new_unchecked(code), url, UserId::new("other").unwrap()),
                false,
            )
            .await
            .unwrap();
        }
        let service = test_service(repo);

        let short_url = service
            .shorten(&known_user("u1"), "https://example.com")
            .await
            .unwrap();

        assert_eq!(short_url, "http://localhost:8080/pt000002");
    }

    #[tokio::test]
    async fn shorten_gives_up_after_max_attempts() {
        let repo = InMemoryRepository::new();
        repo.store(
            UrlRecord::new(
                ShortCode::new_unchecked("taken"),
                "https://taken.example",
                UserId::new("other").unwrap(),
            ),
            false,
        )
        .await
        .unwrap();
        let service = ShortenerService::new(
            repo,
            FixedGenerator("taken"),
            settings(),
            closed_handle(),
        );

        let err = service
            .shorten(&known_user("u1"), "https://example.com")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ShortenerError::GiveUp { attempts } if attempts == DEFAULT_MAX_ATTEMPTS
        ));
    }

    #[tokio::test]
    async fn shorten_existing_url_reports_its_short_url() {
        let service = test_service(InMemoryRepository::new());

        let first = service
            .shorten(&known_user("u1"), "http://e.com")
            .await
            .unwrap();
        let err = service
            .shorten(&known_user("u2"), "http://e.com")
            .await
            .unwrap_err();

        match err {
            ShortenerError::Conflict { short_url } => assert_eq!(short_url, first),
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn shorten_validates_url() {
        let service = test_service(InMemoryRepository::new());

        let err = service
            .shorten(&known_user("u1"), "not-a-valid-url")
            .await
            .unwrap_err();
        assert!(matches!(err, ShortenerError::InvalidUrl(_)));

        let err = service
            .shorten(&known_user("u1"), "ftp://example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, ShortenerError::UnsupportedScheme(_)));
    }

    #[tokio::test]
    async fn shorten_batch_echoes_correlation_ids() {
        let repo = InMemoryRepository::new();
        let service = test_service(repo.clone());

        let results = service
            .shorten_batch(
                &known_user("u1"),
                vec![
                    BatchItem {
                        correlation_id: "one".into(),
                        original_url: "https://one.example".into(),
                    },
                    BatchItem {
                        correlation_id: "two".into(),
                        original_url: "https://two.example".into(),
                    },
                ],
            )
            .await
            .unwrap();

        assert_eq!(
            results,
            vec![
                BatchResult {
                    correlation_id: "one".into(),
                    short_url: format!("{BASE}/pt000000"),
                },
                BatchResult {
                    correlation_id: "two".into(),
                    short_url: format!("{BASE}/pt000001"),
                },
            ]
        );
        assert_eq!(repo.len(), 2);
    }

    #[tokio::test]
    async fn shorten_batch_rejects_empty_and_invalid_input() {
        let repo = InMemoryRepository::new();
        let service = test_service(repo.clone());

        let err = service
            .shorten_batch(&known_user("u1"), vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, ShortenerError::EmptyBatch));

        let err = service
            .shorten_batch(
                &known_user("u1"),
                vec![
                    BatchItem {
                        correlation_id: "ok".into(),
                        original_url: "https://ok.example".into(),
                    },
                    BatchItem {
                        correlation_id: "bad".into(),
                        original_url: "nope".into(),
                    },
                ],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ShortenerError::InvalidUrl(_)));
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn shorten_batch_is_all_or_nothing() {
        let repo = InMemoryRepository::new();
        let service = test_service(repo.clone());
        service
            .shorten(&known_user("u1"), "https://dup.example")
            .await
            .unwrap();

        let err = service
            .shorten_batch(
                &known_user("u1"),
                vec![
                    BatchItem {
                        correlation_id: "fresh".into(),
                        original_url: "https://fresh.example".into(),
                    },
                    BatchItem {
                        correlation_id: "dup".into(),
                        original_url: "https://dup.example".into(),
                    },
                ],
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ShortenerError::Storage(_)));
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn new_users_cannot_list_or_delete() {
        let service = test_service(InMemoryRepository::new());
        let user = User::new_session();

        assert!(matches!(
            service.list_user_urls(&user).await.unwrap_err(),
            ShortenerError::Unauthorized
        ));
        assert!(matches!(
            service
                .delete_batch(&user, vec!["abc".into()])
                .await
                .unwrap_err(),
            ShortenerError::Unauthorized
        ));
    }

    #[tokio::test]
    async fn list_user_urls_returns_served_urls() {
        let service = test_service(InMemoryRepository::new());
        let user = known_user("u1");

        assert!(service.list_user_urls(&user).await.unwrap().is_empty());

        service.shorten(&user, "https://a.example").await.unwrap();
        service
            .shorten(&known_user("u2"), "https://b.example")
            .await
            .unwrap();

        let urls = service.list_user_urls(&user).await.unwrap();
        assert_eq!(
            urls,
            vec![UserUrl {
                short_url: format!("{BASE}/pt000000"),
                original_url: "https://a.example".into(),
            }]
        );
    }

    #[tokio::test]
    async fn delete_batch_validates_input() {
        let service = test_service(InMemoryRepository::new());
        let user = known_user("u1");

        assert!(matches!(
            service.delete_batch(&user, vec![]).await.unwrap_err(),
            ShortenerError::EmptyBatch
        ));
        assert!(matches!(
            service
                .delete_batch(&user, vec!["not valid!".into()])
                .await
                .unwrap_err(),
            ShortenerError::InvalidShortCode(_)
        ));
    }

    #[tokio::test]
    async fn delete_batch_fails_when_buffer_is_closed() {
        let service = test_service(InMemoryRepository::new());

        let err = service
            .delete_batch(&known_user("u1"), vec!["abc123".into()])
            .await
            .unwrap_err();

        assert!(matches!(err, ShortenerError::Closed));
    }

    #[tokio::test(start_paused = true)]
    async fn deletion_is_applied_by_the_buffer() {
        let repo = InMemoryRepository::new();
        let (buffer, handle) = FlushBuffer::new(
            BufferSettings::builder()
                .flush_interval(Duration::from_secs(3600))
                .flush_threshold(100)
                .build(),
            DeleteSink::new(repo.clone()),
        );
        let (stop, stopped) = oneshot::channel::<()>();
        let done = buffer.spawn(async move {
            let _ = stopped.await;
        });

        let service = ShortenerService::new(
            repo.clone(),
            SeqGenerator::with_prefix("pt"),
            settings(),
            handle,
        );
        let owner = known_user("u1");
        let intruder = known_user("u2");
        service.shorten(&owner, "https://a.example").await.unwrap();
        service.shorten(&owner, "https://b.example").await.unwrap();

        service
            .delete_batch(&owner, vec!["pt000000".into()])
            .await
            .unwrap();
        service
            .delete_batch(&intruder, vec!["pt000001".into()])
            .await
            .unwrap();

        // Let the queued pushes reach the buffer.
        tokio::time::sleep(Duration::from_millis(10)).await;

        // Accepted, but not applied until the buffer flushes.
        assert!(repo.get(&ShortCode::new_unchecked("pt000000")).await.is_ok());

        stop.send(()).unwrap();
        done.await.unwrap();

        let err = repo
            .get(&ShortCode::new_unchecked("pt000000"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Deleted(_)));
        assert!(repo.get(&ShortCode::new_unchecked("pt000001")).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn deletion_flushes_on_interval() {
        let repo = InMemoryRepository::new();
        let (buffer, handle) = FlushBuffer::new(
            BufferSettings::builder()
                .flush_interval(Duration::from_millis(100))
                .flush_threshold(100)
                .build(),
            DeleteSink::new(repo.clone()),
        );
        let _done = buffer.spawn(std::future::pending());

        let service = ShortenerService::new(
            repo.clone(),
            SeqGenerator::with_prefix("pt"),
            settings(),
            handle,
        );
        let owner = known_user("u1");
        service.shorten(&owner, "https://a.example").await.unwrap();
        service
            .delete_batch(&owner, vec!["pt000000".into()])
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;

        let err = repo
            .get(&ShortCode::new_unchecked("pt000000"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Deleted(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn delete_batch_does_not_wait_for_a_slow_flush() {
        let (buffer, handle) = FlushBuffer::new(
            BufferSettings::builder()
                .flush_interval(Duration::from_secs(3600))
                .flush_threshold(2)
                .build(),
            |_batch: Vec<DeleteRequest>| async {
                tokio::time::sleep(Duration::from_secs(30)).await;
            },
        );
        let _done = buffer.spawn(std::future::pending());
        let service = ShortenerService::new(
            InMemoryRepository::new(),
            SeqGenerator::with_prefix("pt"),
            settings(),
            handle,
        );

        let started = tokio::time::Instant::now();
        service
            .delete_batch(
                &known_user("u1"),
                vec!["a1".into(), "a2".into(), "a3".into(), "a4".into()],
            )
            .await
            .unwrap();

        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
