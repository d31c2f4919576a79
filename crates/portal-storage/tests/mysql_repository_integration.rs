use portal_core::{ShortCode, UserId};
use portal_storage::mysql::SCHEMA;
use portal_storage::{
    DeleteRequest, MySqlRepository, ReadRepository, Repository, StorageError, UrlRecord,
};
use portal_test_infra::mysql::{MySqlServer, MysqlConfig};

struct Fixture {
    _mysql: MySqlServer,
    repo: MySqlRepository,
}

impl Fixture {
    async fn start() -> Self {
        let mysql = MySqlServer::new(
            MysqlConfig::builder()
                .init_sql(vec![SCHEMA.to_string()])
                .build(),
        )
        .await
        .expect("start mysql");
        let repo = MySqlRepository::new(mysql.pool().clone());

        Self {
            _mysql: mysql,
            repo,
        }
    }
}

fn code(value: &str) -> ShortCode {
    ShortCode::new_unchecked(value)
}

fn user(value: &str) -> UserId {
    UserId::new(value).unwrap()
}

fn record(short: &str, url: &str, owner: &str) -> UrlRecord {
    UrlRecord::new(code(short), url, user(owner))
}

fn delete(short: &str, owner: &str) -> DeleteRequest {
    DeleteRequest {
        short_code: code(short),
        owner: user(owner),
        enqueued_at_micros: 0,
    }
}

#[tokio::test]
async fn store_and_get_active_record() {
    let fixture = Fixture::start().await;

    fixture
        .repo
        .store(record("abc123", "https://example.com", "u1"), false)
        .await
        .unwrap();

    let got = fixture.repo.get(&code("abc123")).await.unwrap();
    assert_eq!(got.original_url, "https://example.com");
    assert_eq!(got.owner, user("u1"));
    assert!(!got.deleted);
    assert!(fixture.repo.ping().await.is_ok());
}

#[tokio::test]
async fn store_existing_code_without_overwrite_fails() {
    let fixture = Fixture::start().await;

    fixture
        .repo
        .store(record("abc123", "https://one.example", "u1"), false)
        .await
        .unwrap();

    let err = fixture
        .repo
        .store(record("abc123", "https://two.example", "u1"), false)
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::AlreadyExists(_)));
    let got = fixture.repo.get(&code("abc123")).await.unwrap();
    assert_eq!(got.original_url, "https://one.example");
}

#[tokio::test]
async fn same_url_reports_existing_code() {
    let fixture = Fixture::start().await;

    fixture
        .repo
        .store(record("first1", "https://example.com", "u1"), false)
        .await
        .unwrap();

    let err = fixture
        .repo
        .store(record("second", "https://example.com", "u2"), false)
        .await
        .unwrap_err();

    match err {
        StorageError::Conflict { existing } => assert_eq!(existing, code("first1")),
        other => panic!("expected conflict, got {other:?}"),
    }
}

#[tokio::test]
async fn overwrite_updates_and_identical_overwrite_is_noop() {
    let fixture = Fixture::start().await;
    let original = record("abc123", "https://old.example", "u1");

    fixture.repo.store(original.clone(), false).await.unwrap();
    fixture.repo.store(original, true).await.unwrap();
    fixture
        .repo
        .store(record("abc123", "https://new.example", "u1"), true)
        .await
        .unwrap();

    let got = fixture.repo.get(&code("abc123")).await.unwrap();
    assert_eq!(got.original_url, "https://new.example");
}

#[tokio::test]
async fn overwrite_onto_a_taken_url_reports_its_code() {
    let fixture = Fixture::start().await;

    fixture
        .repo
        .store_batch(vec![
            record("x1", "https://a.example", "u1"),
            record("x2", "https://b.example", "u1"),
        ])
        .await
        .unwrap();

    let err = fixture
        .repo
        .store(record("x2", "https://a.example", "u1"), true)
        .await
        .unwrap_err();

    match err {
        StorageError::Conflict { existing } => assert_eq!(existing, code("x1")),
        other => panic!("expected conflict, got {other:?}"),
    }
    let got = fixture.repo.get(&code("x2")).await.unwrap();
    assert_eq!(got.original_url, "https://b.example");
}

#[tokio::test]
async fn url_conflicts_are_exact_matches() {
    let fixture = Fixture::start().await;

    fixture
        .repo
        .store(record("lower", "https://example.com/path", "u1"), false)
        .await
        .unwrap();
    fixture
        .repo
        .store(record("upper", "https://example.com/PATH", "u1"), false)
        .await
        .unwrap();

    assert_eq!(
        fixture.repo.get(&code("upper")).await.unwrap().original_url,
        "https://example.com/PATH"
    );
}

#[tokio::test]
async fn ensure_schema_is_repeatable() {
    let fixture = Fixture::start().await;

    fixture.repo.ensure_schema().await.unwrap();
    assert!(fixture.repo.ping().await.is_ok());
}

#[tokio::test]
async fn batch_rolls_back_on_violation() {
    let fixture = Fixture::start().await;

    fixture
        .repo
        .store(record("taken", "https://taken.example", "u1"), false)
        .await
        .unwrap();

    let err = fixture
        .repo
        .store_batch(vec![
            record("fresh1", "https://one.example", "u1"),
            record("taken", "https://two.example", "u1"),
        ])
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::AlreadyExists(_)));
    assert!(matches!(
        fixture.repo.get(&code("fresh1")).await.unwrap_err(),
        StorageError::NotFound(_)
    ));
}

#[tokio::test]
async fn list_and_delete_user_urls() {
    let fixture = Fixture::start().await;

    fixture
        .repo
        .store_batch(vec![
            record("a1", "https://a1.example", "alice"),
            record("a2", "https://a2.example", "alice"),
            record("b1", "https://b1.example", "bob"),
        ])
        .await
        .unwrap();

    let affected = fixture
        .repo
        .delete_user_urls(&[delete("a2", "alice"), delete("b1", "alice")])
        .await
        .unwrap();
    assert_eq!(affected, 1);

    let alice = fixture.repo.list_user_urls(&user("alice")).await.unwrap();
    assert_eq!(alice.len(), 1);
    assert_eq!(alice[0].short_code, code("a1"));

    assert!(matches!(
        fixture.repo.get(&code("a2")).await.unwrap_err(),
        StorageError::Deleted(_)
    ));
    assert!(fixture.repo.get(&code("b1")).await.is_ok());

    assert!(matches!(
        fixture.repo.list_user_urls(&user("carol")).await.unwrap_err(),
        StorageError::NotFound(_)
    ));
}

#[tokio::test]
async fn deleted_url_can_be_shortened_again() {
    let fixture = Fixture::start().await;

    fixture
        .repo
        .store(record("old1", "https://example.com", "u1"), false)
        .await
        .unwrap();
    fixture
        .repo
        .delete_user_urls(&[delete("old1", "u1")])
        .await
        .unwrap();

    fixture
        .repo
        .store(record("new1", "https://example.com", "u1"), false)
        .await
        .unwrap();

    let err = fixture
        .repo
        .store(record("old1", "https://other.example", "u1"), true)
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Deleted(_)));
}
