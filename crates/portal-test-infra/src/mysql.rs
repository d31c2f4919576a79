use crate::{Result, TestInfraError};
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use std::time::Duration;
use testcontainers::core::{IntoContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::ImageExt;
use testcontainers::{ContainerAsync, GenericImage};
use typed_builder::TypedBuilder;

const MYSQL_PORT: u16 = 3306;

/// Image, credentials and schema for a test MySQL server.
#[derive(Debug, Clone, TypedBuilder)]
pub struct MysqlConfig {
    #[builder(default = "8.4".to_string(), setter(into))]
    tag: String,
    #[builder(default = "portal".to_string(), setter(into))]
    database: String,
    #[builder(default = "portal".to_string(), setter(into))]
    username: String,
    #[builder(default = "portal".to_string(), setter(into))]
    password: String,
    /// Statements run once, in order, before the server is handed out.
    #[builder(default)]
    init_sql: Vec<String>,
    /// Connection attempts made while the server finishes booting.
    #[builder(default = 20)]
    connect_attempts: usize,
    #[builder(default = 5)]
    max_connections: u32,
}

impl MysqlConfig {
    fn database_url(&self, host: &str, port: u16) -> String {
        format!(
            "mysql://{}:{}@{}:{}/{}",
            self.username, self.password, host, port, self.database
        )
    }
}

/// A disposable MySQL server with a ready connection pool.
///
/// The container is removed when this value is dropped.
pub struct MySqlServer {
    _container: ContainerAsync<GenericImage>,
    pool: MySqlPool,
    database_url: String,
}

impl MySqlServer {
    /// Starts a container, connects to it and applies `init_sql`.
    pub async fn new(config: MysqlConfig) -> Result<Self> {
        let container = GenericImage::new("mysql", config.tag.as_str())
            .with_exposed_port(MYSQL_PORT.tcp())
            .with_wait_for(WaitFor::message_on_stderr("ready for connections"))
            .with_env_var("MYSQL_DATABASE", config.database.as_str())
            .with_env_var("MYSQL_USER", config.username.as_str())
            .with_env_var("MYSQL_PASSWORD", config.password.as_str())
            .with_env_var("MYSQL_ROOT_PASSWORD", "root")
            .start()
            .await?;

        let host = container.get_host().await?.to_string();
        let port = container.get_host_port_ipv4(MYSQL_PORT).await?;
        let database_url = config.database_url(&host, port);

        let pool = connect_with_retry(&config, &database_url).await?;
        for statement in &config.init_sql {
            sqlx::query(statement).execute(&pool).await?;
        }

        Ok(Self {
            _container: container,
            pool,
            database_url,
        })
    }

    /// Pool connected to the test database.
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    /// DSN in the form accepted by `MySqlRepository::connect`.
    pub fn database_url(&self) -> &str {
        &self.database_url
    }
}

// The entrypoint logs "ready for connections" once for its temporary
// bootstrap server as well, so the first attempts can be refused.
async fn connect_with_retry(config: &MysqlConfig, url: &str) -> Result<MySqlPool> {
    let mut last_error = None;

    for _ in 0..config.connect_attempts.max(1) {
        match MySqlPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(url)
            .await
        {
            Ok(pool) => return Ok(pool),
            Err(err) => {
                last_error = Some(err);
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
        }
    }

    Err(TestInfraError::Connect {
        attempts: config.connect_attempts.max(1),
        source: last_error.unwrap_or(sqlx::Error::PoolTimedOut),
    })
}
