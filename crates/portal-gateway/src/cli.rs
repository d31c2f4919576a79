use clap::{Parser, ValueEnum};
use portal_telemetry::LogFormat;
use std::fmt::{Display, Formatter};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const HTTP_LISTEN_ADDR_ENV: &str = "PORTAL_HTTP_LISTEN_ADDR";
pub const GRPC_LISTEN_ADDR_ENV: &str = "PORTAL_GRPC_LISTEN_ADDR";
pub const BASE_URL_ENV: &str = "PORTAL_BASE_URL";
pub const STORAGE_BACKEND_ENV: &str = "PORTAL_STORAGE_BACKEND";
pub const FILE_PATH_ENV: &str = "PORTAL_FILE_PATH";
pub const PERSIST_INTERVAL_ENV: &str = "PORTAL_PERSIST_INTERVAL_SECS";
pub const MYSQL_DSN_ENV: &str = "PORTAL_MYSQL_DSN";
pub const CODE_LENGTH_ENV: &str = "PORTAL_CODE_LENGTH";
pub const ALLOWED_SCHEMES_ENV: &str = "PORTAL_ALLOWED_SCHEMES";
pub const FLUSH_INTERVAL_ENV: &str = "PORTAL_FLUSH_INTERVAL_MS";
pub const FLUSH_THRESHOLD_ENV: &str = "PORTAL_FLUSH_THRESHOLD";
pub const LOG_FORMAT_ENV: &str = "PORTAL_LOG_FORMAT";

pub const DEFAULT_HTTP_LISTEN_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_GRPC_LISTEN_ADDR: &str = "127.0.0.1:50051";
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackendArg {
    #[value(name = "in-memory")]
    InMemory,
    #[value(name = "file")]
    File,
    #[value(name = "mysql")]
    Mysql,
}

impl Display for StorageBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackendArg::InMemory => write!(f, "in-memory"),
            StorageBackendArg::File => write!(f, "file"),
            StorageBackendArg::Mysql => write!(f, "mysql"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    Text,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(value: LogFormatArg) -> Self {
        match value {
            LogFormatArg::Text => LogFormat::Text,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

#[derive(Debug, Clone, Parser)]
#[command(name = "portal", about = "URL shortener with HTTP and gRPC front ends")]
pub struct Cli {
    #[arg(long, env = HTTP_LISTEN_ADDR_ENV, default_value = DEFAULT_HTTP_LISTEN_ADDR)]
    pub http_listen_addr: SocketAddr,

    #[arg(long, env = GRPC_LISTEN_ADDR_ENV, default_value = DEFAULT_GRPC_LISTEN_ADDR)]
    pub grpc_listen_addr: SocketAddr,

    /// Prefix of every short URL handed out.
    #[arg(long, env = BASE_URL_ENV, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    #[arg(
        long,
        env = STORAGE_BACKEND_ENV,
        value_enum,
        default_value_t = StorageBackendArg::InMemory
    )]
    pub storage: StorageBackendArg,

    /// Snapshot file for the `file` backend.
    #[arg(long, env = FILE_PATH_ENV, required_if_eq("storage", "file"))]
    pub file_path: Option<PathBuf>,

    #[arg(long, env = PERSIST_INTERVAL_ENV, default_value_t = 5)]
    pub persist_interval_secs: u64,

    #[arg(long, env = MYSQL_DSN_ENV, required_if_eq("storage", "mysql"))]
    pub mysql_dsn: Option<String>,

    #[arg(long, env = CODE_LENGTH_ENV, default_value_t = portal_generator::random::DEFAULT_LENGTH)]
    pub code_length: usize,

    /// Comma separated. Pass an empty value to accept any scheme.
    #[arg(
        long,
        env = ALLOWED_SCHEMES_ENV,
        value_delimiter = ',',
        default_value = "http,https"
    )]
    pub allowed_schemes: Vec<String>,

    #[arg(long, env = FLUSH_INTERVAL_ENV, default_value_t = 10_000)]
    pub flush_interval_ms: u64,

    #[arg(long, env = FLUSH_THRESHOLD_ENV, default_value_t = 100)]
    pub flush_threshold: usize,

    #[arg(long, env = LOG_FORMAT_ENV, value_enum, default_value_t = LogFormatArg::Text)]
    pub log_format: LogFormatArg,
}

impl Cli {
    pub fn persist_interval(&self) -> Duration {
        Duration::from_secs(self.persist_interval_secs)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    /// Allowed schemes with blanks dropped.
    pub fn schemes(&self) -> Vec<String> {
        self.allowed_schemes
            .iter()
            .map(|s| s.trim().to_ascii_lowercase())
            .filter(|s| !s.is_empty())
            .collect()
    }
}
