use clap::{Parser, Subcommand, ValueEnum};
use std::fmt::{Display, Formatter};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use tinylink_shortener::service::DEFAULT_MAX_ATTEMPTS;

pub const STORAGE_BACKEND_ENV: &str = "TINYLINK_STORAGE_BACKEND";
pub const FILE_STORAGE_PATH_ENV: &str = "TINYLINK_FILE_STORAGE_PATH";
pub const DATABASE_DSN_ENV: &str = "TINYLINK_DATABASE_DSN";
pub const BASE_URL_ENV: &str = "TINYLINK_BASE_URL";
pub const MAX_ATTEMPTS_ENV: &str = "TINYLINK_MAX_ATTEMPTS";
pub const LOG_FORMAT_ENV: &str = "TINYLINK_LOG_FORMAT";

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackendArg {
    #[value(name = "in-memory")]
    InMemory,
    #[value(name = "file")]
    File,
    #[value(name = "postgres")]
    Postgres,
}

impl Display for StorageBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackendArg::InMemory => write!(f, "in-memory"),
            StorageBackendArg::File => write!(f, "file"),
            StorageBackendArg::Postgres => write!(f, "postgres"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "tinylink", about = "Shorten and resolve URLs")]
pub struct CLI {
    #[arg(
        long,
        env = STORAGE_BACKEND_ENV,
        value_enum,
        default_value_t = StorageBackendArg::InMemory
    )]
    pub storage: StorageBackendArg,

    #[arg(long, env = FILE_STORAGE_PATH_ENV, required_if_eq("storage", "file"))]
    pub file_storage_path: Option<PathBuf>,

    #[arg(long, env = DATABASE_DSN_ENV, required_if_eq("storage", "postgres"))]
    pub database_dsn: Option<String>,

    /// Prefix prepended to codes when printing short URLs.
    #[arg(long, env = BASE_URL_ENV, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    #[arg(long, env = MAX_ATTEMPTS_ENV, default_value_t = DEFAULT_MAX_ATTEMPTS)]
    pub max_attempts: NonZeroUsize,

    #[arg(long, env = LOG_FORMAT_ENV, value_enum, default_value_t = LogFormatArg::Text)]
    pub log_format: LogFormatArg,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Shorten one URL.
    Shorten {
        url: String,
        #[arg(long, default_value = "")]
        owner: String,
    },
    /// Shorten several URLs for one owner.
    Batch {
        #[arg(long, default_value = "")]
        owner: String,
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Print the original URL behind a short code.
    Resolve { code: String },
    /// List every short URL attributed to an owner.
    List { owner: String },
    /// Check that the storage backend is reachable.
    Ping,
}
