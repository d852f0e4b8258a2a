mod cli;

use crate::cli::{Command, LogFormatArg, StorageBackendArg, CLI};
use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tinylink_generator::RandomGenerator;
use tinylink_shortener::{
    Repository, ShortCode, Shortener, ShortenerError, ShortenerService, ShortenerSettings,
};
use tinylink_storage::{FileRepository, InMemoryRepository, PostgresRepository, PostgresSettings};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CLI::parse();
    init_tracing(config.log_format);

    info!(
        storage_backend = %config.storage,
        base_url = %config.base_url,
        max_attempts = config.max_attempts.get(),
        "starting tinylink"
    );

    let repository = open_repository(&config).await?;
    let service = ShortenerService::with_settings(
        repository,
        RandomGenerator::new(),
        ShortenerSettings::builder()
            .max_attempts(config.max_attempts)
            .build(),
    );

    run(&service, &config.base_url, config.command).await
}

fn init_tracing(format: LogFormatArg) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormatArg::Text => builder.init(),
        LogFormatArg::Json => builder.json().init(),
    }
}

async fn open_repository(config: &CLI) -> anyhow::Result<Arc<dyn Repository>> {
    let repository: Arc<dyn Repository> = match config.storage {
        StorageBackendArg::InMemory => Arc::new(InMemoryRepository::new()),
        StorageBackendArg::File => {
            let path = config
                .file_storage_path
                .as_ref()
                .context("file storage path is required when storage backend is file")?;
            Arc::new(
                FileRepository::open(path)
                    .with_context(|| format!("failed to open url log at {}", path.display()))?,
            )
        }
        StorageBackendArg::Postgres => {
            let dsn = config
                .database_dsn
                .as_deref()
                .context("database dsn is required when storage backend is postgres")?;
            let repository = PostgresRepository::connect(dsn, PostgresSettings::default())
                .await
                .context("failed to connect to postgres")?;
            repository
                .init_schema()
                .await
                .context("failed to create urls schema")?;
            Arc::new(repository)
        }
    };

    Ok(repository)
}

async fn run(
    service: &ShortenerService<RandomGenerator>,
    base_url: &str,
    command: Command,
) -> anyhow::Result<()> {
    match command {
        Command::Shorten { url, owner } => match service.save(&url, &owner).await {
            Ok(code) => println!("{}", code.to_url(base_url)),
            Err(ShortenerError::UrlAlreadyExists(code)) => {
                println!("{} (already exists)", code.to_url(base_url))
            }
            Err(err) => return Err(err).context("failed to shorten url"),
        },
        Command::Batch { owner, urls } => {
            let owners = vec![owner; urls.len()];
            let saved = service
                .save_batch(&urls, &owners)
                .await
                .context("failed to shorten url batch")?;

            for (url, row) in urls.iter().zip(&saved) {
                let marker = if row.is_created() { "" } else { " (already exists)" };
                println!("{}\t{}{}", url, row.code().to_url(base_url), marker);
            }
        }
        Command::Resolve { code } => {
            let code = ShortCode::new(code)?;
            let record = service
                .get(&code)
                .await
                .with_context(|| format!("failed to resolve {code}"))?;
            println!("{}", record.original_url);
        }
        Command::List { owner } => {
            let mut urls: Vec<_> = service
                .get_all(&owner)
                .await
                .context("failed to list urls")?
                .into_iter()
                .collect();
            urls.sort();

            for (code, url) in urls {
                println!("{}\t{}", code.to_url(base_url), url);
            }
        }
        Command::Ping => {
            service.ping().await.context("storage backend is unreachable")?;
            println!("ok");
        }
    }

    Ok(())
}
