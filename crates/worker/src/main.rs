//! ragworks-worker: run one invocation of a background job.
//!
//! Scheduled externally (cron, queue trigger); each process leases at most one message.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use ragworks_indexing::{IndexingServices, IndexingSettings, JobPublisher, register_handlers};
use ragworks_infra::WorkerConfig;
use ragworks_infra::embedding::HttpEmbeddingClient;
use ragworks_infra::queue::RedisQueueTransport;
use ragworks_infra::repository::{
    PgContext, PostgresBotRepository, PostgresDocumentFolderRepository,
    PostgresDocumentRepository, PostgresTenantRepository,
};
use ragworks_infra::search::HttpSearchClient;
use ragworks_infra::BlockingRuntime;
use ragworks_jobs::{Dispatched, JobDispatcher, JobName};

#[derive(Parser)]
#[command(name = "ragworks-worker")]
#[command(version, about = "Run one invocation of a ragworks background job")]
struct Cli {
    /// Job to run, e.g. `create-embeddings` or `recover-stalled-documents`
    #[arg(long, value_parser = parse_job)]
    job: JobName,
}

fn parse_job(value: &str) -> Result<JobName, String> {
    value.parse().map_err(|_| {
        let known: Vec<&str> = JobName::ALL.iter().map(JobName::as_str).collect();
        format!("unknown job `{value}` (expected one of: {})", known.join(", "))
    })
}

fn main() -> ExitCode {
    // A missing .env file is fine; the environment may be set directly.
    let _ = dotenvy::dotenv();
    ragworks_observability::init();

    let cli = Cli::parse();
    match run(cli.job) {
        Ok(dispatched) => {
            info!(job = %cli.job, ?dispatched, "job invocation finished");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(job = %cli.job, error = %format!("{err:#}"), "job invocation failed");
            ExitCode::FAILURE
        }
    }
}

fn run(job: JobName) -> anyhow::Result<Dispatched> {
    let config = WorkerConfig::from_env().context("loading configuration")?;
    info!(?config, "configuration loaded");

    let runtime = BlockingRuntime::new().context("starting async runtime")?;
    let pg = PgContext::connect(&config.database_url, runtime.clone()).context("connecting to Postgres")?;
    let transport = Arc::new(RedisQueueTransport::new(&config.redis_url).context("opening Redis client")?);

    let services = IndexingServices {
        tenants: Arc::new(PostgresTenantRepository::new(pg.clone())),
        bots: Arc::new(PostgresBotRepository::new(pg.clone())),
        documents: Arc::new(PostgresDocumentRepository::new(pg.clone())),
        folders: Arc::new(PostgresDocumentFolderRepository::new(pg)),
        search: Arc::new(HttpSearchClient::new(
            runtime.clone(),
            config.search_api_key.clone(),
            config.search_api_version.clone(),
        )),
        embeddings: Arc::new(HttpEmbeddingClient::new(
            runtime,
            config.embedding_api_url.clone(),
            config.embedding_api_key.clone(),
            config.embedding_model.clone(),
        )),
        publisher: JobPublisher::new(transport.clone()),
    };

    let mut dispatcher = JobDispatcher::new(transport);
    if let Some(max) = config.max_dequeue_count {
        dispatcher = dispatcher.with_max_dequeue_count(max);
    }
    register_handlers(
        &mut dispatcher,
        &services,
        IndexingSettings {
            stalled_threshold: config.stalled_threshold,
        },
    );

    Ok(dispatcher.execute(job.as_str())?)
}
