use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use harvester_client::{ErApiConverter, ExtractorRegistry, PolygonClient, ReqwestFetcher};
use harvester_core::orchestrator::OrchestratorConfig;
use harvester_core::task_queue::TaskQueue;
use harvester_core::traits::ListingExtractor;
use harvester_core::{
    ConsumerConfig, FetchOrchestrator, IsolatedFetcher, ParserConfig, ProxyConfig, ProxyPool,
    QueueConsumer, TaskValidator, TracingConsumerReporter,
};
use harvester_db::{Database, DatabaseConfig};

/// Extra time the isolated worker gets on top of the HTTP timeout.
const WORKER_GRACE: Duration = Duration::from_secs(5);

/// Extraction, enrichment and storage time on top of the fetch attempts.
const SETTLE_MARGIN: Duration = Duration::from_secs(60);

#[derive(Parser)]
#[command(name = "harvester", version, about = "Resilient listing fetch-and-extract pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Consume listing URLs from the work queue until Ctrl-C
    Consume {
        /// Queue to consume from
        #[arg(short, long, env = "QUEUE_NAME", default_value = "post")]
        queue: String,

        /// Consumer identifier (random when not set)
        #[arg(long, env = "CONSUMER_ID")]
        consumer_id: Option<String>,

        /// Seconds between polls of an empty queue
        #[arg(long, env = "POLL_INTERVAL_SECS", default_value_t = 5)]
        poll_interval: u64,

        /// Seconds before an unsettled claim is handed to another consumer
        /// (never less than the worst-case time for one task)
        #[arg(long, env = "VISIBILITY_TIMEOUT_SECS")]
        visibility_timeout: Option<u64>,
    },

    /// Publish listing URLs to the work queue
    Enqueue {
        /// URLs to publish
        urls: Vec<String>,

        /// File with one URL per line
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Queue to publish to
        #[arg(short, long, env = "QUEUE_NAME", default_value = "post")]
        queue: String,
    },

    /// Extract a saved listing page and print the record as JSON
    Extract {
        /// Saved HTML document
        #[arg(short, long)]
        file: PathBuf,

        /// URL the document was fetched from
        #[arg(short, long)]
        url: String,
    },

    /// Show queue depth and the number of stored listings
    Status {
        #[arg(short, long, env = "QUEUE_NAME", default_value = "post")]
        queue: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("harvester=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Consume {
            queue,
            consumer_id,
            poll_interval,
            visibility_timeout,
        } => {
            cmd_consume(
                &queue,
                consumer_id,
                Duration::from_secs(poll_interval),
                visibility_timeout.map(Duration::from_secs),
            )
            .await?
        }
        Commands::Enqueue { urls, file, queue } => {
            cmd_enqueue(urls, file.as_deref(), &queue).await?
        }
        Commands::Extract { file, url } => cmd_extract(&file, &url).await?,
        Commands::Status { queue } => cmd_status(&queue).await?,
    }

    Ok(())
}

async fn connect_db() -> Result<Database> {
    let config = DatabaseConfig::from_env().map_err(|e| anyhow::anyhow!(e))?;
    let db = Database::connect(&config)
        .await
        .context("Failed to connect to database")?;
    db.health_check()
        .await
        .context("Database health check failed")?;
    db.migrate().await.map_err(|e| anyhow::anyhow!(e))?;
    Ok(db)
}

fn build_registry(
    config: &ParserConfig,
) -> Result<ExtractorRegistry<PolygonClient, ErApiConverter>> {
    let enricher = PolygonClient::new(&config.enrichment_url, config.request_timeout)
        .context("Failed to create enrichment client")?;
    let converter =
        ErApiConverter::new(config.request_timeout).context("Failed to create currency client")?;
    ExtractorRegistry::with_default_variants(enricher, converter)
        .context("Failed to build extractor registry")
}

/// Worst case for one task: every attempt runs to the isolated worker's
/// deadline, plus time for extraction and storage.
fn min_visibility_timeout(parser: &ParserConfig) -> Duration {
    (parser.request_timeout + WORKER_GRACE) * parser.max_retries.max(1) + SETTLE_MARGIN
}

async fn cmd_consume(
    queue: &str,
    consumer_id: Option<String>,
    poll_interval: Duration,
    visibility_timeout: Option<Duration>,
) -> Result<()> {
    let parser = ParserConfig::from_env().map_err(|e| anyhow::anyhow!(e))?;
    let proxies = ProxyConfig::from_env().map_err(|e| anyhow::anyhow!(e))?;
    let db = connect_db().await?;

    let pool = Arc::new(ProxyPool::from_addresses(proxies.ips.iter().cloned()));
    let fetcher = IsolatedFetcher::new(
        ReqwestFetcher::from_config(&proxies, parser.request_timeout),
        parser.max_concurrent_fetches,
        parser.request_timeout + WORKER_GRACE,
    );
    let orchestrator = FetchOrchestrator::new(
        pool,
        fetcher,
        build_registry(&parser)?,
        OrchestratorConfig {
            max_retries: parser.max_retries,
            block_on_forbidden: parser.block_on_forbidden,
        },
    );

    let mut config = ConsumerConfig::default()
        .with_poll_interval(poll_interval)
        .with_skip_known_urls(parser.skip_known_urls);
    if let Some(id) = consumer_id {
        config = config.with_consumer_id(id);
    }

    let floor = min_visibility_timeout(&parser);
    let visibility_timeout = visibility_timeout.map_or(floor, |t| t.max(floor));
    let task_queue = db.task_queue(queue).with_visibility_timeout(visibility_timeout);

    let consumer = QueueConsumer::new(
        task_queue,
        orchestrator,
        db.listing_repo(),
        TaskValidator::new(&parser.allowed_domains),
        config,
    );

    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Shutdown signal received"),
            Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl-C, shutting down"),
        }
        token.cancel();
    });

    tracing::info!(
        queue,
        consumer_id = consumer.consumer_id(),
        proxies = proxies.ips.len(),
        visibility_timeout_secs = visibility_timeout.as_secs(),
        "Starting consumer"
    );
    consumer
        .run(cancel, &TracingConsumerReporter)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    Ok(())
}

async fn cmd_enqueue(mut urls: Vec<String>, file: Option<&Path>, queue: &str) -> Result<()> {
    if let Some(path) = file {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read URL list: {}", path.display()))?;
        urls.extend(contents.lines().map(str::to_string));
    }

    let urls: Vec<String> = urls
        .into_iter()
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty() && !u.starts_with('#'))
        .collect();
    if urls.is_empty() {
        anyhow::bail!("No URLs given. Pass them as arguments or with --file.");
    }

    let db = connect_db().await?;
    let task_queue = db.task_queue(queue);

    for url in &urls {
        let delivery = task_queue
            .publish(url)
            .await
            .map_err(|e| anyhow::anyhow!(e))?;
        tracing::debug!(id = %delivery.id, %url, "Published");
    }

    let depth = task_queue.depth().await.map_err(|e| anyhow::anyhow!(e))?;
    println!("Published {} URL(s) to '{queue}' (pending: {depth})", urls.len());

    Ok(())
}

async fn cmd_extract(file: &Path, url: &str) -> Result<()> {
    let html = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read document: {}", file.display()))?;

    let parser = ParserConfig::from_env().map_err(|e| anyhow::anyhow!(e))?;
    let registry = build_registry(&parser)?;

    let listing = registry
        .extract(url, &html)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    tracing::info!(
        external_id = %listing.header.external_id,
        property = %listing.header.type_of_property,
        content_hash = %&listing.content_hash[..8],
        "Extraction complete"
    );

    println!("{}", serde_json::to_string_pretty(&listing)?);

    Ok(())
}

async fn cmd_status(queue: &str) -> Result<()> {
    let db = connect_db().await?;
    let task_queue = db.task_queue(queue);

    let pending = task_queue.depth().await.map_err(|e| anyhow::anyhow!(e))?;
    let in_flight = task_queue.in_flight().await.map_err(|e| anyhow::anyhow!(e))?;
    let stored = db
        .listing_repo()
        .count()
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    println!("Queue '{queue}':");
    println!("  pending:   {pending}");
    println!("  in flight: {in_flight}");
    println!("Stored listings: {stored}");

    Ok(())
}
