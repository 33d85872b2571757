use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scene_finder::{
    config::Config,
    errors::SearchError,
    models::ImageSource,
    services::{SearchOutcome, SearchService},
    utils::human_format::{format_duration, format_similarity},
};

#[derive(Parser)]
#[command(name = "scene-finder")]
#[command(version)]
#[command(about = "Find the anime scene an image was taken from")]
#[command(long_about = None)]
#[command(group(ArgGroup::new("input").required(true).args(["file", "url"])))]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "scene-finder.toml")]
    config: PathBuf,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,

    /// Image file to search with
    #[arg(short, long, value_name = "PATH")]
    file: Option<PathBuf>,

    /// Image URL to search with
    #[arg(short, long, value_name = "URL")]
    url: Option<String>,

    /// Run the same search this many times (later runs hit the cache)
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    repeat: u32,

    /// Print outcomes as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("scene_finder={}", cli.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting scene-finder v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load_from_file(&cli.config)?;
    info!(
        "Configuration loaded from: {} (service: {})",
        cli.config.display(),
        config.service.base_url
    );

    let service = SearchService::from_config(&config)?;

    let shutdown = CancellationToken::new();
    let maintenance = service.start_cache_maintenance(shutdown.clone());

    let source = match (&cli.file, &cli.url) {
        (Some(path), _) => ImageSource::from_path(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?,
        (None, Some(url)) => ImageSource::from_url(url)?,
        (None, None) => unreachable!("clap requires one input"),
    };

    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling search");
            ctrl_c_token.cancel();
        }
    });

    let mut failed = false;
    for run in 1..=cli.repeat {
        if cli.repeat > 1 {
            info!("Search run {}/{}", run, cli.repeat);
        }

        match service.search(&source, &cancel).await {
            Ok(outcome) if cli.json => println!("{}", serde_json::to_string_pretty(&outcome)?),
            Ok(outcome) => print_outcome(&outcome),
            Err(e @ SearchError::Cancelled { .. }) => {
                eprintln!("{e}");
                failed = true;
                break;
            }
            Err(e) => {
                eprintln!("{e}");
                failed = true;
            }
        }
    }

    let metrics = service.metrics();
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&metrics)?);
    } else {
        println!(
            "\nsearches: {} ok, {} failed | cache: {} hit(s), {} miss(es) | avg response: {}",
            metrics.successes,
            metrics.errors,
            metrics.cache_hits,
            metrics.cache_misses,
            metrics
                .average_response_time_ms
                .map(|ms| format_duration(ms.round() as u64))
                .unwrap_or_else(|| "n/a".to_string())
        );
    }

    shutdown.cancel();
    maintenance.await?;

    if failed {
        std::process::exit(1);
    }
    Ok(())
}

fn print_outcome(outcome: &SearchOutcome) {
    for warning in &outcome.warnings {
        println!("warning: {warning}");
    }

    if outcome.ranked.is_empty() {
        println!("No matching scenes found");
        return;
    }

    let origin = if outcome.from_cache {
        "cached".to_string()
    } else {
        format!("{} attempt(s)", outcome.attempts)
    };
    println!("{} match(es) ({origin})", outcome.ranked.len());

    for result in &outcome.ranked {
        let mut line = format!(
            "{:>2}. {:>6}  {}",
            result.rank,
            format_similarity(result.raw.similarity),
            result.title.as_deref().unwrap_or("Unknown title")
        );
        if let Some(episode) = &result.episode_label {
            line.push_str(&format!("  {episode}"));
        }
        if let Some(timestamp) = &result.timestamp_label {
            line.push_str(&format!("  [{timestamp}]"));
        }
        println!("{line}");
    }
}
