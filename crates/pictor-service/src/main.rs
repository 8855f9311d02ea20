//! pictor: command-line front end for the image recommender.
//!
//! Feedback is matched against the query cache, so `feedback` for a query
//! produced by an earlier `recommend` run needs Redis (`REDIS_URL`).

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use pictor_core::{RecommendationRequest, Theme};
use pictor_search::cancellable;
use pictor_service::{Pictor, ServiceConfig};

#[derive(Parser)]
#[command(name = "pictor")]
#[command(author, version, about = "Prompt-driven image recommendations")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recommend images for a prompt and print the response as JSON
    Recommend {
        /// Free-text prompt
        #[arg(short, long)]
        prompt: String,

        /// Number of results (1-50, default 4)
        #[arg(short, long, default_value_t = 0)]
        count: usize,

        /// Style theme (none, cartoon, realistic, minimal, fantasy, retro, scifi, nature, business)
        #[arg(short, long, default_value = "none")]
        theme: Theme,

        /// Never generate images to fill a short result
        #[arg(long)]
        search_only: bool,

        /// User id; enables history filtering
        #[arg(short, long)]
        user: Option<i64>,

        /// Session id for session-scoped filtering
        #[arg(short, long, requires = "user")]
        session: Option<String>,
    },

    /// Submit the image chosen from a recommendation
    Feedback {
        /// Query id from the recommend response
        #[arg(short, long)]
        query_id: Uuid,

        /// Chosen image id
        #[arg(short, long)]
        image_id: i64,
    },

    /// Check the algorithm service
    Health,

    /// Show a user's recommendation stats
    Stats {
        #[arg(short, long)]
        user: i64,

        /// Window in days (default: the filter window)
        #[arg(short, long)]
        days: Option<i64>,
    },
}

/// Initialize tracing with configurable output.
///
/// Environment variables:
///   LOG_FORMAT  - "json" or "text" (default: "text")
///   LOG_FILE    - path to log file (optional, enables daily-rolling file logging)
///   LOG_ANSI    - "true"/"false" override ANSI colors
///   RUST_LOG    - standard env filter (default: "pictor=info")
fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "pictor=info,pictor_service=info,pictor_search=info,pictor_inference=info".into()
    });
    let registry = tracing_subscriber::registry().with(env_filter);

    match log_file {
        Some(ref path) => {
            let path = std::path::Path::new(path);
            let dir = path.parent().unwrap_or(std::path::Path::new("."));
            let file_name = path
                .file_name()
                .and_then(|f| f.to_str())
                .unwrap_or("pictor.log");
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, file_name));

            if log_format == "json" {
                registry
                    .with(tracing_subscriber::fmt::layer().json().with_writer(writer))
                    .init();
            } else {
                registry
                    .with(
                        tracing_subscriber::fmt::layer()
                            .with_writer(writer)
                            .with_ansi(log_ansi.unwrap_or(false)),
                    )
                    .init();
            }
            Some(guard)
        }
        None => {
            // stdout carries command output, logs go to stderr
            if log_format == "json" {
                registry
                    .with(
                        tracing_subscriber::fmt::layer()
                            .json()
                            .with_writer(std::io::stderr),
                    )
                    .init();
            } else {
                let mut layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
                if let Some(ansi) = log_ansi {
                    layer = layer.with_ansi(ansi);
                }
                registry.with(layer).init();
            }
            None
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let _log_guard = init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let pictor = Pictor::start(ServiceConfig::from_env()).await?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, cancelling");
            on_signal.cancel();
        }
    });

    let outcome = execute(&pictor, &cancel, cli.command).await;
    pictor.shutdown().await;
    outcome
}

async fn execute(pictor: &Pictor, cancel: &CancellationToken, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Recommend {
            prompt,
            count,
            theme,
            search_only,
            user,
            session,
        } => {
            let mut request = RecommendationRequest::new(prompt)
                .with_count(count)
                .with_theme(theme)
                .search_only(search_only);
            if let Some(user_id) = user {
                request = request.for_user(user_id, session);
            }
            let response = pictor.recommendations.recommend(cancel, request).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Commands::Feedback { query_id, image_id } => {
            cancellable(cancel, pictor.feedback.submit_feedback(query_id, image_id)).await?;
            println!("feedback recorded for {}", query_id);
        }
        Commands::Health => {
            let healthy = pictor.algorithm.health_check().await?;
            println!(
                "algorithm service: {}",
                if healthy { "ok" } else { "unavailable" }
            );
            if !healthy {
                anyhow::bail!("algorithm service is unavailable");
            }
        }
        Commands::Stats { user, days } => {
            let stats = pictor.recommendations.filter_stats(user, days).await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }
    Ok(())
}
