//! CLI argument parsing and command dispatch

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use clap::{Parser, Subcommand};
use tracebench_core::{
    BenchConfig, BenchmarkOptions, BenchmarkRegistry, BenchmarkState, FanoutMetrics,
    PrometheusMetrics, RecordingMetrics, ScalingProfile,
};

/// How often a running benchmark is polled for completion
const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Parser)]
#[command(name = "tracebench")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a benchmark plan
    Run {
        /// Path to the JSON plan
        #[arg(short, long)]
        config: PathBuf,

        /// Benchmark name, also the pool name in service.name
        #[arg(short, long, default_value = "default")]
        name: String,

        /// Stop after this long (e.g. "90s", "10m")
        #[arg(short, long)]
        duration: Option<humantime::Duration>,

        /// Directory for the result log
        #[arg(long, env = "TRACEBENCH_LOG_DIR")]
        log_dir: Option<PathBuf>,

        /// Serve Prometheus metrics on this address
        #[arg(long)]
        metrics_addr: Option<SocketAddr>,

        /// Seed for reproducible traces
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Validate a plan file
    Validate {
        /// Path to the JSON plan
        #[arg(short, long)]
        config: PathBuf,
    },
}

/// Execute the parsed command
pub async fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run {
            config,
            name,
            duration,
            log_dir,
            metrics_addr,
            seed,
        } => {
            let plan = load_plan(&config)?;
            let options = RunOptions {
                name,
                duration: duration.map(Into::into),
                log_dir,
                metrics_addr,
                seed,
            };
            run(plan, options).await
        }
        Commands::Validate { config } => validate(&config),
    }
}

fn load_plan(path: &Path) -> Result<BenchConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read plan {}", path.display()))?;
    let plan: BenchConfig = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse plan {}", path.display()))?;
    plan.validate()
        .with_context(|| format!("Invalid plan {}", path.display()))?;
    Ok(plan)
}

fn validate(path: &Path) -> Result<()> {
    let plan = load_plan(path)?;
    match ScalingProfile::from_config(&plan) {
        ScalingProfile::FixedRate {
            workers_per_tick,
            tick,
        } => println!(
            "{}: valid, {} workers every {}",
            path.display(),
            workers_per_tick,
            humantime::format_duration(tick)
        ),
        ScalingProfile::Steps(steps) => {
            let total: usize = steps.iter().map(|s| s.number_workers).sum();
            let length: Duration = steps.iter().map(|s| s.duration).sum();
            println!(
                "{}: valid, {} steps, {} workers over {}",
                path.display(),
                steps.len(),
                total,
                humantime::format_duration(length)
            );
        }
    }
    Ok(())
}

struct RunOptions {
    name: String,
    duration: Option<Duration>,
    log_dir: Option<PathBuf>,
    metrics_addr: Option<SocketAddr>,
    seed: Option<u64>,
}

async fn run(plan: BenchConfig, opts: RunOptions) -> Result<()> {
    let recording = Arc::new(RecordingMetrics::new());
    let prometheus =
        Arc::new(PrometheusMetrics::new().context("Failed to register Prometheus metrics")?);
    let metrics = FanoutMetrics::new()
        .with_sink(recording.clone())
        .with_sink(prometheus.clone());

    let metrics_server = match opts.metrics_addr {
        Some(addr) => Some(serve_metrics(addr, prometheus).await?),
        None => None,
    };

    let mut options = BenchmarkOptions::default().with_metrics(Arc::new(metrics));
    if let Some(dir) = opts.log_dir {
        options = options.with_log_dir(dir);
    }
    if let Some(seed) = opts.seed {
        options = options.with_seed(seed);
    }

    let registry = BenchmarkRegistry::new(options);
    let benchmark = registry.get_or_create(&opts.name);
    benchmark.configure(plan).await?;
    benchmark
        .start()
        .await
        .with_context(|| format!("Failed to start benchmark {}", opts.name))?;

    let status = benchmark.status().await;
    tracing::info!(
        benchmark = %opts.name,
        log = %status.log_file,
        max_step = status.max_step,
        "Benchmark running, press Ctrl+C to stop"
    );

    let deadline = opts.duration.map(|d| tokio::time::Instant::now() + d);
    let mut poll = tokio::time::interval(POLL_INTERVAL);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl+C, stopping");
                break;
            }
            _ = async {
                match deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            } => {
                tracing::info!("Duration elapsed, stopping");
                break;
            }
            _ = poll.tick() => {
                if benchmark.state().await == BenchmarkState::Finished {
                    tracing::info!("Plan finished, stopping");
                    break;
                }
            }
        }
    }

    let log_file = benchmark.status().await.log_file;
    let stats = benchmark.stop().await?;
    let snapshot = recording.snapshot(&opts.name);

    if let Some(server) = metrics_server {
        server.abort();
    }

    let summary = serde_json::json!({
        "benchmark": opts.name,
        "logFile": log_file,
        "workers": stats,
        "metrics": snapshot,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn metrics_handler(
    State(prometheus): State<Arc<PrometheusMetrics>>,
) -> Result<String, StatusCode> {
    prometheus.encode().map_err(|e| {
        tracing::error!(error = %e, "Failed to encode metrics");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

async fn serve_metrics(
    addr: SocketAddr,
    prometheus: Arc<PrometheusMetrics>,
) -> Result<tokio::task::JoinHandle<()>> {
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(prometheus);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind metrics listener on {addr}"))?;
    tracing::info!(%addr, "Serving metrics");

    Ok(tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "Metrics server stopped");
        }
    }))
}
