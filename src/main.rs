use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use sysmon::collector::Collector;
use sysmon::config::{Config, Overrides};
use sysmon::http::{self, LatestSnapshot};
use sysmon::metrics::Metrics;
use sysmon::monitor::Monitor;
use sysmon::render::{JsonRenderer, Renderer, TerminalRenderer};
use sysmon::snapshot_log::SnapshotLog;
use sysmon::sources;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sysmon")]
#[command(version, about = "Real-time CPU, memory, disk and network monitor")]
struct Cli {
    /// YAML or JSON config file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Refresh interval, e.g. 500ms, 1s, 2m
    #[arg(long, value_parser = humantime::parse_duration)]
    interval: Option<Duration>,
    /// Print snapshots as JSON lines
    #[arg(long)]
    json: bool,
    /// Append snapshots to this file as JSON lines
    #[arg(long)]
    log_file: Option<PathBuf>,
    /// Serve /metrics and /api/snapshot on host:port
    #[arg(long)]
    listen: Option<String>,
    #[arg(long)]
    cpu_threshold: Option<f64>,
    #[arg(long)]
    mem_threshold: Option<f64>,
    #[arg(long)]
    disk_threshold: Option<f64>,
    #[arg(long)]
    print_default_config: bool,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            interval: self.interval,
            json: self.json.then_some(true),
            log_file: self.log_file.clone(),
            listen: self.listen.clone(),
            cpu_threshold: self.cpu_threshold,
            memory_threshold: self.mem_threshold,
            disk_threshold: self.disk_threshold,
        }
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    if cli.print_default_config {
        println!("{}", Config::example_yaml());
        return;
    }

    let cfg = match Config::resolve(cli.config.as_deref(), &cli.overrides()) {
        Ok(cfg) => cfg,
        Err(err) => {
            error!(error = %err, "failed to load configuration");
            std::process::exit(1);
        }
    };

    let source = match sources::native_source() {
        Ok(source) => source,
        Err(err) => {
            error!(error = %err, "failed to create stats source");
            std::process::exit(1);
        }
    };

    info!(
        interval = %humantime::format_duration(cfg.interval),
        json = cfg.json,
        "starting sysmon"
    );

    let renderer: Box<dyn Renderer> = if cfg.json {
        Box::new(JsonRenderer::new(std::io::stdout()))
    } else {
        Box::new(TerminalRenderer::stdout(cfg.thresholds))
    };
    let mut monitor = Monitor::new(renderer);

    if let Some(path) = &cfg.log_file {
        match SnapshotLog::open(path) {
            Ok(log) => monitor = monitor.with_log(log),
            Err(err) => {
                warn!(error = %err, path = %path.display(), "snapshot log disabled");
            }
        }
    }

    let cancel = CancellationToken::new();

    let http_task = match &cfg.listen {
        Some(listen) => match Metrics::new() {
            Ok(metrics) => {
                let latest = LatestSnapshot::default();
                monitor = monitor.with_exporter(metrics.clone(), latest.clone());
                Some(spawn_http(listen.clone(), metrics, latest, cancel.clone()))
            }
            Err(err) => {
                error!(error = %err, "failed to initialise metrics");
                std::process::exit(1);
            }
        },
        None => None,
    };

    let (snapshot_tx, snapshot_rx) = mpsc::channel(1);
    let collector_task = tokio::spawn(Collector::new(source).run(
        cfg.interval,
        snapshot_tx,
        cancel.child_token(),
    ));
    let consumer_task = tokio::spawn(async move {
        monitor.consume(snapshot_rx).await;
        monitor
    });

    wait_for_shutdown_signal().await;
    info!("shutting down");
    cancel.cancel();

    let _ = collector_task.await;
    match consumer_task.await {
        Ok(monitor) => {
            if let Err(err) = monitor.stop() {
                warn!(error = %err, "failed to close outputs");
            }
        }
        Err(err) => error!(error = %err, "consumer task failed"),
    }
    if let Some(task) = http_task {
        let _ = task.await;
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn spawn_http(
    listen: String,
    metrics: std::sync::Arc<Metrics>,
    latest: LatestSnapshot,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let listener = match http::bind(&listen).await {
            Ok(l) => l,
            Err(err) => {
                error!(error = %err, listen = %listen, "failed to start HTTP server");
                return;
            }
        };

        let app = http::build_router(metrics, latest);
        if let Err(err) = http::serve(listener, app, cancel).await {
            error!(error = %err, "HTTP server error");
        }
    })
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
