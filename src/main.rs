use anyhow::Result;
use clap::{Parser, Subcommand};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nginx_viewer_exporter::{
    access_log::{AccessLogParser, LogTailer},
    config::{
        Config, WebConfig,
        defaults::{HLS_GAUGE_HELP, HLS_GAUGE_NAME, RTMP_GAUGE_HELP, RTMP_GAUGE_NAME},
    },
    metrics::ViewerMetrics,
    presence::PresenceTracker,
    rtmp::StatPoller,
    web::WebServer,
};

#[derive(Parser)]
#[command(name = "nginx-viewer-exporter")]
#[command(version)]
#[command(about = "Prometheus exporter for live HLS and RTMP viewers of an nginx streaming server")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Listening IP address for /metrics
    #[arg(short = 'H', long, value_name = "IP", global = true)]
    host: Option<String>,

    /// Listening port for /metrics
    #[arg(short, long, value_name = "PORT", global = true)]
    port: Option<u16>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Count HLS viewers from an nginx access log read on stdin
    Hls {
        /// Time after which an inactive viewer is dropped (e.g. "5s")
        #[arg(long, value_parser = humantime::parse_duration)]
        ttl: Option<Duration>,

        /// Regex for request paths that indicate a viewer
        #[arg(long)]
        path_pattern: Option<String>,
    },
    /// Report the client count of nginx-rtmp's stat endpoint
    Rtmp {
        /// URL of the rtmp_stat page
        #[arg(long, value_name = "URL")]
        stat_url: Option<String>,

        /// Application whose live clients are counted
        #[arg(long)]
        application: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = format!("nginx_viewer_exporter={}", cli.log_level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting nginx viewer exporter v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load_from_file(&cli.config)?;
    info!("Configuration loaded from: {}", cli.config);

    let cancellation_token = CancellationToken::new();
    tokio::spawn(shutdown_on_signal(cancellation_token.clone()));

    match cli.mode {
        Mode::Hls { ttl, path_pattern } => {
            if let Some(ttl) = ttl {
                config.hls.ttl = ttl;
            }
            if let Some(path_pattern) = path_pattern {
                config.hls.path_pattern = path_pattern;
            }
            apply_listen_overrides(&mut config.hls.web, cli.host, cli.port);
            config.validate()?;
            run_hls(config, cancellation_token).await?;
            // A pending blocking stdin read would otherwise keep the runtime alive
            std::process::exit(0);
        }
        Mode::Rtmp {
            stat_url,
            application,
        } => {
            if let Some(stat_url) = stat_url {
                config.rtmp.stat_url = stat_url;
            }
            if let Some(application) = application {
                config.rtmp.application = application;
            }
            apply_listen_overrides(&mut config.rtmp.web, cli.host, cli.port);
            config.validate()?;
            run_rtmp(config, cancellation_token).await
        }
    }
}

fn apply_listen_overrides(web: &mut WebConfig, host: Option<String>, port: Option<u16>) {
    if let Some(host) = host {
        web.host = host;
    }
    if let Some(port) = port {
        web.port = port;
    }
}

/// Follow the access log on stdin until it closes or a shutdown signal arrives
async fn run_hls(config: Config, cancellation_token: CancellationToken) -> Result<()> {
    let metrics = ViewerMetrics::new(HLS_GAUGE_NAME, HLS_GAUGE_HELP)?;
    let server_handle =
        start_web_server(&config.hls.web, metrics.clone(), cancellation_token.clone()).await?;

    let tracker = PresenceTracker::with_sweep_interval(
        config.hls.ttl,
        config.hls.sweep_interval,
        metrics.reporter(),
    );
    info!(
        "Tracking HLS viewers with ttl={} path_pattern={}",
        humantime::format_duration(config.hls.ttl),
        config.hls.path_pattern
    );

    let tailer = LogTailer::new(AccessLogParser::new(&config.hls.path_pattern)?);
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let stats = tailer.run(stdin, &tracker, cancellation_token.clone()).await;
    info!(
        "Access log finished: {} lines, {} viewer requests, {} filtered, {} malformed",
        stats.lines, stats.viewers, stats.filtered, stats.malformed
    );

    cancellation_token.cancel();
    tracker.shutdown().await;
    server_handle.await?;
    Ok(())
}

/// Poll the nginx-rtmp stat endpoint until a shutdown signal arrives
async fn run_rtmp(config: Config, cancellation_token: CancellationToken) -> Result<()> {
    let metrics = ViewerMetrics::new(RTMP_GAUGE_NAME, RTMP_GAUGE_HELP)?;
    let server_handle =
        start_web_server(&config.rtmp.web, metrics.clone(), cancellation_token.clone()).await?;

    let poller = StatPoller::new(&config.rtmp, metrics)?;
    poller.run(cancellation_token.clone()).await;

    cancellation_token.cancel();
    server_handle.await?;
    Ok(())
}

/// Start the metrics endpoint and wait until it is listening
async fn start_web_server(
    web: &WebConfig,
    metrics: ViewerMetrics,
    cancellation_token: CancellationToken,
) -> Result<JoinHandle<()>> {
    let web_server = WebServer::new(web.socket_addr()?, metrics);
    let (server_ready_tx, server_ready_rx) = tokio::sync::oneshot::channel();

    let server_handle = tokio::spawn(async move {
        if let Err(e) = web_server
            .serve_with_cancellation(server_ready_tx, cancellation_token)
            .await
        {
            tracing::error!("Web server failed: {}", e);
        }
    });

    match server_ready_rx.await {
        Ok(Ok(addr)) => {
            info!("Serving metrics on http://{}/metrics", addr);
            Ok(server_handle)
        }
        Ok(Err(bind_error)) => {
            tracing::error!("Failed to bind web server: {}", bind_error);
            Err(bind_error)
        }
        Err(_) => {
            tracing::error!("Web server task completed without signaling");
            Err(anyhow::anyhow!("Web server failed to start"))
        }
    }
}

async fn shutdown_on_signal(cancellation_token: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
                _ => {
                    tracing::warn!("Failed to install signal handlers, shutdown by signal disabled");
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down gracefully"),
            _ = sigint.recv() => info!("Received SIGINT (Ctrl+C), shutting down gracefully"),
        }
    }

    #[cfg(not(unix))]
    {
        if tokio::signal::ctrl_c().await.is_err() {
            tracing::warn!("Failed to install Ctrl+C handler, shutdown by signal disabled");
            return;
        }
        info!("Received Ctrl+C, shutting down gracefully");
    }

    cancellation_token.cancel();
}
