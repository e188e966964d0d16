use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use zonewatch::cluster::{default_kubeconfig_path, ClusterConfig, KubeNodeClient};
use zonewatch::config::ObserverConfig;
use zonewatch::server::ObserverServer;

#[derive(Parser)]
#[command(
    name = "zonewatch",
    version,
    about = "Serves the zone and region of cluster nodes grouped by matching label",
    long_about = None
)]
struct Cli {
    /// Use the pod's service account instead of a kubeconfig
    #[arg(
        long,
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value_t = false,
        default_missing_value = "true"
    )]
    in_cluster: bool,

    /// Kubeconfig path (defaults to $KUBECONFIG or ~/.kube/config)
    #[arg(long)]
    kubeconfig: Option<PathBuf>,

    /// Substring matched against node label keys
    #[arg(long = "with-label")]
    with_label: Option<String>,

    /// Address to serve on
    #[arg(long)]
    bind: Option<String>,

    /// Seconds between refresh cycles
    #[arg(long)]
    interval_secs: Option<u64>,

    /// Timeout for one node listing, in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Nodes requested per API page (0 disables paging)
    #[arg(long)]
    page_size: Option<u32>,

    /// Optional TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long)]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(&cli)?;
    setup_tracing(&config, cli.verbose)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "zonewatch starting");

    if let Err(e) = zonewatch::metrics::init_metrics() {
        tracing::warn!(error = %e, "Metrics unavailable");
    }

    let kubeconfig = config.kubeconfig.clone().or_else(default_kubeconfig_path);
    let cluster = ClusterConfig::resolve(config.in_cluster, kubeconfig.as_deref())
        .context("Failed to load cluster configuration")?;

    tracing::info!(
        server = %cluster.server,
        in_cluster = config.in_cluster,
        "Using cluster API"
    );

    let client = KubeNodeClient::new(cluster, config.request_timeout())
        .context("Failed to build cluster client")?
        .with_page_size(config.page_size);

    let server = ObserverServer::new(config, Arc::new(client))
        .context("Failed to create observer server")?;

    println!("{}", server.info().display());
    println!();

    server.start_with_shutdown(shutdown_signal()).await?;

    Ok(())
}

/// File, then environment, then command-line flags
fn load_config(cli: &Cli) -> Result<ObserverConfig> {
    let mut base = match &cli.config {
        Some(path) => ObserverConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ObserverConfig::default(),
    };
    base.apply_env().context("Invalid environment configuration")?;

    let mut builder = ObserverConfig::builder().base(base);

    if cli.in_cluster {
        builder = builder.in_cluster(true);
    }
    if let Some(path) = &cli.kubeconfig {
        builder = builder.kubeconfig(path);
    }
    if let Some(filter) = &cli.with_label {
        builder = builder.label_filter(filter);
    }
    if let Some(addr) = &cli.bind {
        builder = builder.bind_address_str(addr)?;
    }
    if let Some(secs) = cli.interval_secs {
        builder = builder.refresh_interval_secs(secs);
    }
    if let Some(secs) = cli.timeout_secs {
        builder = builder.request_timeout_secs(secs);
    }
    if let Some(size) = cli.page_size {
        builder = builder.page_size(size);
    }
    if let Some(format) = &cli.log_format {
        builder = builder.log_format(format);
    }

    Ok(builder.build()?)
}

/// Filter directives; TraceLayer logs requests at debug under `tower_http`
fn log_filter(level: &str, verbose: bool, request_logging: bool) -> String {
    let mut directives = if verbose {
        String::from("zonewatch=debug,info")
    } else {
        format!("zonewatch={level},warn")
    };

    if request_logging {
        directives.push_str(",tower_http=debug");
    }

    directives
}

fn setup_tracing(config: &ObserverConfig, verbose: bool) -> Result<()> {
    let directives = log_filter(
        &config.logging.level,
        verbose,
        config.enable_request_logging,
    );
    let env_filter =
        tracing_subscriber::EnvFilter::try_new(&directives).context("Invalid log level")?;

    match config.logging.format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM on unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to wait for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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

    tracing::info!("Shutdown signal received");
}
