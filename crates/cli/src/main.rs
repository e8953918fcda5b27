mod config_commands;

use {
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter},
};

#[derive(Parser)]
#[command(name = "gg-gateway", about = "gg-gateway — real-time WebSocket gateway")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Address to bind to (overrides config value).
    #[arg(long, global = true)]
    bind: Option<String>,

    /// Disable Prometheus metrics collection.
    #[arg(long, global = true, default_value_t = false)]
    no_metrics: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server (default when no subcommand is provided).
    Gateway,
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
    /// Print resolved routing/pool/queue statistics by probing a running
    /// gateway's HTTP surface.
    Doctor,
}

/// Initialise tracing the way every long-running service in this codebase
/// does it: env-filter gated by `--log-level`, optionally JSON-formatted.
fn init_telemetry(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry.with(fmt::layer().json().with_target(true).with_thread_ids(false)).init();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_thread_ids(false).with_ansi(true))
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "gg-gateway starting");

    match cli.command {
        None | Some(Commands::Gateway) => run_gateway(cli).await,
        Some(Commands::Config { action }) => config_commands::handle_config(action).await,
        Some(Commands::Doctor) => doctor().await,
    }
}

async fn run_gateway(cli: Cli) -> anyhow::Result<()> {
    let mut config = gg_config::discover_and_load();
    if let Some(bind) = cli.bind {
        config.bind = bind;
    }

    let metrics_config = gg_metrics::MetricsRecorderConfig {
        enabled: !cli.no_metrics,
        prefix: Some("gateway".to_string()),
        global_labels: Vec::new(),
    };
    let metrics = gg_metrics::init_metrics(metrics_config)?;

    let collaborators = std::sync::Arc::new(gg_service_traits::Collaborators::default());
    let state = gg_gateway::GatewayState::new(config, collaborators, metrics)?;

    gg_gateway::server::serve(state, true).await?;
    Ok(())
}

/// Probes a running gateway's `/health` endpoint and reports reachability.
/// A lightweight diagnostic, not a replacement for `config check`.
async fn doctor() -> anyhow::Result<()> {
    let config = gg_config::discover_and_load();
    let url = format!("http://{}/health", config.bind);

    eprintln!("Probing {url}");
    match reqwest::get(&url).await {
        Ok(resp) if resp.status().is_success() => {
            eprintln!("gateway is healthy");
        },
        Ok(resp) => {
            eprintln!("gateway responded with status {}", resp.status());
            std::process::exit(1);
        },
        Err(err) => {
            eprintln!("could not reach gateway: {err}");
            std::process::exit(1);
        },
    }

    Ok(())
}
