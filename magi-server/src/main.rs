use anyhow::{bail, Result};
use clap::Parser;
use magi_core::UnitRoster;
use magi_engine::{slots_from_env, Orchestrator};
use magi_server::{load_reference_context, ApiServer, AppState, ServerConfig};
use magi_services::{alert_sink_from_env, SecurityConfig, SweepTask};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "magi-server")]
#[command(about = "HTTP server fanning prompts out to the MAGI units")]
struct Cli {
    /// Server host to bind to
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Server port to bind to
    #[arg(long, default_value = "8080")]
    port: u16,

    /// Reference document prepended to every consensus prompt
    #[arg(long)]
    context_file: Option<PathBuf>,

    /// Unit whose provider merges answers in integration and synthesis modes
    #[arg(long, default_value = "mary")]
    judge: String,

    /// Run without a judge; integration and synthesis then fail
    #[arg(long)]
    no_judge: bool,

    /// Rate limit window in seconds
    #[arg(long, default_value = "60")]
    window_secs: i64,

    /// Requests per window before rate limiting
    #[arg(long, default_value = "60")]
    max_requests: u32,

    /// Requests per window on /admin routes
    #[arg(long, default_value = "10")]
    admin_max_requests: u32,

    /// Requests per window before the source is blocked
    #[arg(long, default_value = "200")]
    block_threshold: u32,

    /// Block duration in minutes
    #[arg(long, default_value = "30")]
    block_minutes: i64,

    /// Service name reported by /health and in alerts
    #[arg(long, default_value = "magi-consensus")]
    service_name: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "magi_server={},magi_engine={},magi_services={},magi_core={},tower_http={}",
                cli.log_level, cli.log_level, cli.log_level, cli.log_level, cli.log_level
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("🚀 MAGI Consensus Server Starting");
    tracing::info!("Configuration:");
    tracing::info!("  Host: {}", cli.host);
    tracing::info!("  Port: {}", cli.port);
    tracing::info!("  Judge: {}", if cli.no_judge { "none" } else { cli.judge.as_str() });
    tracing::info!("  Rate limit: {}/{}s (admin {})", cli.max_requests, cli.window_secs, cli.admin_max_requests);
    tracing::info!("  Block: >{} requests for {}min", cli.block_threshold, cli.block_minutes);

    let judge = (!cli.no_judge).then(|| cli.judge.clone());
    let roster = UnitRoster::magi_default().with_judge(judge.clone());
    if let Some(judge) = &judge {
        if roster.get(judge).is_none() {
            bail!("Unknown judge unit '{}', expected one of {:?}", judge, roster.unit_ids());
        }
    }

    let context = load_reference_context(cli.context_file.as_deref())?;
    let orchestrator = Orchestrator::new(slots_from_env(&roster))
        .with_judge_unit(judge.as_deref())
        .with_reference_context(context);

    if judge.is_some() && orchestrator.judge().is_none() {
        tracing::warn!("Judge unit has no credential; integration and synthesis will fail");
    }

    let config = ServerConfig {
        host: cli.host,
        port: cli.port,
        service_name: cli.service_name.clone(),
        status_top_n: 10,
        security: SecurityConfig {
            window: chrono::Duration::seconds(cli.window_secs.max(1)),
            max_requests: cli.max_requests,
            admin_max_requests: cli.admin_max_requests,
            block_threshold: cli.block_threshold,
            block_duration: chrono::Duration::minutes(cli.block_minutes.max(1)),
            service_name: cli.service_name,
            ..SecurityConfig::default()
        },
    };

    let sweep_interval = config.security.sweep_interval;
    let server = ApiServer::new(AppState::new(orchestrator, alert_sink_from_env(), config));
    let sweeper = SweepTask::spawn(server.state().gate.clone(), sweep_interval);

    server.serve(shutdown_signal()).await?;
    sweeper.shutdown().await;

    tracing::info!("✅ MAGI Consensus Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
