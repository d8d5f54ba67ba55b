mod api;
mod engine;
mod logging;
mod scheduler;
#[cfg(test)]
mod test_support;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use confirma_channels::GatewayClient;
use confirma_core::{appointment::ReplyEvent, config};
use confirma_legacy::{SqlAgenda, SqlFeed};
use confirma_memory::Store;
use tracing::{info, warn};

use engine::{Engine, JobKind};
use scheduler::{RunOutcome, Scheduler};

#[derive(Parser)]
#[command(
    name = "confirma",
    version,
    about = "Appointment confirmation reminders with reply reconciliation"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file.
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler and the webhook API until Ctrl-C.
    Start,
    /// Execute one pass now and print its report.
    Run {
        /// feed, followup or expiry.
        job: JobKind,
    },
    /// Reconcile a patient reply by hand.
    Reply {
        #[arg(long)]
        phone: String,
        /// 1 confirms, 0 cancels.
        #[arg(long)]
        code: String,
        #[arg(long)]
        sequence: Option<i64>,
        #[arg(long)]
        schedule_key: Option<i64>,
    },
    /// Show configuration summary and Dedupe Store statistics.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load(&cli.config)?;
    let _log_guard = logging::init(&cfg.service);

    match cli.command {
        Commands::Start => {
            let engine = Arc::new(build_engine(cfg.clone()).await?);
            let scheduler = Arc::new(Scheduler::new(engine.clone()));

            if cfg.scheduler.enabled {
                scheduler.start().await;
            } else {
                warn!("scheduler disabled in config; serving replies only");
            }

            let (stop_tx, mut stop_rx) = tokio::sync::watch::channel(false);
            let api_handle = if cfg.api.enabled {
                let state = api::ApiState::new(engine.clone(), scheduler.clone(), &cfg.api);
                let api_config = cfg.api.clone();
                Some(tokio::spawn(async move {
                    let shutdown = async move {
                        let _ = stop_rx.changed().await;
                    };
                    api::serve(&api_config, state, shutdown).await;
                }))
            } else {
                None
            };

            info!("{} running; press Ctrl-C to stop", cfg.service.name);
            tokio::signal::ctrl_c().await?;
            info!("shutdown requested");

            scheduler.stop().await;
            let _ = stop_tx.send(true);
            if let Some(handle) = api_handle {
                let _ = handle.await;
            }
            info!("shutdown complete");
        }
        Commands::Run { job } => {
            let scheduler = Scheduler::new(Arc::new(build_engine(cfg).await?));
            match scheduler.run_now(job).await {
                RunOutcome::Completed { report } => {
                    println!("{report}");
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
                RunOutcome::Failed { error } => anyhow::bail!("{job} run failed: {error}"),
                RunOutcome::Skipped => println!("{job} is already running"),
            }
        }
        Commands::Reply {
            phone,
            code,
            sequence,
            schedule_key,
        } => {
            let engine = build_engine(cfg).await?;
            let event = ReplyEvent {
                phone,
                reply_code: code,
                sequence_number: sequence,
                schedule_key,
            };
            let result = engine.reconcile(&event).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            if result.is_partial_failure() {
                anyhow::bail!("reply only partially applied");
            }
        }
        Commands::Status => {
            println!("Confirma: status\n");
            println!("Config: {}", cli.config);
            println!("Store: {}", config::shellexpand(&cfg.store.db_path));
            println!(
                "Clinic database: {}",
                if cfg.legacy.url.is_empty() {
                    "not configured"
                } else {
                    "configured"
                }
            );
            println!(
                "Gateway: {} ({})",
                cfg.gateway.base_url,
                if cfg.gateway.api_key.is_empty() {
                    "no api key"
                } else {
                    "api key set"
                }
            );
            println!(
                "Scheduler: {} (feed {}s, followup {}s, expiry {}s)",
                if cfg.scheduler.enabled { "enabled" } else { "disabled" },
                cfg.scheduler.feed_interval_secs,
                cfg.scheduler.followup_interval_secs,
                cfg.scheduler.expiry_interval_secs
            );
            println!(
                "API: {}",
                if cfg.api.enabled {
                    format!("{}:{}", cfg.api.host, cfg.api.port)
                } else {
                    "disabled".to_string()
                }
            );
            println!();

            let store = Store::new(&cfg.store).await?;
            let stats = store.stats().await?;
            println!("Reminders recorded: {}", stats.total);
            for (kind, count) in &stats.by_kind {
                println!("  {kind}: {count}");
            }
            println!("Replies recorded: {}", stats.replied);
        }
    }

    Ok(())
}

/// Wire the engine from config. The clinic database is optional.
async fn build_engine(cfg: config::Config) -> anyhow::Result<Engine> {
    let store = Store::new(&cfg.store).await?;
    if cfg.gateway.api_key.is_empty() {
        warn!("gateway api key is empty; sends will be rejected");
    }
    let messenger = Arc::new(GatewayClient::new(&cfg.gateway)?);

    let legacy = if cfg.legacy.url.trim().is_empty() {
        warn!("no clinic database configured; feed pass disabled, replies recorded locally");
        None
    } else {
        Some(confirma_legacy::connect(&cfg.legacy)?)
    };

    let mut engine = Engine::new(cfg.clone(), store, messenger);
    if let Some(pool) = legacy {
        engine = engine
            .with_feed(Arc::new(SqlFeed::new(pool.clone(), &cfg.legacy)))
            .with_agenda(Arc::new(SqlAgenda::new(pool, &cfg.legacy)));
    }
    Ok(engine)
}
