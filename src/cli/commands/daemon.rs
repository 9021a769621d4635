//! `taskforge daemon`: the thin driver that repeatedly calls the dispatcher
//! and monitor ticks (spec §4.9 Expansion — "a thin driver ... calls it
//! repeatedly").

use anyhow::Result;
use chrono::Utc;
use clap::Args;
use tokio::time::{interval, Duration};
use tracing::{info, warn};

use crate::cli::CliContext;

#[derive(Args, Debug)]
pub struct DaemonArgs {
    /// Run a single tick and exit, instead of looping (for cron-style invocation)
    #[arg(long)]
    pub once: bool,
}

pub async fn run(args: DaemonArgs, ctx: &CliContext) -> Result<()> {
    if args.once {
        run_tick(ctx).await;
        return Ok(());
    }

    let tick_interval = Duration::from_secs(ctx.orchestrator.tick_interval_secs());
    let mut ticker = interval(tick_interval);

    info!(interval_secs = tick_interval.as_secs(), "daemon started");
    loop {
        tokio::select! {
            _ = ticker.tick() => run_tick(ctx).await,
            _ = tokio::signal::ctrl_c() => {
                info!("daemon received shutdown signal, exiting");
                return Ok(());
            }
        }
    }
}

async fn run_tick(ctx: &CliContext) {
    match ctx.orchestrator.tick().await {
        Ok(summary) => info!(
            spawned = summary.spawned,
            promoted_to_ready = summary.promoted_to_ready,
            zombies_reaped = summary.zombies_reaped,
            locks_reaped = summary.locks_reaped,
            "dispatcher tick"
        ),
        Err(e) => warn!(error = %e, "dispatcher tick failed"),
    }

    match ctx.monitor.tick(Utc::now()).await {
        Ok(actions) => {
            let interrupted = actions.iter().filter(|(_, a)| *a == crate::services::MonitorAction::Interrupt).count();
            if interrupted > 0 {
                info!(interrupted, "monitor tick interrupted stalled sessions");
            }
        }
        Err(e) => warn!(error = %e, "monitor tick failed"),
    }
}
