//! `taskforge session` subcommands.

use anyhow::{anyhow, Result};
use clap::{Args, Subcommand};
use serde::Serialize;
use uuid::Uuid;

use crate::cli::output::{emit, CommandOutput};
use crate::cli::table;
use crate::cli::CliContext;
use crate::domain::models::{AgentSession, Heartbeat};

#[derive(Args, Debug)]
pub struct SessionArgs {
    #[command(subcommand)]
    pub command: SessionCommands,
}

#[derive(Subcommand, Debug)]
pub enum SessionCommands {
    /// List currently active sessions
    List,
    /// Show a session's state and recent heartbeats
    Show { id: Uuid },
    /// Send SIGTERM (then SIGKILL after the grace period) to a session's worker
    Cancel {
        id: Uuid,
        #[arg(long, default_value = "operator requested cancellation")]
        reason: String,
    },
}

pub async fn run(args: SessionArgs, ctx: &CliContext) -> Result<()> {
    match args.command {
        SessionCommands::List => list(ctx).await,
        SessionCommands::Show { id } => show(ctx, id).await,
        SessionCommands::Cancel { id, reason } => cancel(ctx, id, reason).await,
    }
}

async fn list(ctx: &CliContext) -> Result<()> {
    let sessions = ctx.sessions.list_active().await?;
    emit(&SessionListOutput { sessions }, ctx.json);
    Ok(())
}

async fn show(ctx: &CliContext, id: Uuid) -> Result<()> {
    let observation = ctx.session_manager.observe(id).await?;
    emit(
        &SessionDetailOutput { session: observation.session, heartbeats: observation.heartbeats },
        ctx.json,
    );
    Ok(())
}

async fn cancel(ctx: &CliContext, id: Uuid, reason: String) -> Result<()> {
    ctx.session_manager.cancel(id, &reason).await?;
    let session = ctx.sessions.get(id).await?.ok_or_else(|| anyhow!("session {id} vanished after cancel"))?;
    emit(&SessionDetailOutput { session, heartbeats: Vec::new() }, ctx.json);
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct SessionListOutput {
    pub sessions: Vec<AgentSession>,
}

impl CommandOutput for SessionListOutput {
    fn to_human(&self) -> String {
        if self.sessions.is_empty() {
            return "No active sessions.".to_string();
        }
        table::sessions(&self.sessions)
    }
}

#[derive(Debug, Serialize)]
pub struct SessionDetailOutput {
    pub session: AgentSession,
    pub heartbeats: Vec<Heartbeat>,
}

impl CommandOutput for SessionDetailOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![
            format!("session: {}", self.session.id),
            format!("task:    {}", self.session.task_id),
            format!("agent:   {}", self.session.agent_type.as_str()),
            format!("status:  {}", self.session.status.as_str()),
            format!("pid:     {}", self.session.process_id.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string())),
            format!("last heartbeat: {}", self.session.last_heartbeat_at.to_rfc3339()),
        ];
        if !self.heartbeats.is_empty() {
            lines.push(format!("{} recorded heartbeat(s):", self.heartbeats.len()));
            for hb in self.heartbeats.iter().rev().take(5) {
                lines.push(format!(
                    "  {} step={} progress={:?}%",
                    hb.ts.to_rfc3339(),
                    hb.current_step.as_deref().unwrap_or("-"),
                    hb.progress_percent,
                ));
            }
        }
        lines.join("\n")
    }
}
