//! Command-line interface (SPEC_FULL §1A "External Interfaces").
//!
//! Talks to the same repositories and services the orchestrator daemon
//! uses; there is no separate client/server boundary.

pub mod commands;
pub mod output;
pub mod table;

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::domain::ports::{SessionRepository, TaskRepository};
use crate::services::{
    DependencyResolver, FeatureCoordinator, KnowledgeBase, Monitor, Orchestrator, SessionManager,
};

#[derive(Parser, Debug)]
#[command(name = "taskforge", version, about = "Autonomous software-development orchestrator")]
pub struct Cli {
    /// Emit machine-readable JSON instead of human-readable text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Task queue management
    Task(commands::task::TaskArgs),
    /// Agent session inspection and control
    Session(commands::session::SessionArgs),
    /// Knowledge base queries
    Knowledge(commands::knowledge::KnowledgeArgs),
    /// Multi-layer feature change coordination
    Feature(commands::feature::FeatureArgs),
    /// Run the dispatcher/monitor driver loop
    Daemon(commands::daemon::DaemonArgs),
}

/// Shared handles every command needs; constructed once in `main` from the
/// same repositories the orchestrator daemon uses.
pub struct CliContext {
    pub tasks: Arc<dyn TaskRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub session_manager: Arc<SessionManager>,
    pub knowledge: Arc<KnowledgeBase>,
    pub dependency_resolver: DependencyResolver,
    pub feature_coordinator: Arc<FeatureCoordinator>,
    pub orchestrator: Arc<Orchestrator>,
    pub monitor: Arc<Monitor>,
    pub json: bool,
}

pub async fn dispatch(cli: Cli, ctx: &CliContext) -> Result<()> {
    match cli.command {
        Commands::Task(args) => commands::task::run(args, ctx).await,
        Commands::Session(args) => commands::session::run(args, ctx).await,
        Commands::Knowledge(args) => commands::knowledge::run(args, ctx).await,
        Commands::Feature(args) => commands::feature::run(args, ctx).await,
        Commands::Daemon(args) => commands::daemon::run(args, ctx).await,
    }
}
