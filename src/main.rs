//! Taskforge CLI entry point.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Duration;
use clap::Parser;

use taskforge::cli::{Cli, CliContext};
use taskforge::domain::models::PromotionPolicy;
use taskforge::infrastructure::config::ConfigLoader;
use taskforge::infrastructure::database::{
    DatabaseConnection, EventRepositoryImpl, HeartbeatRepositoryImpl, KnowledgeRepositoryImpl,
    LockRepositoryImpl, SessionRepositoryImpl, TaskRepositoryImpl,
};
use taskforge::infrastructure::logging::{self, LogConfig};
use taskforge::infrastructure::vcs::GitAdapter;
use taskforge::services::{
    AgentTypeRegistry, ChangePlanEngine, EventBus, FeatureCoordinator, KnowledgeBase, Monitor,
    NoOverrides, Orchestrator, ResourceRegistry, SessionManager,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config = ConfigLoader::load().context("failed to load configuration")?;

    let log_config = LogConfig { level: config.log_level.clone(), ..LogConfig::default() };
    let _log_guard = logging::init(&log_config);

    let database_url = format!("sqlite:{}", config.database.path);
    let db = DatabaseConnection::new(&database_url, config.database.max_connections)
        .await
        .context("failed to connect to database")?;
    db.migrate().await.context("failed to run database migrations")?;

    let tasks = Arc::new(TaskRepositoryImpl::new(db.pool().clone()));
    let sessions = Arc::new(SessionRepositoryImpl::new(db.pool().clone()));
    let heartbeats = Arc::new(HeartbeatRepositoryImpl::new(db.pool().clone()));
    let knowledge_repo = Arc::new(KnowledgeRepositoryImpl::new(db.pool().clone()));
    let events_repo = Arc::new(EventRepositoryImpl::new(db.pool().clone()));
    let locks = Arc::new(LockRepositoryImpl::new(db.pool().clone()));

    let agent_types = Arc::new(AgentTypeRegistry::with_defaults());
    let event_bus = Arc::new(EventBus::new(events_repo));

    let session_manager = Arc::new(SessionManager::new(
        sessions.clone(),
        heartbeats,
        agent_types.clone(),
        event_bus.clone(),
        Duration::seconds(config.session.grace_period_secs as i64),
        Duration::seconds(config.session.stuck_threshold_secs),
    ));

    let knowledge = Arc::new(KnowledgeBase::new(
        knowledge_repo,
        PromotionPolicy {
            promotion_threshold: config.knowledge.promotion_threshold,
            min_observations: config.knowledge.min_observations,
        },
    ));

    let resources = Arc::new(ResourceRegistry::new(locks));
    let vcs = Arc::new(GitAdapter::new(config.repo_root.clone()));
    let change_plan_engine = Arc::new(ChangePlanEngine::new(vcs, resources.clone()));
    let feature_coordinator = Arc::new(FeatureCoordinator::new(change_plan_engine, tasks.clone()));

    let orchestrator = Arc::new(Orchestrator::new(
        tasks.clone(),
        session_manager.clone(),
        resources,
        agent_types,
        event_bus.clone(),
        config.clone(),
    ));

    let monitor = Arc::new(Monitor::new(
        sessions.clone(),
        tasks.clone(),
        session_manager.clone(),
        Arc::new(NoOverrides),
        event_bus,
        config,
    ));

    let cli = Cli::parse();
    let ctx = CliContext {
        tasks,
        sessions,
        session_manager,
        knowledge,
        dependency_resolver: taskforge::services::DependencyResolver::new(),
        feature_coordinator,
        orchestrator,
        monitor,
        json: cli.json,
    };

    taskforge::cli::dispatch(cli, &ctx).await
}
