//! `taskforge knowledge` subcommands.

use anyhow::{anyhow, Result};
use clap::{Args, Subcommand};
use serde::Serialize;
use uuid::Uuid;

use crate::cli::output::{emit, CommandOutput};
use crate::cli::table;
use crate::cli::CliContext;
use crate::domain::models::{KnowledgeItem, KnowledgeKind, KnowledgeQuery};

#[derive(Args, Debug)]
pub struct KnowledgeArgs {
    #[command(subcommand)]
    pub command: KnowledgeCommands,
}

#[derive(Subcommand, Debug)]
pub enum KnowledgeCommands {
    /// Query recorded gotchas, patterns, and decisions
    Query {
        #[arg(long)]
        kind: Option<String>,
        #[arg(long)]
        file_pattern: Option<String>,
        #[arg(long)]
        action_type: Option<String>,
        #[arg(long)]
        topic: Option<String>,
    },
    /// Record a manually-observed item (normally written by a worker session)
    Record {
        kind: String,
        content: String,
        file_pattern: String,
        #[arg(long, default_value_t = 0.5)]
        confidence: f64,
        #[arg(long, default_value = "operator")]
        source: String,
        #[arg(long)]
        session: Uuid,
    },
    /// Gotchas/patterns applicable to a given repository path
    Applicable { path: String },
}

pub async fn run(args: KnowledgeArgs, ctx: &CliContext) -> Result<()> {
    match args.command {
        KnowledgeCommands::Query { kind, file_pattern, action_type, topic } => {
            query(ctx, kind, file_pattern, action_type, topic).await
        }
        KnowledgeCommands::Record { kind, content, file_pattern, confidence, source, session } => {
            record(ctx, kind, content, file_pattern, confidence, source, session).await
        }
        KnowledgeCommands::Applicable { path } => applicable(ctx, path).await,
    }
}

async fn query(
    ctx: &CliContext,
    kind: Option<String>,
    file_pattern: Option<String>,
    action_type: Option<String>,
    topic: Option<String>,
) -> Result<()> {
    let kind = match kind {
        Some(k) => Some(KnowledgeKind::from_str(&k).ok_or_else(|| anyhow!("unknown knowledge kind '{k}'"))?),
        None => None,
    };
    let items = ctx.knowledge.query(KnowledgeQuery { file_pattern, action_type, kind, topic }).await?;
    emit(&KnowledgeListOutput { items }, ctx.json);
    Ok(())
}

async fn record(
    ctx: &CliContext,
    kind: String,
    content: String,
    file_pattern: String,
    confidence: f64,
    source: String,
    session: Uuid,
) -> Result<()> {
    let kind = KnowledgeKind::from_str(&kind).ok_or_else(|| anyhow!("unknown knowledge kind '{kind}'"))?;
    let item = ctx.knowledge.record(kind, content, file_pattern, confidence, source, session).await?;
    emit(&KnowledgeItemOutput(item), ctx.json);
    Ok(())
}

async fn applicable(ctx: &CliContext, path: String) -> Result<()> {
    let items = ctx.knowledge.applicable_to(&path).await?;
    emit(&KnowledgeListOutput { items }, ctx.json);
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct KnowledgeListOutput {
    pub items: Vec<KnowledgeItem>,
}

impl CommandOutput for KnowledgeListOutput {
    fn to_human(&self) -> String {
        if self.items.is_empty() {
            return "No matching knowledge items.".to_string();
        }
        table::knowledge(&self.items)
    }
}

#[derive(Debug, Serialize)]
pub struct KnowledgeItemOutput(pub KnowledgeItem);

impl CommandOutput for KnowledgeItemOutput {
    fn to_human(&self) -> String {
        format!(
            "{} [{}] confidence={:.2} observed in {} session(s)\n{}",
            self.0.id,
            self.0.kind.as_str(),
            self.0.confidence,
            self.0.distinct_session_count(),
            self.0.content,
        )
    }
}
