//! `taskforge feature` subcommands.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Subcommand};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cli::output::{emit, CommandOutput};
use crate::cli::CliContext;
use crate::domain::models::{ExecutionStatus, FeatureRequirement, FileChange, FileOperation, Layer};

#[derive(Args, Debug)]
pub struct FeatureArgs {
    #[command(subcommand)]
    pub command: FeatureCommands,
}

#[derive(Subcommand, Debug)]
pub enum FeatureCommands {
    /// Apply a multi-layer feature plan against the task it belongs to
    Coordinate {
        /// Task this feature's work is tracked against
        #[arg(long)]
        task: Uuid,
        /// JSON file describing the feature and its per-layer file changes
        #[arg(long)]
        plan: PathBuf,
        /// Directory holding the new/modified file contents, keyed by the
        /// relative paths named in `plan`
        #[arg(long = "content-dir")]
        content_dir: PathBuf,
        /// Resource-lock holder id for the duration of the coordination
        #[arg(long, default_value = "feature-coordinator")]
        holder: String,
    },
}

pub async fn run(args: FeatureArgs, ctx: &CliContext) -> Result<()> {
    match args.command {
        FeatureCommands::Coordinate { task, plan, content_dir, holder } => {
            coordinate(ctx, task, plan, content_dir, holder).await
        }
    }
}

/// On-disk shape of a feature plan: layer-grouped file changes plus the
/// feature metadata the Feature Coordinator needs (spec §4.8 Input).
#[derive(Debug, Deserialize)]
struct FeaturePlanFile {
    description: String,
    pass_criteria: Vec<String>,
    files: Vec<PlannedFile>,
}

#[derive(Debug, Deserialize)]
struct PlannedFile {
    path: String,
    layer: String,
    operation: String,
    reason: String,
    #[serde(default)]
    depends_on: Vec<String>,
    #[serde(default)]
    priority: i32,
}

async fn coordinate(
    ctx: &CliContext,
    task_id: Uuid,
    plan_path: PathBuf,
    content_dir: PathBuf,
    holder: String,
) -> Result<()> {
    let raw = tokio::fs::read(&plan_path)
        .await
        .with_context(|| format!("reading feature plan {}", plan_path.display()))?;
    let plan_file: FeaturePlanFile =
        serde_json::from_slice(&raw).with_context(|| format!("parsing feature plan {}", plan_path.display()))?;

    let mut task = ctx.tasks.get(task_id).await?.ok_or_else(|| anyhow!("task {task_id} not found"))?;

    let mut files_by_layer: HashMap<Layer, Vec<FileChange>> = HashMap::new();
    let mut affected_areas = Vec::new();
    let mut contents = HashMap::new();

    for planned in &plan_file.files {
        let layer = parse_layer(&planned.layer)?;
        let operation = parse_operation(&planned.operation)?;

        let mut change = FileChange::new(&planned.path, operation, &planned.reason);
        change.priority = planned.priority;
        for dep in &planned.depends_on {
            change = change.depends_on(dep.clone());
        }

        if operation != FileOperation::Delete {
            let bytes = tokio::fs::read(content_dir.join(&planned.path))
                .await
                .with_context(|| format!("reading content for {}", planned.path))?;
            contents.insert(planned.path.clone(), bytes);
        }

        if !affected_areas.contains(&layer) {
            affected_areas.push(layer);
        }
        files_by_layer.entry(layer).or_default().push(change);
    }

    let feature = FeatureRequirement {
        id: Uuid::new_v4(),
        description: plan_file.description,
        affected_areas,
        pass_criteria: plan_file.pass_criteria,
    };

    let outcome = ctx
        .feature_coordinator
        .coordinate(&feature, &mut task, files_by_layer, &contents, &holder)
        .await?;

    emit(&FeatureOutcomeOutput::from(&outcome), ctx.json);
    Ok(())
}

fn parse_layer(s: &str) -> Result<Layer> {
    match s {
        "database" => Ok(Layer::Database),
        "api" => Ok(Layer::Api),
        "ui" => Ok(Layer::Ui),
        other => Err(anyhow!("unknown layer '{other}'")),
    }
}

fn parse_operation(s: &str) -> Result<FileOperation> {
    match s {
        "create" => Ok(FileOperation::Create),
        "modify" => Ok(FileOperation::Modify),
        "delete" => Ok(FileOperation::Delete),
        other => Err(anyhow!("unknown file operation '{other}'")),
    }
}

#[derive(Debug, Serialize)]
pub struct FeatureOutcomeOutput {
    pub needs_review: bool,
    pub layers: Vec<LayerResultOutput>,
}

#[derive(Debug, Serialize)]
pub struct LayerResultOutput {
    pub layer: String,
    pub status: String,
    pub commit_ref: Option<String>,
    pub error: Option<String>,
}

impl From<&crate::services::FeatureOutcome> for FeatureOutcomeOutput {
    fn from(outcome: &crate::services::FeatureOutcome) -> Self {
        Self {
            needs_review: outcome.needs_review,
            layers: outcome
                .layer_results
                .iter()
                .map(|(layer, result)| LayerResultOutput {
                    layer: format!("{layer:?}").to_lowercase(),
                    status: match result.status {
                        ExecutionStatus::Applied => "applied",
                        ExecutionStatus::RolledBack => "rolled_back",
                        ExecutionStatus::Failed => "failed",
                    }
                    .to_string(),
                    commit_ref: result.commit_ref.clone(),
                    error: result.error.clone(),
                })
                .collect(),
        }
    }
}

impl CommandOutput for FeatureOutcomeOutput {
    fn to_human(&self) -> String {
        let mut lines = Vec::new();
        for layer in &self.layers {
            let mut line = format!("{}: {}", layer.layer, layer.status);
            if let Some(commit_ref) = &layer.commit_ref {
                line.push_str(&format!(" ({commit_ref})"));
            }
            if let Some(error) = &layer.error {
                line.push_str(&format!(" - {error}"));
            }
            lines.push(line);
        }
        if self.needs_review {
            lines.push("flagged for review: cross-layer validation failed".to_string());
        }
        lines.join("\n")
    }
}
