//! `taskforge task` subcommands.

use anyhow::{anyhow, Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;
use uuid::Uuid;

use crate::cli::output::{emit, truncate, CommandOutput};
use crate::cli::table;
use crate::cli::CliContext;
use crate::domain::models::{AgentType, Task, TaskFilter, TaskStatus};

#[derive(Args, Debug)]
pub struct TaskArgs {
    #[command(subcommand)]
    pub command: TaskCommands,
}

#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// Submit a new task to the queue
    Submit {
        /// Human-readable title
        title: String,
        /// Path to the task's spec file
        #[arg(long)]
        spec_path: Option<String>,
        /// Agent type to route the task to
        #[arg(short, long, default_value = "build")]
        agent: String,
        /// Scheduling priority, higher runs first
        #[arg(short, long, default_value_t = 0)]
        priority: i32,
        /// Task IDs this task depends on
        #[arg(long = "depends-on")]
        depends_on: Vec<Uuid>,
    },
    /// List tasks, optionally filtered by status
    List {
        #[arg(short, long)]
        status: Option<String>,
        #[arg(short, long, default_value_t = 50)]
        limit: usize,
    },
    /// Show full detail for one task
    Show { id: Uuid },
    /// Force a blocked or failed task back into the retry queue
    Retry { id: Uuid },
}

pub async fn run(args: TaskArgs, ctx: &CliContext) -> Result<()> {
    match args.command {
        TaskCommands::Submit { title, spec_path, agent, priority, depends_on } => {
            submit(ctx, title, spec_path, agent, priority, depends_on).await
        }
        TaskCommands::List { status, limit } => list(ctx, status, limit).await,
        TaskCommands::Show { id } => show(ctx, id).await,
        TaskCommands::Retry { id } => retry(ctx, id).await,
    }
}

async fn submit(
    ctx: &CliContext,
    title: String,
    spec_path: Option<String>,
    agent: String,
    priority: i32,
    depends_on: Vec<Uuid>,
) -> Result<()> {
    let agent_type = AgentType::from_str(&agent)
        .ok_or_else(|| anyhow!("unknown agent type '{agent}'"))?;

    let known = ctx.tasks.list(TaskFilter::default()).await?;
    let display_id = format!("TASK-{:04}", known.len() + 1);
    let mut task = Task::new(title, display_id, agent_type);
    task.spec_path = spec_path;
    task.priority = priority;
    task.dependencies = depends_on;

    ctx.dependency_resolver
        .validate_dependencies(&task, &known)
        .context("dependency validation failed")?;

    let mut candidates = known.clone();
    candidates.push(task.clone());
    if let Some(cycle) = ctx.dependency_resolver.detect_cycle(&candidates) {
        return Err(anyhow!(
            "submitting this task would create a dependency cycle: {}",
            cycle.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(" -> ")
        ));
    }

    let now = chrono::Utc::now();
    if task.dependencies.is_empty() && task.has_required_inputs() {
        task.status = TaskStatus::Ready;
    } else {
        task.status = TaskStatus::Pending;
        task.next_retry_at = Some(now);
    }

    ctx.tasks.create(&task).await?;
    emit(&TaskOutput::from(&task), ctx.json);
    Ok(())
}

async fn list(ctx: &CliContext, status: Option<String>, limit: usize) -> Result<()> {
    let status = match status {
        Some(s) => Some(TaskStatus::from_str(&s).ok_or_else(|| anyhow!("unknown status filter '{s}'"))?),
        None => None,
    };
    let filter = TaskFilter { status, agent_type: None };
    let mut tasks = ctx.tasks.list(filter).await?;
    tasks.truncate(limit);
    emit(&TaskListOutput { tasks }, ctx.json);
    Ok(())
}

async fn show(ctx: &CliContext, id: Uuid) -> Result<()> {
    let task = ctx.tasks.get(id).await?.ok_or_else(|| anyhow!("task {id} not found"))?;
    emit(&TaskOutput::from(&task), ctx.json);
    Ok(())
}

async fn retry(ctx: &CliContext, id: Uuid) -> Result<()> {
    let mut task = ctx.tasks.get(id).await?.ok_or_else(|| anyhow!("task {id} not found"))?;
    if task.status == TaskStatus::Completed {
        return Err(anyhow!("task {id} already completed, nothing to retry"));
    }
    let expected = task.status;
    task.status = TaskStatus::Pending;
    task.next_retry_at = Some(chrono::Utc::now());
    task.needs_review = false;
    task.review_reason = None;
    task.updated_at = chrono::Utc::now();

    if !ctx.tasks.update_cas(&task, expected).await? {
        return Err(anyhow!("task {id} changed concurrently, retry aborted"));
    }
    emit(&TaskOutput::from(&task), ctx.json);
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct TaskOutput {
    pub id: Uuid,
    pub display_id: String,
    pub title: String,
    pub status: String,
    pub agent_type: String,
    pub priority: i32,
    pub retry_count: u32,
    pub dependencies: Vec<Uuid>,
    pub needs_review: bool,
    pub review_reason: Option<String>,
}

impl From<&Task> for TaskOutput {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id,
            display_id: task.display_id.clone(),
            title: task.title.clone(),
            status: task.status.as_str().to_string(),
            agent_type: task.assigned_agent_type.as_str().to_string(),
            priority: task.priority,
            retry_count: task.retry_count,
            dependencies: task.dependencies.clone(),
            needs_review: task.needs_review,
            review_reason: task.review_reason.clone(),
        }
    }
}

impl CommandOutput for TaskOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![
            format!("{} ({})", self.display_id, self.id),
            format!("title:    {}", truncate(&self.title, 72)),
            format!("status:   {}", self.status),
            format!("agent:    {}", self.agent_type),
            format!("priority: {}", self.priority),
            format!("retries:  {}", self.retry_count),
        ];
        if self.needs_review {
            lines.push(format!("review:   {}", self.review_reason.as_deref().unwrap_or("flagged")));
        }
        lines.join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct TaskListOutput {
    pub tasks: Vec<Task>,
}

impl CommandOutput for TaskListOutput {
    fn to_human(&self) -> String {
        if self.tasks.is_empty() {
            return "No tasks found.".to_string();
        }
        table::tasks(&self.tasks)
    }
}
