//! Table rendering for task/session/knowledge listings.

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use std::env;

use crate::domain::models::{AgentSession, KnowledgeItem, SessionStatus, Task, TaskStatus};

fn base_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn supports_color() -> bool {
    if env::var("NO_COLOR").is_ok() {
        return false;
    }
    !matches!(env::var("TERM"), Ok(t) if t == "dumb")
}

fn task_status_color(status: TaskStatus) -> Color {
    match status {
        TaskStatus::Completed => Color::Green,
        TaskStatus::InProgress => Color::Cyan,
        TaskStatus::PendingVerification => Color::Yellow,
        TaskStatus::Verifying => Color::Cyan,
        TaskStatus::Failed => Color::Red,
        TaskStatus::Blocked => Color::Magenta,
        TaskStatus::Ready => Color::Yellow,
        TaskStatus::Pending => Color::White,
    }
}

fn session_status_color(status: SessionStatus) -> Color {
    match status {
        SessionStatus::Completed => Color::Green,
        SessionStatus::Running | SessionStatus::Testing | SessionStatus::Validating => Color::Cyan,
        SessionStatus::Failed | SessionStatus::Terminated => Color::Red,
        SessionStatus::Spawning => Color::White,
    }
}

pub fn tasks(tasks: &[Task]) -> String {
    let colors = supports_color();
    let mut table = base_table();
    table.set_header(vec![
        Cell::new("ID").add_attribute(Attribute::Bold),
        Cell::new("TITLE").add_attribute(Attribute::Bold),
        Cell::new("STATUS").add_attribute(Attribute::Bold),
        Cell::new("AGENT").add_attribute(Attribute::Bold),
        Cell::new("RETRIES").add_attribute(Attribute::Bold),
        Cell::new("REVIEW").add_attribute(Attribute::Bold),
    ]);

    for task in tasks {
        let status_cell = if colors {
            Cell::new(task.status.as_str()).fg(task_status_color(task.status))
        } else {
            Cell::new(task.status.as_str())
        };
        table.add_row(vec![
            Cell::new(crate::cli::output::short_id(&task.id)),
            Cell::new(crate::cli::output::truncate(&task.title, 40)),
            status_cell,
            Cell::new(task.assigned_agent_type.as_str()),
            Cell::new(task.retry_count),
            Cell::new(if task.needs_review { "yes" } else { "-" }),
        ]);
    }

    table.to_string()
}

pub fn sessions(sessions: &[AgentSession]) -> String {
    let colors = supports_color();
    let mut table = base_table();
    table.set_header(vec![
        Cell::new("SESSION").add_attribute(Attribute::Bold),
        Cell::new("TASK").add_attribute(Attribute::Bold),
        Cell::new("AGENT").add_attribute(Attribute::Bold),
        Cell::new("STATUS").add_attribute(Attribute::Bold),
        Cell::new("PID").add_attribute(Attribute::Bold),
        Cell::new("LAST HEARTBEAT").add_attribute(Attribute::Bold),
    ]);

    for session in sessions {
        let status_cell = if colors {
            Cell::new(session.status.as_str()).fg(session_status_color(session.status))
        } else {
            Cell::new(session.status.as_str())
        };
        table.add_row(vec![
            Cell::new(crate::cli::output::short_id(&session.id)),
            Cell::new(crate::cli::output::short_id(&session.task_id)),
            Cell::new(session.agent_type.as_str()),
            status_cell,
            Cell::new(session.process_id.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string())),
            Cell::new(session.last_heartbeat_at.to_rfc3339()),
        ]);
    }

    table.to_string()
}

pub fn knowledge(items: &[KnowledgeItem]) -> String {
    let mut table = base_table();
    table.set_header(vec![
        Cell::new("KIND").add_attribute(Attribute::Bold),
        Cell::new("PATTERN").add_attribute(Attribute::Bold),
        Cell::new("CONTENT").add_attribute(Attribute::Bold),
        Cell::new("CONFIDENCE").add_attribute(Attribute::Bold),
        Cell::new("OBSERVED").add_attribute(Attribute::Bold),
    ]);

    for item in items {
        table.add_row(vec![
            Cell::new(item.kind.as_str()),
            Cell::new(&item.file_pattern),
            Cell::new(crate::cli::output::truncate(&item.content, 50)),
            Cell::new(format!("{:.2}", item.confidence)),
            Cell::new(item.distinct_session_count()),
        ]);
    }

    table.to_string()
}
