//! Per-agent-type dispatch: spawn command, precondition check, and error
//! classifier, registered once per [`AgentType`] (spec §4.7, §9 "Dynamic
//! dispatch across agent types").

use std::collections::HashMap;

use regex::Regex;

use crate::domain::error::{ErrorKind, OrchestratorError};
use crate::domain::models::{AgentType, Task};
use crate::domain::DomainResult;

/// The behavior a concrete agent binary contributes to the dispatcher.
/// Implementations are looked up by [`AgentType`] so the Session Manager
/// never hard-codes a `match` over agent kinds.
pub trait AgentTypeHandler: Send + Sync {
    /// Binary to invoke and the static argument prefix (task/spec-file
    /// arguments are appended by the caller per the worker contract).
    fn spawn_command(&self) -> (&str, &[String]);

    /// Rejects a task this agent type cannot run, e.g. a `build` task
    /// with no `spec_path` (spec §3 "ready implies spec_path is set").
    fn validate(&self, task: &Task) -> Result<(), String> {
        if task.spec_path.is_none() {
            return Err(format!("task {} has no spec_path", task.display_id));
        }
        Ok(())
    }

    /// Maps a worker's exit code and stderr tail to a retry-policy bucket
    /// (spec §4.6 exit code contract, §7 error classification).
    fn classify_error(&self, exit_code: i32, stderr: &str) -> ErrorKind {
        default_classify(exit_code, stderr)
    }
}

/// Exit-code-first classification shared by every built-in handler; a
/// handler only needs to override [`AgentTypeHandler::classify_error`]
/// when its stderr conventions diverge.
fn default_classify(exit_code: i32, stderr: &str) -> ErrorKind {
    match exit_code {
        0 => ErrorKind::Unknown,
        1 => classify_from_message(stderr).unwrap_or(ErrorKind::TestFailure),
        2 => ErrorKind::CodeError,
        _ => classify_from_message(stderr).unwrap_or(ErrorKind::Unknown),
    }
}

/// Message-pattern matchers for the transient/resource-conflict cases that
/// an exit code alone can't distinguish (spec §8 scenario 5).
fn classify_from_message(message: &str) -> Option<ErrorKind> {
    let patterns: &[(&str, ErrorKind)] = &[
        (r"(?i)connection (refused|reset|timed out)", ErrorKind::Transient),
        (r"(?i)temporarily unavailable", ErrorKind::Transient),
        (r"(?i)lock (conflict|held by|already held)", ErrorKind::ResourceConflict),
        (r"(?i)rate limit", ErrorKind::Resource),
        (r"(?i)out of memory|oom", ErrorKind::Resource),
        (r"(?i)deadline exceeded|timed out waiting", ErrorKind::DeadlineExceeded),
    ];
    patterns
        .iter()
        .find(|(pattern, _)| Regex::new(pattern).map(|re| re.is_match(message)).unwrap_or(false))
        .map(|(_, kind)| *kind)
}

struct BuiltinHandler {
    command: String,
    args: Vec<String>,
}

impl AgentTypeHandler for BuiltinHandler {
    fn spawn_command(&self) -> (&str, &[String]) {
        (&self.command, &self.args)
    }
}

pub struct AgentTypeRegistry {
    handlers: HashMap<AgentType, Box<dyn AgentTypeHandler>>,
}

impl AgentTypeRegistry {
    pub fn new() -> Self {
        Self { handlers: HashMap::new() }
    }

    pub fn register(&mut self, agent_type: AgentType, handler: Box<dyn AgentTypeHandler>) {
        self.handlers.insert(agent_type, handler);
    }

    pub fn get(&self, agent_type: AgentType) -> DomainResult<&dyn AgentTypeHandler> {
        self.handlers
            .get(&agent_type)
            .map(|h| h.as_ref())
            .ok_or_else(|| OrchestratorError::UnknownAgentType(agent_type.as_str().to_string()))
    }

    /// Registers the five built-in agent types against their conventional
    /// worker binary names, one process per agent type (spec §4.6 worker
    /// binary contract).
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for agent_type in [
            AgentType::Ideation,
            AgentType::Specification,
            AgentType::Build,
            AgentType::Qa,
            AgentType::SelfImprovement,
        ] {
            registry.register(
                agent_type,
                Box::new(BuiltinHandler {
                    command: format!("taskforge-agent-{}", agent_type.as_str()),
                    args: Vec::new(),
                }),
            );
        }
        registry
    }
}

impl Default for AgentTypeRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unregistered_agent_type_is_rejected() {
        let registry = AgentTypeRegistry::new();
        assert!(registry.get(AgentType::Build).is_err());
    }

    #[test]
    fn defaults_cover_every_agent_type() {
        let registry = AgentTypeRegistry::with_defaults();
        assert!(registry.get(AgentType::Ideation).is_ok());
        assert!(registry.get(AgentType::SelfImprovement).is_ok());
    }

    #[test]
    fn lock_conflict_message_classifies_as_resource_conflict() {
        assert_eq!(
            default_classify(1, "lock conflict on path src/main.rs"),
            ErrorKind::ResourceConflict
        );
    }

    #[test]
    fn exit_two_is_always_code_error() {
        assert_eq!(default_classify(2, "panicked at src/main.rs"), ErrorKind::CodeError);
    }
}
