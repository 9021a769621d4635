//! Dependency validation for task creation: every dependency must resolve
//! to a known task, and the dependency graph must stay acyclic (spec §4.9
//! "Dependencies").

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::domain::error::OrchestratorError;
use crate::domain::models::Task;
use crate::domain::DomainResult;

#[derive(Debug, Clone, Default)]
pub struct DependencyResolver;

impl DependencyResolver {
    pub fn new() -> Self {
        Self
    }

    /// Rejects a task whose `dependencies` reference an id not present in
    /// `known_tasks` (typically the full task set plus the new task itself).
    pub fn validate_dependencies(&self, task: &Task, known_tasks: &[Task]) -> DomainResult<()> {
        let known_ids: HashSet<Uuid> = known_tasks.iter().map(|t| t.id).collect();
        for dep_id in &task.dependencies {
            if *dep_id != task.id && !known_ids.contains(dep_id) {
                return Err(OrchestratorError::Validation(format!(
                    "dependency {dep_id} not found"
                )));
            }
        }
        Ok(())
    }

    /// Returns the cycle (as a list of task ids) if one exists among `tasks`.
    pub fn detect_cycle(&self, tasks: &[Task]) -> Option<Vec<Uuid>> {
        let graph: HashMap<Uuid, Vec<Uuid>> =
            tasks.iter().map(|t| (t.id, t.dependencies.clone())).collect();

        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();
        let mut path = Vec::new();

        for &id in graph.keys() {
            if !visited.contains(&id) && walk(id, &graph, &mut visited, &mut rec_stack, &mut path) {
                return Some(path);
            }
        }
        None
    }

    /// All dependencies of `task` have reached a terminal-success status,
    /// the precondition the Task Orchestrator checks before marking a task
    /// `ready` (spec §4.9).
    pub fn dependencies_satisfied(&self, task: &Task, all_tasks: &[Task]) -> bool {
        let by_id: HashMap<Uuid, &Task> = all_tasks.iter().map(|t| (t.id, t)).collect();
        task.dependencies.iter().all(|dep_id| {
            by_id.get(dep_id).map(|dep| dep.status == crate::domain::models::TaskStatus::Completed).unwrap_or(false)
        })
    }
}

fn walk(
    node: Uuid,
    graph: &HashMap<Uuid, Vec<Uuid>>,
    visited: &mut HashSet<Uuid>,
    rec_stack: &mut HashSet<Uuid>,
    path: &mut Vec<Uuid>,
) -> bool {
    visited.insert(node);
    rec_stack.insert(node);
    path.push(node);

    if let Some(deps) = graph.get(&node) {
        for &dep in deps {
            if !visited.contains(&dep) {
                if walk(dep, graph, visited, rec_stack, path) {
                    return true;
                }
            } else if rec_stack.contains(&dep) {
                if let Some(start) = path.iter().position(|&id| id == dep) {
                    path.drain(0..start);
                }
                return true;
            }
        }
    }

    rec_stack.remove(&node);
    path.pop();
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::AgentType;

    fn task_with_deps(deps: Vec<Uuid>) -> Task {
        let mut t = Task::new("t", "T", AgentType::Build);
        t.dependencies = deps;
        t
    }

    #[test]
    fn missing_dependency_is_rejected() {
        let resolver = DependencyResolver::new();
        let task = task_with_deps(vec![Uuid::new_v4()]);
        assert!(resolver.validate_dependencies(&task, &[]).is_err());
    }

    #[test]
    fn self_dependency_is_allowed_as_a_no_op() {
        let resolver = DependencyResolver::new();
        let mut task = Task::new("t", "T", AgentType::Build);
        task.dependencies = vec![task.id];
        assert!(resolver.validate_dependencies(&task, &[]).is_ok());
    }

    #[test]
    fn two_cycle_is_detected() {
        let resolver = DependencyResolver::new();
        let mut a = task_with_deps(vec![]);
        let mut b = task_with_deps(vec![]);
        a.dependencies = vec![b.id];
        b.dependencies = vec![a.id];

        let cycle = resolver.detect_cycle(&[a, b]);
        assert!(cycle.is_some());
    }
}
