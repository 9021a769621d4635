//! Taskforge: an autonomous software-development orchestrator.
//!
//! `domain` holds the entities and port traits (spec §3, §4.1); `services`
//! implements the orchestration logic against those ports (spec §4);
//! `infrastructure` provides the SQLite, git, and config adapters; `cli`
//! is the command-line surface over the same services the daemon runs.

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;
