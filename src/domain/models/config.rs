//! Runtime configuration (spec §4.3, §4.7, §4.9, §4.10, §9 Open Questions).
//!
//! Values here are the tunables the spec repeatedly calls out as
//! "default N, configurable" rather than hard-coded constants.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::error::ErrorKind;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryPolicyConfig {
    /// Backoff delays in seconds, one per retry attempt, in order.
    pub backoff_seconds: Vec<u64>,
    pub max_retries: u32,
}

fn default_retry_table() -> HashMap<String, RetryPolicyConfig> {
    let mut m = HashMap::new();
    m.insert(
        ErrorKind::Transient.as_str().to_string(),
        RetryPolicyConfig { backoff_seconds: vec![30, 60, 120, 300, 600], max_retries: 5 },
    );
    m.insert(
        ErrorKind::CodeError.as_str().to_string(),
        RetryPolicyConfig { backoff_seconds: vec![120, 300, 900], max_retries: 3 },
    );
    m.insert(
        ErrorKind::TestFailure.as_str().to_string(),
        RetryPolicyConfig { backoff_seconds: vec![120, 300, 900], max_retries: 3 },
    );
    m.insert(
        ErrorKind::ResourceConflict.as_str().to_string(),
        RetryPolicyConfig { backoff_seconds: vec![0], max_retries: 5 },
    );
    m.insert(
        ErrorKind::Resource.as_str().to_string(),
        RetryPolicyConfig { backoff_seconds: vec![900, 1800, 3600], max_retries: 2 },
    );
    m.insert(
        ErrorKind::Unknown.as_str().to_string(),
        RetryPolicyConfig { backoff_seconds: vec![300], max_retries: 3 },
    );
    m
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConcurrencyConfig {
    #[serde(default = "default_max_concurrent_sessions")]
    pub max_concurrent_sessions: usize,
    #[serde(default)]
    pub per_agent_type_caps: HashMap<String, usize>,
}

fn default_max_concurrent_sessions() -> usize {
    5
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_concurrent_sessions: default_max_concurrent_sessions(),
            per_agent_type_caps: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
    #[serde(default = "default_grace_period_secs")]
    pub grace_period_secs: u64,
    #[serde(default = "default_stuck_threshold_secs")]
    pub stuck_threshold_secs: i64,
    #[serde(default = "default_warn_threshold_secs")]
    pub warn_threshold_secs: i64,
    #[serde(default = "default_alert_threshold_secs")]
    pub alert_threshold_secs: i64,
    #[serde(default = "default_interrupt_threshold_secs")]
    pub interrupt_threshold_secs: i64,
    #[serde(default = "default_simple_task_timeout_secs")]
    pub simple_task_timeout_secs: i64,
    #[serde(default = "default_complex_task_timeout_secs")]
    pub complex_task_timeout_secs: i64,
}

fn default_heartbeat_interval_secs() -> u64 { 30 }
fn default_grace_period_secs() -> u64 { 10 }
fn default_stuck_threshold_secs() -> i64 { 600 }
fn default_warn_threshold_secs() -> i64 { 300 }
fn default_alert_threshold_secs() -> i64 { 600 }
fn default_interrupt_threshold_secs() -> i64 { 1800 }
fn default_simple_task_timeout_secs() -> i64 { 900 }
fn default_complex_task_timeout_secs() -> i64 { 3600 }

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            grace_period_secs: default_grace_period_secs(),
            stuck_threshold_secs: default_stuck_threshold_secs(),
            warn_threshold_secs: default_warn_threshold_secs(),
            alert_threshold_secs: default_alert_threshold_secs(),
            interrupt_threshold_secs: default_interrupt_threshold_secs(),
            simple_task_timeout_secs: default_simple_task_timeout_secs(),
            complex_task_timeout_secs: default_complex_task_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LockConfig {
    #[serde(default = "default_lock_ttl_secs")]
    pub default_ttl_secs: i64,
    #[serde(default = "default_dead_letter_attempts")]
    pub dead_letter_attempts: u32,
}

fn default_lock_ttl_secs() -> i64 { 1800 }
fn default_dead_letter_attempts() -> u32 { 5 }

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: default_lock_ttl_secs(),
            dead_letter_attempts: default_dead_letter_attempts(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KnowledgeConfig {
    /// Spec §9 Open Questions: source disagreed between 0.9/3-observations and
    /// other variants; kept configurable with the most frequently cited
    /// defaults.
    #[serde(default = "default_promotion_threshold")]
    pub promotion_threshold: f64,
    #[serde(default = "default_min_observations")]
    pub min_observations: u32,
}

fn default_promotion_threshold() -> f64 { 0.9 }
fn default_min_observations() -> u32 { 3 }

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            promotion_threshold: default_promotion_threshold(),
            min_observations: default_min_observations(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".taskforge/taskforge.db".to_string()
}
fn default_max_connections() -> u32 { 10 }

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonitorConfig {
    #[serde(default = "default_monitor_interval_secs")]
    pub poll_interval_secs: u64,
}

fn default_monitor_interval_secs() -> u64 { 120 }

impl Default for MonitorConfig {
    fn default() -> Self {
        Self { poll_interval_secs: default_monitor_interval_secs() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DispatcherConfig {
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,
}

fn default_tick_interval_secs() -> u64 {
    5
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self { tick_interval_secs: default_tick_interval_secs() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub concurrency: ConcurrencyConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub lock: LockConfig,
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    #[serde(default = "default_retry_table")]
    pub retry_policy: HashMap<String, RetryPolicyConfig>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Working tree the Change-Plan Engine's VCS adapter operates on (spec §4.8).
    #[serde(default = "default_repo_root")]
    pub repo_root: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_repo_root() -> String {
    ".".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            concurrency: ConcurrencyConfig::default(),
            session: SessionConfig::default(),
            lock: LockConfig::default(),
            knowledge: KnowledgeConfig::default(),
            database: DatabaseConfig::default(),
            monitor: MonitorConfig::default(),
            dispatcher: DispatcherConfig::default(),
            retry_policy: default_retry_table(),
            log_level: default_log_level(),
            repo_root: default_repo_root(),
        }
    }
}

impl Config {
    pub fn retry_policy_for(&self, kind: ErrorKind) -> RetryPolicyConfig {
        self.retry_policy
            .get(kind.as_str())
            .cloned()
            .unwrap_or(RetryPolicyConfig { backoff_seconds: vec![300], max_retries: 3 })
    }
}
