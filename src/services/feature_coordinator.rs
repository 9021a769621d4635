//! Feature Coordinator (C11): drives the Change-Plan Engine across layers
//! in declared dependency order with a declarative per-layer rollback table
//! (spec §4.11).

use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;
use uuid::Uuid;

use crate::domain::models::{
    ExecutionStatus, FeatureRequirement, FileChange, Layer, PlanExecutionResult, Task,
};
use crate::domain::ports::TaskRepository;
use crate::domain::DomainResult;
use crate::services::change_plan_engine::ChangePlanEngine;

/// Outcome of coordinating one feature across its affected layers.
#[derive(Debug, Clone)]
pub struct FeatureOutcome {
    pub layer_results: Vec<(Layer, PlanExecutionResult)>,
    pub needs_review: bool,
}

pub struct FeatureCoordinator {
    engine: Arc<ChangePlanEngine>,
    tasks: Arc<dyn TaskRepository>,
}

impl FeatureCoordinator {
    /// Static SQL → Rust type table this coordinator owns (spec §4.8
    /// Expansion): used to catch API/UI layer code that drifts from the
    /// database schema a feature's earlier layers established. Ordered
    /// most-specific prefix first.
    const SQL_TYPE_MAP: &'static [(&'static str, &'static str)] = &[
        ("INTEGER", "i64"),
        ("INT", "i64"),
        ("REAL", "f64"),
        ("FLOAT", "f64"),
        ("DOUBLE", "f64"),
        ("VARCHAR", "String"),
        ("TEXT", "String"),
        ("CHAR", "String"),
        ("CLOB", "String"),
        ("BLOB", "Vec<u8>"),
    ];

    pub fn new(engine: Arc<ChangePlanEngine>, tasks: Arc<dyn TaskRepository>) -> Self {
        Self { engine, tasks }
    }

    /// Runs each affected layer's plan in `Layer::sequence()` order. A
    /// layer's own execution failure rolls back only that layer (earlier
    /// layers are preserved, per the declarative table in spec §4.11); a
    /// cross-layer validation failure instead sets `needs_review` on `task`
    /// without rolling anything back. Cross-layer validation compares field
    /// types declared in the API/UI layers against the column types the
    /// database layer just established, via `SQL_TYPE_MAP`.
    pub async fn coordinate(
        &self,
        feature: &FeatureRequirement,
        task: &mut Task,
        files_by_layer: HashMap<Layer, Vec<FileChange>>,
        contents: &HashMap<String, Vec<u8>>,
        holder_id: &str,
    ) -> DomainResult<FeatureOutcome> {
        let mut layer_results = Vec::new();
        let mut needs_review = false;
        let mut applied_paths_by_layer: HashMap<Layer, Vec<String>> = HashMap::new();
        let mut schema_types: HashMap<String, &'static str> = HashMap::new();

        for layer in Layer::sequence() {
            let Some(files) = files_by_layer.get(&layer) else { continue };
            if files.is_empty() {
                continue;
            }

            let plan = self.engine.schedule(feature.id, files.clone()).await?;
            let commit_message = format!("{}: {:?} layer", feature.description, layer);
            let result = self.engine.execute(&plan, holder_id, contents, &commit_message).await?;

            let mut cross_layer_violation: Option<String> = None;
            if result.status == ExecutionStatus::Applied {
                let paths: Vec<String> = files.iter().map(|f| f.path.clone()).collect();

                if layer == Layer::Database {
                    for path in &paths {
                        if let Some(text) = contents.get(path).and_then(|b| std::str::from_utf8(b).ok()) {
                            schema_types.extend(Self::extract_sql_columns(text));
                        }
                    }
                } else if !schema_types.is_empty() {
                    cross_layer_violation =
                        Self::validate_cross_layer(&paths, contents, &schema_types).err();
                }

                applied_paths_by_layer.entry(layer).or_default().extend(paths);
            }

            let failed = result.status != ExecutionStatus::Applied;
            layer_results.push((layer, result));

            if let Some(reason) = cross_layer_violation {
                task.needs_review = true;
                task.review_reason = Some(reason);
                needs_review = true;
                break;
            }
            if failed {
                break;
            }
        }

        if needs_review {
            self.tasks.update(&*task).await?;
        }

        Ok(FeatureOutcome { layer_results, needs_review })
    }

    pub fn plan_id_for(&self, outcome: &FeatureOutcome) -> Option<Uuid> {
        outcome.layer_results.first().map(|(_, r)| r.plan_id)
    }

    fn rust_type_for_sql(sql_type: &str) -> &'static str {
        let upper = sql_type.to_ascii_uppercase();
        Self::SQL_TYPE_MAP
            .iter()
            .find(|(sql, _)| upper.starts_with(sql))
            .map(|(_, rust)| *rust)
            .unwrap_or("String")
    }

    /// Pulls `column TYPE` pairs out of a `CREATE TABLE` body.
    fn extract_sql_columns(sql: &str) -> HashMap<String, &'static str> {
        let column_pattern =
            Regex::new(r"(?i)^\s*(\w+)\s+(INTEGER|TEXT|VARCHAR\(\d+\)|CHAR\(\d+\)|REAL|FLOAT|DOUBLE|BLOB|CLOB)")
                .expect("static pattern");
        sql.lines()
            .filter_map(|line| column_pattern.captures(line))
            .map(|cap| (cap[1].to_string(), Self::rust_type_for_sql(&cap[2])))
            .collect()
    }

    /// Flags a field whose declared Rust type doesn't match the type the
    /// database schema implies for a same-named column.
    fn validate_cross_layer(
        paths: &[String],
        contents: &HashMap<String, Vec<u8>>,
        schema_types: &HashMap<String, &'static str>,
    ) -> Result<(), String> {
        let field_pattern =
            Regex::new(r"(?m)^\s*(?:pub\s+)?(\w+)\s*:\s*([A-Za-z0-9_<>:, ]+?)\s*,?\s*$").expect("static pattern");

        for path in paths {
            let Some(text) = contents.get(path).and_then(|b| std::str::from_utf8(b).ok()) else { continue };
            for cap in field_pattern.captures_iter(text) {
                let field = &cap[1];
                let Some(expected) = schema_types.get(field) else { continue };
                let declared = cap[2].trim().trim_start_matches("Option<").trim_end_matches('>');
                if declared != *expected {
                    return Err(format!(
                        "{path}: field `{field}` declared as `{declared}` but database schema implies `{expected}`"
                    ));
                }
            }
        }
        Ok(())
    }
}
