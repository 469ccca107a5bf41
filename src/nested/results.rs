use std::collections::HashMap;

use serde_json::Value;

use crate::matcher::Params;
use crate::response::{merge_proxies, ResponseProxy};
use crate::tasks::TaskError;

/// Outcome of one matched layer
#[derive(Debug, Clone)]
pub struct NestedTaskResult {
    /// Pattern as it was registered
    pub pattern: String,
    pub data: Option<Value>,
    pub error: Option<TaskError>,
    /// False for pattern-only layers, which have nothing to run
    pub ran_task: bool,
}

impl NestedTaskResult {
    pub(crate) fn skipped(pattern: String) -> Self {
        Self {
            pattern,
            data: None,
            error: None,
            ran_task: false,
        }
    }

    #[must_use]
    pub fn ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcomes of every matched layer, outermost first
#[derive(Debug, Clone, Default)]
pub struct NestedTaskResults {
    pub params: Params,
    pub splat_values: Vec<String>,
    pub results: Vec<NestedTaskResult>,
    /// One proxy per layer, parallel to `results`
    pub response_proxies: Vec<ResponseProxy>,
    positions: HashMap<String, usize>,
}

impl NestedTaskResults {
    pub(crate) fn new(
        params: Params,
        splat_values: Vec<String>,
        results: Vec<NestedTaskResult>,
        response_proxies: Vec<ResponseProxy>,
    ) -> Self {
        let positions = results
            .iter()
            .enumerate()
            .map(|(i, r)| (r.pattern.clone(), i))
            .collect();
        Self {
            params,
            splat_values,
            results,
            response_proxies,
            positions,
        }
    }

    /// Result for a registered pattern, if it was part of the match
    #[must_use]
    pub fn get(&self, pattern: &str) -> Option<&NestedTaskResult> {
        self.positions.get(pattern).and_then(|&i| self.results.get(i))
    }

    /// Whether the layer at `index` ran a task
    #[must_use]
    pub fn has_task_handler(&self, index: usize) -> bool {
        self.results.get(index).is_some_and(|r| r.ran_task)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NestedTaskResult> {
        self.results.iter()
    }

    /// All layer proxies merged root-first
    #[must_use]
    pub fn merged_proxy(&self) -> ResponseProxy {
        merge_proxies(&self.response_proxies)
    }
}
