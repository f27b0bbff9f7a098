use crate::rule_list::RuleListEngine;
use filterdns_domain::{BlockedServiceId, FilterError};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::warn;

/// `{"blocked_services":[{"id":"...", "rules":[...]}, ...]}` (spec §6).
#[derive(Debug, Deserialize)]
struct ServiceIndex {
    blocked_services: Vec<ServiceEntry>,
}

#[derive(Debug, Deserialize)]
struct ServiceEntry {
    id: String,
    rules: Vec<String>,
}

/// Immutable `BlockedServiceId -> RuleListEngine` index compiled from a JSON
/// document (spec §4.7). Grounded on the teacher's JSON-index-then-atomic-
/// swap shape used for the block filter's own index (`compile_block_index`),
/// adapted to a `RwLock<HashMap<..>>` wholesale replace since there's no
/// existing readers-vs-writer split finer than "swap the whole map".
pub struct ServiceBlocker {
    services: RwLock<HashMap<BlockedServiceId, Arc<RuleListEngine>>>,
}

impl ServiceBlocker {
    pub fn new() -> Self {
        Self {
            services: RwLock::new(HashMap::new()),
        }
    }

    /// Parses `json_text`, compiles each service's rules into its own
    /// `RuleListEngine`, and atomically swaps the whole map in. A blocked
    /// service never gets its own Result Cache: it is always evaluated as
    /// part of a Composite's single merged pass (spec §4.9 pass A).
    pub fn compile(&self, json_text: &str) -> Result<usize, FilterError> {
        let index: ServiceIndex = serde_json::from_str(json_text)?;
        let mut compiled = HashMap::with_capacity(index.blocked_services.len());

        for entry in index.blocked_services {
            let id = match BlockedServiceId::new(&entry.id) {
                Ok(id) => id,
                Err(e) => {
                    warn!(id = %entry.id, error = %e, "skipping blocked-service with invalid id");
                    continue;
                }
            };
            let text = entry.rules.join("\n");
            compiled.insert(id, Arc::new(RuleListEngine::from_text(&text, None)));
        }

        let count = compiled.len();
        *self.services.write().unwrap() = compiled;
        Ok(count)
    }

    /// Returns the compiled engine for every requested id that is currently
    /// installed. Unknown ids are logged and skipped (spec §4.7 "Missing IDs
    /// are logged (warn) and skipped").
    pub fn engines_for(&self, ids: &[BlockedServiceId]) -> Vec<(BlockedServiceId, Arc<RuleListEngine>)> {
        let guard = self.services.read().unwrap();
        ids.iter()
            .filter_map(|id| match guard.get(id) {
                Some(engine) => Some((id.clone(), engine.clone())),
                None => {
                    warn!(id = %id, "blocked service id not found in compiled index");
                    None
                }
            })
            .collect()
    }

    pub fn installed_count(&self) -> usize {
        self.services.read().unwrap().len()
    }
}

impl Default for ServiceBlocker {
    fn default() -> Self {
        Self::new()
    }
}
