//! Backend contract consumed by the orchestrator and the scenario engine.
//!
//! The traits are the seams the core depends on; [`BackendClient`] is the HTTP
//! implementation used by the CLI.

mod http;

pub(crate) use http::BackendClient;

use crate::error::CoreError;
use crate::model::{ChangeSet, ScenarioResponse};
use async_trait::async_trait;

/// Fetches the current materialized result for a run. No retry or timing logic.
#[async_trait]
pub(crate) trait JobStatusClient: Send + Sync {
    /// Returns the raw result body, or [`CoreError::NotReadyYet`] while the run is
    /// still processing. Any other error is fatal for the orchestration.
    async fn fetch(&self, run_id: &str) -> Result<serde_json::Value, CoreError>;
}

/// Asks the backend to recompute production state under hypothetical changes.
#[async_trait]
pub(crate) trait ScenarioBackend: Send + Sync {
    async fn recompute(
        &self,
        run_id: &str,
        change_set: &ChangeSet,
    ) -> Result<ScenarioResponse, CoreError>;
}
