//! What-if scenario comparison.
//!
//! The backend recomputes production state under hypothetical changes; this
//! module validates requests, derives the deltas from the returned pair, and
//! classifies the outcome.

mod delta;

use delta::{classify, derive_delta};

use crate::backend::ScenarioBackend;
use crate::error::CoreError;
use crate::model::{ChangeSet, Preset, ScenarioChange, ScenarioComparison};
use std::sync::Arc;

pub(crate) struct ScenarioEngine<B> {
    backend: Arc<B>,
}

impl<B> Clone for ScenarioEngine<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
        }
    }
}

impl<B: ScenarioBackend> ScenarioEngine<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    pub async fn run_preset(
        &self,
        run_id: &str,
        preset_name: &str,
    ) -> Result<ScenarioComparison, CoreError> {
        let preset: Preset = preset_name.parse()?;
        self.compare(run_id, &ChangeSet::Preset(preset)).await
    }

    pub async fn run_custom(
        &self,
        run_id: &str,
        changes: Vec<ScenarioChange>,
    ) -> Result<ScenarioComparison, CoreError> {
        self.compare(run_id, &ChangeSet::Custom(changes)).await
    }

    /// Validate, issue exactly one recompute request, and derive the comparison.
    pub async fn compare(
        &self,
        run_id: &str,
        change_set: &ChangeSet,
    ) -> Result<ScenarioComparison, CoreError> {
        validate(run_id, change_set)?;
        tracing::debug!(run_id, ?change_set, "requesting scenario recompute");

        let response = self.backend.recompute(run_id, change_set).await?;
        let deltas = derive_delta(&response.old_state, &response.new_state, response.deltas);
        let outcome = classify(deltas.feasibility_delta);

        tracing::info!(
            run_id,
            cost_delta = deltas.cost_delta,
            feasibility_delta = deltas.feasibility_delta,
            ?outcome,
            "scenario compared"
        );
        Ok(ScenarioComparison {
            old_state: response.old_state,
            new_state: response.new_state,
            deltas,
            outcome,
        })
    }
}

fn validate(run_id: &str, change_set: &ChangeSet) -> Result<(), CoreError> {
    if run_id.trim().is_empty() {
        return Err(CoreError::Validation("run id must not be empty".into()));
    }
    let ChangeSet::Custom(changes) = change_set else {
        return Ok(());
    };
    if changes.is_empty() {
        return Err(CoreError::Validation(
            "a custom scenario needs at least one change".into(),
        ));
    }
    for (idx, change) in changes.iter().enumerate() {
        if change.scene_id.trim().is_empty() || change.field.trim().is_empty() {
            return Err(CoreError::Validation(format!(
                "change #{} needs both a scene id and a field",
                idx + 1
            )));
        }
    }
    Ok(())
}
