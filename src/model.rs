use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub api_base: String,
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub progress_interval: Duration,
    pub max_attempts: u32,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    pub user_agent: String,
}

/// Identifies one submitted analysis run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunHandle {
    pub run_id: String,
    pub submitted_at: time::OffsetDateTime,
}

impl RunHandle {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            submitted_at: time::OffsetDateTime::now_utc(),
        }
    }

    pub fn submitted_at_rfc3339(&self) -> String {
        self.submitted_at
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_else(|_| "unknown".into())
    }
}

/// Lifecycle of a single orchestrated run.
#[derive(Debug, Clone)]
pub enum RunState {
    Idle,
    Polling { progress: f64, attempts: u32 },
    Succeeded(AnalysisResult),
    TimedOut { attempts: u32 },
    Failed(CoreError),
}

/// Events emitted by a run orchestrator. Exactly one of `Succeeded`, `TimedOut`
/// or `Failed` is sent per orchestration, and it is always the last event.
#[derive(Debug, Clone)]
pub enum RunEvent {
    Progress {
        percent: f64,
    },
    Info(InfoEvent),
    Succeeded {
        // Box to keep RunEvent small; the analysis payload can be large.
        result: Box<AnalysisResult>,
        attempts: u32,
    },
    TimedOut {
        attempts: u32,
    },
    Failed {
        error: CoreError,
    },
}

impl RunEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunEvent::Succeeded { .. } | RunEvent::TimedOut { .. } | RunEvent::Failed { .. }
        )
    }
}

/// Structured info events consumed by CLI layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum InfoEvent {
    PollAttempt { attempt: u32, max_attempts: u32 },
    NotReady { attempt: u32 },
}

impl InfoEvent {
    /// Render a human-readable message for CLI layers.
    pub fn to_message(&self) -> String {
        match self {
            InfoEvent::PollAttempt {
                attempt,
                max_attempts,
            } => format!("Polling attempt {attempt}/{max_attempts}"),
            InfoEvent::NotReady { attempt } => {
                format!("Run still processing after attempt {attempt}, will retry")
            }
        }
    }
}

/// Materialized analysis payload as returned by the backend.
///
/// The shape is backend-defined and only inspected through
/// [`crate::orchestrator::readiness`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnalysisResult(serde_json::Value);

impl AnalysisResult {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    pub fn scene_count(&self) -> usize {
        crate::orchestrator::readiness::scene_count(&self.0)
    }
}

/// Risk components in backend order: safety, logistics, schedule, budget.
pub type RiskVector = [f64; 4];

pub const RISK_LABELS: [&str; 4] = ["safety", "logistics", "schedule", "budget"];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProductionState {
    pub total_cost: f64,
    pub total_risk: f64,
    /// Per-component risk; the backend's what-if states usually omit it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_vector: Option<RiskVector>,
    pub feasibility_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    BudgetCut20,
    AccelerateTimeline,
    MaxSafety,
}

impl Preset {
    pub const ALL: [Preset; 3] = [
        Preset::BudgetCut20,
        Preset::AccelerateTimeline,
        Preset::MaxSafety,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Preset::BudgetCut20 => "budget_cut_20",
            Preset::AccelerateTimeline => "accelerate_timeline",
            Preset::MaxSafety => "max_safety",
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Preset {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Preset::ALL
            .into_iter()
            .find(|p| p.as_str() == s.trim())
            .ok_or_else(|| {
                let known: Vec<&str> = Preset::ALL.iter().map(|p| p.as_str()).collect();
                CoreError::Validation(format!(
                    "unknown preset '{s}', expected one of: {}",
                    known.join(", ")
                ))
            })
    }
}

/// A single field override applied to one scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioChange {
    pub scene_id: String,
    pub field: String,
    pub new_value: serde_json::Value,
}

/// A what-if request: a named preset or an explicit ordered change list.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeSet {
    Preset(Preset),
    Custom(Vec<ScenarioChange>),
}

/// Request body for the custom what-if endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioRequest<'a> {
    pub changes: &'a [ScenarioChange],
}

/// Raw what-if response. Totals are always recomputed from the two states.
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioResponse {
    pub old_state: ProductionState,
    pub new_state: ProductionState,
    #[serde(default)]
    pub deltas: Option<BackendDeltas>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackendDeltas {
    /// Used only when the states themselves carry no risk vectors.
    #[serde(default)]
    pub risk_delta: Option<Vec<f64>>,
    #[serde(default)]
    pub reasoning: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioDelta {
    pub cost_delta: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_delta: Option<RiskVector>,
    pub total_risk_delta: f64,
    pub feasibility_delta: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeasibilityOutcome {
    ImprovesFeasibility,
    ReducesFeasibility,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioComparison {
    pub old_state: ProductionState,
    pub new_state: ProductionState,
    pub deltas: ScenarioDelta,
    pub outcome: FeasibilityOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub document_id: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub page_count: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartResponse {
    pub run_id: String,
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportInfo {
    pub report_id: String,
    pub status: String,
    #[serde(default)]
    pub generated_at: Option<String>,
    #[serde(default)]
    pub file_size_mb: Option<f64>,
    #[serde(default)]
    pub download_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_preset_is_a_validation_error() {
        let err = "split_crews".parse::<Preset>().unwrap_err();
        assert!(matches!(err, CoreError::Validation(ref m) if m.contains("split_crews")));
    }

    #[test]
    fn production_state_tolerates_missing_risk_vector() {
        let state: ProductionState = serde_json::from_value(serde_json::json!({
            "total_cost": 1200,
            "total_risk": 45,
            "feasibility_score": 0.7
        }))
        .unwrap();
        assert_eq!(state.risk_vector, None);
        assert_eq!(state.total_cost, 1200.0);
    }
}
