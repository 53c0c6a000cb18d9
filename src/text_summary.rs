//! Text summary builder for CLI output.
//!
//! Formats human-readable lines for completed runs and scenario comparisons.

use crate::model::{AnalysisResult, FeasibilityOutcome, ScenarioComparison, RISK_LABELS};
use crate::orchestrator::Page;

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

/// Summarize a materialized run. Only well-known aggregate keys are shown; the
/// rest of the payload is left to presentation layers.
pub(crate) fn build_result_summary(
    run_id: &str,
    result: &AnalysisResult,
    pages: &[Page],
) -> TextSummary {
    let value = result.as_value();
    let mut lines = vec![
        format!("Run: {run_id}"),
        format!("Scenes: {}", result.scene_count()),
    ];

    if let Some(budget) = value.get("total_budget") {
        let amount = |key: &str| budget.get(key).and_then(|v| v.as_f64());
        if let (Some(min), Some(likely), Some(max)) =
            (amount("min"), amount("likely"), amount("max"))
        {
            lines.push(format!(
                "Budget: min {} likely {} max {}",
                format_money(min),
                format_money(likely),
                format_money(max)
            ));
        }
    }
    if let Some(insights) = value.get("cross_scene_insights").and_then(|v| v.as_array()) {
        lines.push(format!("Cross-scene insights: {}", insights.len()));
    }
    if let Some(summary) = value
        .get("executive_summary")
        .and_then(|s| s.get("summary").or(Some(s)))
        .and_then(|s| s.as_str())
    {
        if !summary.trim().is_empty() {
            lines.push(format!("Summary: {}", summary.trim()));
        }
    }

    let labels: Vec<&str> = pages.iter().map(|p| p.label()).collect();
    lines.push(format!("Available views: {}", labels.join(", ")));

    TextSummary { lines }
}

pub(crate) fn build_comparison_summary(label: &str, cmp: &ScenarioComparison) -> TextSummary {
    let (old, new, d) = (&cmp.old_state, &cmp.new_state, &cmp.deltas);
    let mut lines = vec![
        format!("Scenario: {label}"),
        format!(
            "Cost:        {} -> {} ({})",
            format_money(old.total_cost),
            format_money(new.total_cost),
            format_signed_money(d.cost_delta)
        ),
        format!(
            "Risk:        {:.1} -> {:.1} ({:+.1})",
            old.total_risk, new.total_risk, d.total_risk_delta
        ),
    ];

    if let Some(risk) = &d.risk_delta {
        let components: Vec<String> = RISK_LABELS
            .iter()
            .zip(risk.iter())
            .map(|(name, delta)| format!("{name} {delta:+.1}"))
            .collect();
        lines.push(format!("Risk deltas: {}", components.join(", ")));
    }
    lines.push(format!(
        "Feasibility: {:.1}% -> {:.1}% ({:+.1}%)",
        old.feasibility_score * 100.0,
        new.feasibility_score * 100.0,
        d.feasibility_delta * 100.0
    ));

    let verdict = match cmp.outcome {
        FeasibilityOutcome::ImprovesFeasibility => "This scenario IMPROVES feasibility",
        FeasibilityOutcome::ReducesFeasibility => "This scenario REDUCES feasibility",
    };
    lines.push(verdict.to_string());
    if let Some(reasoning) = d.reasoning.as_deref() {
        lines.push(format!("Reasoning: {reasoning}"));
    }

    TextSummary { lines }
}

/// Whole-dollar amount with thousands separators, e.g. `$10,500,000`.
fn format_money(amount: f64) -> String {
    let rounded = amount.round();
    let digits = format!("{:.0}", rounded.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if rounded < 0.0 {
        format!("-${grouped}")
    } else {
        format!("${grouped}")
    }
}

fn format_signed_money(amount: f64) -> String {
    if amount.round() > 0.0 {
        format!("+{}", format_money(amount))
    } else {
        format_money(amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ProductionState, ScenarioDelta};
    use serde_json::json;

    #[test]
    fn money_grouping() {
        assert_eq!(format_money(0.0), "$0");
        assert_eq!(format_money(999.4), "$999");
        assert_eq!(format_money(1_000.0), "$1,000");
        assert_eq!(format_money(10_500_000.0), "$10,500,000");
        assert_eq!(format_money(-500_000.0), "-$500,000");
        assert_eq!(format_signed_money(500_000.0), "+$500,000");
    }

    #[test]
    fn result_summary_lists_known_aggregates() {
        let result = AnalysisResult::new(json!({
            "total_scenes": 2,
            "scenes": [{}, {}],
            "total_budget": {"min": 100000, "likely": 150000, "max": 210000},
            "cross_scene_insights": [{}],
        }));
        let summary = build_result_summary("run-9", &result, &[Page::Home, Page::Analysis]);
        assert_eq!(
            summary.lines,
            vec![
                "Run: run-9",
                "Scenes: 2",
                "Budget: min $100,000 likely $150,000 max $210,000",
                "Cross-scene insights: 1",
                "Available views: home, analysis",
            ]
        );
    }

    #[test]
    fn comparison_summary_states_the_verdict() {
        let state = |cost, feasibility| ProductionState {
            total_cost: cost,
            total_risk: 100.0,
            risk_vector: Some([25.0; 4]),
            feasibility_score: feasibility,
        };
        let cmp = ScenarioComparison {
            old_state: state(1_000.0, 0.5),
            new_state: state(1_000.0, 0.5),
            deltas: ScenarioDelta {
                cost_delta: 0.0,
                risk_delta: None,
                total_risk_delta: 0.0,
                feasibility_delta: 0.0,
                reasoning: None,
            },
            outcome: FeasibilityOutcome::ReducesFeasibility,
        };
        let summary = build_comparison_summary("max_safety", &cmp);
        assert!(summary
            .lines
            .contains(&"This scenario REDUCES feasibility".to_string()));
        assert!(summary.lines.contains(&"Cost:        $1,000 -> $1,000 ($0)".to_string()));
        assert!(!summary.lines.iter().any(|l| l.starts_with("Risk deltas")));
    }
}
