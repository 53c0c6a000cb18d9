use crate::model::{BackendDeltas, FeasibilityOutcome, ProductionState, RiskVector, ScenarioDelta};

/// Deltas between two states, computed so that `new == old + delta` holds for
/// cost, feasibility and, when both states carry one, every risk component.
///
/// Without both risk vectors the per-component delta falls back to the
/// backend's own `risk_delta`, and is left out when that is missing too.
pub(crate) fn derive_delta(
    old: &ProductionState,
    new: &ProductionState,
    backend: Option<BackendDeltas>,
) -> ScenarioDelta {
    let backend = backend.unwrap_or_default();
    let risk_delta = match (old.risk_vector, new.risk_vector) {
        (Some(old_v), Some(new_v)) => Some(std::array::from_fn(|i| new_v[i] - old_v[i])),
        _ => backend.risk_delta.as_deref().and_then(leading_components),
    };
    ScenarioDelta {
        cost_delta: new.total_cost - old.total_cost,
        risk_delta,
        total_risk_delta: new.total_risk - old.total_risk,
        feasibility_delta: new.feasibility_score - old.feasibility_score,
        reasoning: backend.reasoning,
    }
}

/// The four labelled components; trailing extras (e.g. compliance) are ignored.
fn leading_components(values: &[f64]) -> Option<RiskVector> {
    let head = values.get(..4)?;
    Some(std::array::from_fn(|i| head[i]))
}

/// Only a strictly positive delta improves feasibility; zero counts as reducing.
pub(crate) fn classify(feasibility_delta: f64) -> FeasibilityOutcome {
    if feasibility_delta > 0.0 {
        FeasibilityOutcome::ImprovesFeasibility
    } else {
        FeasibilityOutcome::ReducesFeasibility
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_boundary() {
        assert_eq!(classify(0.0), FeasibilityOutcome::ReducesFeasibility);
        assert_eq!(classify(-0.0), FeasibilityOutcome::ReducesFeasibility);
        assert_eq!(classify(f64::NAN), FeasibilityOutcome::ReducesFeasibility);
        assert_eq!(classify(-0.01), FeasibilityOutcome::ReducesFeasibility);
        assert_eq!(classify(1e-12), FeasibilityOutcome::ImprovesFeasibility);
    }

    #[test]
    fn old_plus_delta_reproduces_new() {
        let old = ProductionState {
            total_cost: 1_234_567.5,
            total_risk: 61.0,
            risk_vector: Some([12.0, 22.0, 9.0, 18.0]),
            feasibility_score: 0.5933,
        };
        let new = ProductionState {
            total_cost: 987_654.25,
            total_risk: 73.0,
            risk_vector: Some([19.0, 20.0, 15.0, 19.0]),
            feasibility_score: 0.5133,
        };
        let d = derive_delta(&old, &new, None);

        assert!((old.total_cost + d.cost_delta - new.total_cost).abs() < 1e-6);
        assert!((old.total_risk + d.total_risk_delta - new.total_risk).abs() < 1e-9);
        assert!((old.feasibility_score + d.feasibility_delta - new.feasibility_score).abs() < 1e-12);
        let (old_v, new_v) = (old.risk_vector.unwrap(), new.risk_vector.unwrap());
        let risk = d.risk_delta.unwrap();
        for i in 0..4 {
            assert_eq!(old_v[i] + risk[i], new_v[i]);
        }
    }

    fn state_without_vector(total_risk: f64) -> ProductionState {
        ProductionState {
            total_cost: 1_000.0,
            total_risk,
            risk_vector: None,
            feasibility_score: 0.5,
        }
    }

    #[test]
    fn missing_vectors_use_backend_components() {
        let backend = BackendDeltas {
            risk_delta: Some(vec![-30.0, -10.0, -10.0, -10.0, -5.0]),
            reasoning: None,
        };
        let d = derive_delta(
            &state_without_vector(200.0),
            &state_without_vector(140.0),
            Some(backend),
        );
        assert_eq!(d.risk_delta, Some([-30.0, -10.0, -10.0, -10.0]));
        assert_eq!(d.total_risk_delta, -60.0);
    }

    #[test]
    fn no_vector_anywhere_leaves_components_unknown() {
        let d = derive_delta(&state_without_vector(200.0), &state_without_vector(140.0), None);
        assert_eq!(d.risk_delta, None);
        assert_eq!(d.total_risk_delta, -60.0);

        let short = BackendDeltas {
            risk_delta: Some(vec![1.0, 2.0]),
            reasoning: None,
        };
        let d = derive_delta(
            &state_without_vector(200.0),
            &state_without_vector(140.0),
            Some(short),
        );
        assert_eq!(d.risk_delta, None);
    }
}
