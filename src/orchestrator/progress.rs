//! Synthetic progress for runs that report none.
//!
//! The backend exposes no progress channel, so the displayed value is an
//! estimate that keeps moving but never reaches completion on its own.

use rand::Rng;

/// Highest value an estimate may reach before the run is confirmed complete.
pub(crate) const PROGRESS_CEILING: f64 = 95.0;
/// Value reported once the run is confirmed complete.
pub(crate) const PROGRESS_COMPLETE: f64 = 100.0;

const MIN_STEP: f64 = 0.5;
const MAX_STEP: f64 = 20.0;

/// Advance a progress estimate by one tick.
///
/// Below the ceiling the result is strictly greater than `previous` and never
/// above [`PROGRESS_CEILING`]. At or above the ceiling the estimate holds.
pub(crate) fn next_estimate<R: Rng + ?Sized>(previous: f64, rng: &mut R) -> f64 {
    // NaN and negative inputs restart from zero.
    let previous = previous.max(0.0);
    if previous >= PROGRESS_CEILING {
        return previous.min(PROGRESS_CEILING);
    }
    let step = rng.gen_range(MIN_STEP..=MAX_STEP);
    (previous + step).min(PROGRESS_CEILING)
}

/// Pipeline step shown for a progress value.
const STEPS: [(f64, &str); 8] = [
    (10.0, "Uploading script"),
    (25.0, "Extracting scenes"),
    (40.0, "Analyzing risks"),
    (60.0, "Estimating budget"),
    (75.0, "Finding insights"),
    (85.0, "Optimizing locations"),
    (95.0, "Optimizing schedule"),
    (100.0, "Finalizing report"),
];

pub(crate) fn step_label(percent: f64) -> &'static str {
    STEPS
        .iter()
        .find(|(upper, _)| percent < *upper)
        .map(|(_, label)| *label)
        .unwrap_or("Finalizing report")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn estimate_strictly_increases_below_ceiling() {
        let mut rng = StdRng::seed_from_u64(7);
        for seed_value in [0.0, 1.5, 42.0, 80.0, 94.0, 94.99] {
            for _ in 0..200 {
                let next = next_estimate(seed_value, &mut rng);
                assert!(next > seed_value, "{next} <= {seed_value}");
                assert!(next < PROGRESS_COMPLETE);
                assert!(next <= PROGRESS_CEILING);
            }
        }
    }

    #[test]
    fn estimate_holds_at_ceiling() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(next_estimate(95.0, &mut rng), 95.0);
        assert_eq!(next_estimate(99.0, &mut rng), 95.0);
    }

    #[test]
    fn repeated_ticks_converge_on_ceiling() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut p = 0.0;
        for _ in 0..1_000 {
            let next = next_estimate(p, &mut rng);
            assert!(next >= p);
            p = next;
        }
        assert_eq!(p, PROGRESS_CEILING);
    }

    #[test]
    fn garbage_input_restarts_from_zero() {
        let mut rng = StdRng::seed_from_u64(9);
        let next = next_estimate(f64::NAN, &mut rng);
        assert!(next > 0.0 && next <= MAX_STEP);
        let next = next_estimate(-10.0, &mut rng);
        assert!(next > 0.0 && next <= MAX_STEP);
    }

    #[test]
    fn step_labels_follow_pipeline_ranges() {
        assert_eq!(step_label(0.0), "Uploading script");
        assert_eq!(step_label(10.0), "Extracting scenes");
        assert_eq!(step_label(59.9), "Estimating budget");
        assert_eq!(step_label(95.0), "Finalizing report");
        assert_eq!(step_label(100.0), "Finalizing report");
    }
}
