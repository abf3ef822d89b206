use crate::utils::errors::{OrchestratorError, Result};

/// Largest share of total L1 stake a single change may move, in percent.
pub const MAX_WEIGHT_CHANGE_PERCENT: u64 = 20;

/// Outcome of the single-validator weight cap check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StakeCheck {
    /// Change is below the cap; carries the change as a percentage of total stake.
    Within { percentage: f64 },
    /// Total stake is unknown, enforcement is left to the contract.
    Skipped,
}

/// Reject a weight change that moves `MAX_WEIGHT_CHANGE_PERCENT` or more of
/// the total stake `total`. `current` is 0 for new validators. A `total` of
/// 0 means the total is not known and the check is skipped.
pub fn check_weight_change(proposed: u64, current: u64, total: u64) -> Result<StakeCheck> {
    if total == 0 {
        return Ok(StakeCheck::Skipped);
    }

    let delta = proposed as i128 - current as i128;
    let percentage = delta as f64 / total as f64 * 100.0;

    // delta / total >= 20 / 100, kept in integers
    if delta * 100 >= MAX_WEIGHT_CHANGE_PERCENT as i128 * total as i128 {
        return Err(OrchestratorError::Validation(format!(
            "weight change of {} ({:.2}% of total L1 stake {}) must stay below {}%",
            delta, percentage, total, MAX_WEIGHT_CHANGE_PERCENT
        )));
    }

    Ok(StakeCheck::Within { percentage })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_change_passes() {
        match check_weight_change(5, 0, 1000).unwrap() {
            StakeCheck::Within { percentage } => assert!((percentage - 0.5).abs() < f64::EPSILON),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn exactly_twenty_percent_is_rejected() {
        let err = check_weight_change(200, 0, 1000).unwrap_err();
        assert!(err.to_string().contains("20%"));
        assert!(check_weight_change(199, 0, 1000).is_ok());
    }

    #[test]
    fn change_is_relative_to_current_weight() {
        assert!(check_weight_change(300, 150, 1000).is_ok());
        assert!(check_weight_change(400, 150, 1000).is_err());
    }

    #[test]
    fn decreases_never_trip_the_cap() {
        assert!(check_weight_change(0, 900, 1000).is_ok());
    }

    #[test]
    fn unknown_total_skips_the_check() {
        for w in [0u64, 1, 1_000, u64::MAX] {
            assert_eq!(check_weight_change(w, 0, 0).unwrap(), StakeCheck::Skipped);
        }
    }

    #[test]
    fn boundary_holds_across_weights() {
        let total = 1_000u64;
        for w in 0..=400u64 {
            let rejected = check_weight_change(w, 0, total).is_err();
            assert_eq!(rejected, w * 100 >= 20 * total, "weight {}", w);
        }
    }
}
