//! ============================================================================
//! Importance Model - Usage-adjusted importance, reinforcement, decay
//! ============================================================================
//! Raw importance lives in [0.1, 1.0]. Effective importance amplifies it
//! by log-scaled access frequency so retrieval adapts to both content
//! quality and usage patterns.
//! ============================================================================

/// Lower clamp for raw importance
pub const IMPORTANCE_FLOOR: f32 = 0.1;
/// Upper clamp for raw importance
pub const IMPORTANCE_CEILING: f32 = 1.0;

/// `importance * (1 + ln(access_count + 1))`
pub fn effective_importance(importance: f32, access_count: u32) -> f32 {
    importance * (1.0 + ((access_count as f32) + 1.0).ln())
}

/// Multiply by the reinforcement factor (> 1.0), clamped to [0.1, 1.0].
/// The caller is responsible for bumping access_count and last_accessed.
pub fn reinforce(importance: f32, factor: f32) -> f32 {
    (importance * factor).clamp(IMPORTANCE_FLOOR, IMPORTANCE_CEILING)
}

/// Multiply by the decay factor (< 1.0), clamped to [0.1, 1.0].
/// Access count is unaffected by decay.
pub fn decay(importance: f32, factor: f32) -> f32 {
    (importance * factor).clamp(IMPORTANCE_FLOOR, IMPORTANCE_CEILING)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_equals_raw_at_zero_accesses() {
        for raw in [0.1, 0.5, 1.0] {
            assert!((effective_importance(raw, 0) - raw).abs() < 1e-6);
        }
    }

    #[test]
    fn effective_is_strictly_increasing_in_access_count() {
        let mut previous = effective_importance(0.4, 0);
        for count in 1..50 {
            let current = effective_importance(0.4, count);
            assert!(current > previous, "not increasing at count {}", count);
            previous = current;
        }
    }

    #[test]
    fn repeated_reinforcement_stays_clamped() {
        let mut importance = 0.5;
        for _ in 0..100 {
            importance = reinforce(importance, 1.1);
            assert!(importance <= IMPORTANCE_CEILING);
        }
        assert_eq!(importance, IMPORTANCE_CEILING);
    }

    #[test]
    fn repeated_decay_stays_clamped() {
        let mut importance = 0.5;
        for _ in 0..100 {
            importance = decay(importance, 0.95);
            assert!(importance >= IMPORTANCE_FLOOR);
        }
        assert_eq!(importance, IMPORTANCE_FLOOR);
    }
}
