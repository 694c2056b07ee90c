//! Numeric conversion helpers centralizing lossy casts.

use num_traits::cast::cast;

/// Ratio as a float percentage, 0.0 when `total` is zero.
#[must_use]
pub fn percent_f32(complete: u32, total: u32) -> f32 {
    if total == 0 {
        return 0.0;
    }
    let complete = cast::<u32, f32>(complete).unwrap_or(0.0);
    let total = cast::<u32, f32>(total).unwrap_or(1.0);
    complete / total * 100.0
}

/// Truncating integer percentage of float division, 0 when `total` is zero.
#[must_use]
pub fn percent(complete: u32, total: u32) -> u32 {
    cast::<f32, u32>(percent_f32(complete, total).trunc()).unwrap_or(0)
}

/// Truncate a non-negative f64 to u64, returning 0 for negative or non-finite values.
#[must_use]
pub fn truncate_f64_to_u64(value: f64) -> u64 {
    if !value.is_finite() || value < 0.0 {
        return 0;
    }
    cast::<f64, u64>(value.trunc()).unwrap_or(u64::MAX)
}

/// Convert u64 to f64 while allowing precision loss in a single location.
#[must_use]
pub fn u64_to_f64(value: u64) -> f64 {
    cast::<u64, f64>(value).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_truncates() {
        assert_eq!(percent(2, 3), 66);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(3, 3), 100);
        assert_eq!(percent(0, 0), 0);
        assert_eq!(percent(5, 0), 0);
    }

    #[test]
    fn percent_f32_matches_division() {
        assert!((percent_f32(1, 4) - 25.0).abs() < f32::EPSILON);
        assert!((percent_f32(0, 0) - 0.0).abs() < f32::EPSILON);
    }

    #[test]
    fn truncation_handles_edge_values() {
        assert_eq!(truncate_f64_to_u64(12.9), 12);
        assert_eq!(truncate_f64_to_u64(-1.0), 0);
        assert_eq!(truncate_f64_to_u64(f64::NAN), 0);
        assert!((u64_to_f64(90) - 90.0).abs() < f64::EPSILON);
    }
}
