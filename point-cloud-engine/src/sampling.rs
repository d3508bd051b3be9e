//! Byte-budget sampling.
//!
//! Given a memory budget and a per-point record size, decoding keeps
//! every Nth point. The stride is fixed up front so the decoded set is
//! deterministic regardless of chunking.

use constants::DEFAULT_BYTES_PER_POINT;

/// Deterministic stride plan for one decode.
///
/// Guarantees `target_points <= total_points` and
/// `target_points * bytes_per_point` within one point of the budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingPlan {
    /// Keep every Nth point, N >= 1.
    pub sample_every: u64,
    /// Upper bound on accepted points.
    pub target_points: u64,
}

/// Compute the stride plan for `total_points` records of
/// `bytes_per_point` bytes under a budget of `budget_mb` megabytes.
///
/// A zero `bytes_per_point` falls back to the documented default. An
/// empty cloud yields `sample_every = 1, target_points = 0`.
pub fn plan(total_points: u64, bytes_per_point: u32, budget_mb: f64) -> SamplingPlan {
    if total_points == 0 {
        return SamplingPlan {
            sample_every: 1,
            target_points: 0,
        };
    }
    let bytes_per_point = if bytes_per_point == 0 {
        DEFAULT_BYTES_PER_POINT
    } else {
        bytes_per_point
    };
    let budget_bytes = (budget_mb * 1024.0 * 1024.0).max(0.0);
    let capacity = (budget_bytes / f64::from(bytes_per_point)).floor() as u64;
    let target_points = capacity.max(1).min(total_points);
    let sample_every = total_points.div_ceil(target_points);
    SamplingPlan {
        sample_every,
        target_points,
    }
}
