//! Colour dynamic-range inference and normalisation.
//!
//! Producers disagree about colour ranges: nominally 16-bit LAS
//! channels often carry 8-bit data, and PCD split channels may be
//! floats in [0, 1]. The scale is inferred from observed values once
//! per decode (LAS) or per point (PCD split channels), matching how
//! the rest of the pipeline treats ranges.

/// Scale divisor for a component of unknown range.
pub fn infer_scale(max_component: f32) -> f32 {
    if max_component <= 1.0 {
        1.0
    } else if max_component <= 255.0 {
        255.0
    } else {
        65535.0
    }
}

/// Scale divisor for 16-bit channels that may hold 8-bit data.
pub fn infer_wide_scale(max_component: u16) -> f32 {
    if max_component > 255 { 65535.0 } else { 255.0 }
}

/// Normalise one channel to [0, 1].
pub fn normalise(value: f32, scale: f32) -> f32 {
    (value / scale).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_follows_observed_range() {
        assert_eq!(infer_scale(0.7), 1.0);
        assert_eq!(infer_scale(200.0), 255.0);
        assert_eq!(infer_scale(4096.0), 65535.0);
        assert_eq!(infer_wide_scale(255), 255.0);
        assert_eq!(infer_wide_scale(256), 65535.0);
    }

    #[test]
    fn normalise_clamps() {
        assert_eq!(normalise(510.0, 255.0), 1.0);
        assert_eq!(normalise(-1.0, 255.0), 0.0);
        assert!((normalise(128.0, 255.0) - 0.501_96).abs() < 1e-4);
    }
}
