//! PCD binary layout disambiguation.
//!
//! A plain `binary` PCD payload does not declare whether it is
//! point-major (interleaved) or field-major; producers emit both.
//! The resolver samples coordinates under each hypothesis and keeps
//! the one whose axis-aligned bounding box is non-degenerate and not
//! wildly larger — misreading bytes under the wrong hypothesis tends
//! to explode the apparent extent. This is a statistical heuristic,
//! not a format guarantee; when both hypotheses look comparable the
//! tie breaks deterministically to field-major.

use crate::pcd_header::PcdHeader;
use crate::pcd_value::{PcdLayout, read_scalar, value_offset};
use constants::{LAYOUT_EXTENT_SLACK, LAYOUT_PROBE_POINTS};

/// The x/y/z field indices of a schema, resolved once per decode.
#[derive(Debug, Clone, Copy)]
pub struct AxisFields {
    pub x: usize,
    pub y: usize,
    pub z: usize,
}

struct ProbeStats {
    valid_points: usize,
    extent_sum: f64,
}

fn probe(payload: &[u8], header: &PcdHeader, axes: &AxisFields, layout: PcdLayout) -> ProbeStats {
    let total = header.point_count as usize;
    let step = (total / LAYOUT_PROBE_POINTS).max(1);
    let mut valid_points = 0usize;
    let mut min = [f64::INFINITY; 3];
    let mut max = [f64::NEG_INFINITY; 3];

    let mut point = 0usize;
    while point < total && valid_points < LAYOUT_PROBE_POINTS {
        let sample = [axes.x, axes.y, axes.z].map(|index| {
            read_scalar(
                payload,
                value_offset(header, layout, index, point),
                &header.fields[index],
            )
            .ok()
        });
        if let [Some(x), Some(y), Some(z)] = sample
            && x.is_finite()
            && y.is_finite()
            && z.is_finite()
        {
            for (axis, value) in [x, y, z].into_iter().enumerate() {
                min[axis] = min[axis].min(value);
                max[axis] = max[axis].max(value);
            }
            valid_points += 1;
        }
        point += step;
    }

    let extent_sum = if valid_points > 0 {
        (max[0] - min[0]) + (max[1] - min[1]) + (max[2] - min[2])
    } else {
        0.0
    };
    ProbeStats {
        valid_points,
        extent_sum,
    }
}

/// Choose the layout of a plain `binary` payload.
///
/// Pure over its inputs, so resolution is idempotent: the same buffer
/// always yields the same choice.
pub fn resolve_layout(payload: &[u8], header: &PcdHeader, axes: &AxisFields) -> PcdLayout {
    let field_major = probe(payload, header, axes, PcdLayout::FieldMajor);
    let interleaved = probe(payload, header, axes, PcdLayout::Interleaved);

    if field_major.valid_points == 0 {
        return PcdLayout::Interleaved;
    }
    if interleaved.valid_points == 0 {
        return PcdLayout::FieldMajor;
    }
    // Smaller-or-comparable extent wins; comparable prefers field-major.
    if interleaved.extent_sum > field_major.extent_sum * LAYOUT_EXTENT_SLACK {
        return PcdLayout::FieldMajor;
    }
    if field_major.extent_sum > interleaved.extent_sum * LAYOUT_EXTENT_SLACK {
        return PcdLayout::Interleaved;
    }
    PcdLayout::FieldMajor
}
