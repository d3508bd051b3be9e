//! Streaming fixed-point LAS decoder.
//!
//! Reads the point-data region in bounded byte windows, keeps every
//! Nth record against a running points-seen counter (so the stride is
//! exact across window boundaries), and converts stored integers to
//! world coordinates with the header scale/offset. Used for LAS 1.4+
//! files the batch reader collaborator does not cover.

use crate::colour;
use crate::error::Result;
use crate::events::{DecodeCtx, DecodeOutcome, DecodeProgress, PointChunk};
use crate::las_header::LasHeader;
use crate::sampling::SamplingPlan;
use crate::source::ByteSource;
use constants::{DECODE_WINDOW_BYTES, DEFAULT_BYTES_PER_POINT};

/// How often the per-point loop consults the scheduler and abort flag.
const CHECK_INTERVAL: usize = 4096;

fn i32_at(buf: &[u8], offset: usize) -> i32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[offset..offset + 4]);
    i32::from_le_bytes(bytes)
}

fn u16_at(buf: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([buf[offset], buf[offset + 1]])
}

/// Infer the colour divisor from the first window: any channel above
/// 255 marks the whole stream as 16-bit scaled.
fn infer_colour_scale(window: &[u8], record_len: usize, colour_offset: usize) -> f32 {
    let mut max_component = 0u16;
    for base in (0..window.len().saturating_sub(record_len - 1)).step_by(record_len) {
        let at = base + colour_offset;
        max_component = max_component
            .max(u16_at(window, at))
            .max(u16_at(window, at + 2))
            .max(u16_at(window, at + 4));
        if max_component > 255 {
            break;
        }
    }
    colour::infer_wide_scale(max_component)
}

/// Decode the point-data region of `source` under `plan`, emitting
/// chunks of at most `chunk_points` points through `ctx`.
pub fn decode_las_stream(
    source: &mut dyn ByteSource,
    header: &LasHeader,
    plan: &SamplingPlan,
    chunk_points: usize,
    ctx: &mut DecodeCtx<'_>,
) -> Result<DecodeOutcome> {
    header.validate_extent(source.len())?;

    let record_len = if header.record_length > 0 {
        usize::from(header.record_length)
    } else {
        DEFAULT_BYTES_PER_POINT as usize
    };
    let total = header.point_count;
    let target = plan.target_points;
    let sample_every = plan.sample_every.max(1);
    let colour_offset = header.colour_offset();
    let mut colour_scale: Option<f32> = None;

    let points_per_window = (DECODE_WINDOW_BYTES / record_len).max(1) as u64;
    let chunk_points = chunk_points.max(1);

    let mut positions: Vec<f32> = Vec::with_capacity(chunk_points * 3);
    let mut colours: Vec<f32> = Vec::new();
    let mut seen: u64 = 0;
    let mut accepted: u64 = 0;

    let mut window_start: u64 = 0;
    while window_start < total && accepted < target {
        ctx.check_cancelled()?;

        let count = points_per_window.min(total - window_start) as usize;
        let byte_offset =
            u64::from(header.offset_to_point_data) + window_start * record_len as u64;
        let window = source.read_range(byte_offset, count * record_len)?;

        if let Some(offset) = colour_offset {
            colour_scale.get_or_insert_with(|| infer_colour_scale(&window, record_len, offset));
        }
        let scale = colour_scale.unwrap_or(65535.0);

        for i in 0..count {
            if i % CHECK_INTERVAL == 0 {
                ctx.check_cancelled()?;
                ctx.checkpoint();
            }

            let current = seen;
            seen += 1;
            if current % sample_every != 0 {
                continue;
            }

            let base = i * record_len;
            let ix = i32_at(&window, base);
            let iy = i32_at(&window, base + 4);
            let iz = i32_at(&window, base + 8);
            positions.push((f64::from(ix) * header.scale[0] + header.offset[0]) as f32);
            positions.push((f64::from(iy) * header.scale[1] + header.offset[1]) as f32);
            positions.push((f64::from(iz) * header.scale[2] + header.offset[2]) as f32);

            if let Some(offset) = colour_offset {
                let at = base + offset;
                colours.push(colour::normalise(f32::from(u16_at(&window, at)), scale));
                colours.push(colour::normalise(f32::from(u16_at(&window, at + 2)), scale));
                colours.push(colour::normalise(f32::from(u16_at(&window, at + 4)), scale));
            }

            accepted += 1;
            if positions.len() / 3 >= chunk_points {
                ctx.emit_chunk(take_chunk(&mut positions, &mut colours, colour_offset.is_some()));
            }
            if accepted >= target {
                break;
            }
        }

        window_start += count as u64;
        ctx.emit_progress(DecodeProgress {
            total_points: total,
            processed_points: seen,
            accepted_points: accepted,
            sample_every,
        });
    }

    ctx.emit_chunk(take_chunk(&mut positions, &mut colours, colour_offset.is_some()));

    Ok(DecodeOutcome {
        total_points: total,
        processed_points: seen,
        accepted_points: accepted,
        sample_every,
    })
}

fn take_chunk(positions: &mut Vec<f32>, colours: &mut Vec<f32>, has_colour: bool) -> PointChunk {
    PointChunk {
        positions: std::mem::take(positions),
        colours: if has_colour {
            Some(std::mem::take(colours))
        } else {
            None
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colour_scale_detects_eight_bit_data() {
        // Three format-2 records, 26 bytes each, colours at +20.
        let mut window = vec![0u8; 26 * 3];
        window[20..22].copy_from_slice(&200u16.to_le_bytes());
        window[26 + 22..26 + 24].copy_from_slice(&255u16.to_le_bytes());
        assert_eq!(infer_colour_scale(&window, 26, 20), 255.0);
        window[52 + 24..52 + 26].copy_from_slice(&4096u16.to_le_bytes());
        assert_eq!(infer_colour_scale(&window, 26, 20), 65535.0);
    }
}
