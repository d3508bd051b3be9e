//! Batch LAS path.
//!
//! LAS 1.3 and earlier (including LAZ compression) is delegated to
//! the `las` crate reader, which handles record parsing and
//! decompression. The stride and colour-normalisation policy is the
//! same one the streaming path applies; only the record parsing
//! differs.

use crate::colour;
use crate::error::{DecodeError, Result};
use crate::events::{DecodeCtx, DecodeOutcome, DecodeProgress, PointChunk};
use crate::las_header::LasHeader;
use crate::sampling::SamplingPlan;
use crate::source::{ByteSource, SourceReader};
use las::Reader;
use std::io::BufReader;

/// Points drained from the reader per batch.
const BATCH_POINTS: usize = 16_384;

/// One reader batch adapted to interleaved buffers. The batch reader
/// hands back typed points; this is the boundary where they become
/// plain position/colour arrays.
#[derive(Default)]
struct BatchBuffers {
    positions: Vec<f64>,
    colours: Option<Vec<u16>>,
}

impl BatchBuffers {
    fn push(&mut self, point: &las::Point) {
        self.positions.extend([point.x, point.y, point.z]);
        if let Some(colour) = point.color {
            self.colours
                .get_or_insert_with(|| Vec::with_capacity(BATCH_POINTS * 3))
                .extend([colour.red, colour.green, colour.blue]);
        }
    }

    fn point_count(&self) -> usize {
        self.positions.len() / 3
    }
}

/// Decode a LAS/LAZ file through the batch reader collaborator.
pub fn decode_las_batches(
    source: Box<dyn ByteSource + Send + Sync>,
    header: &LasHeader,
    plan: &SamplingPlan,
    chunk_points: usize,
    ctx: &mut DecodeCtx<'_>,
) -> Result<DecodeOutcome> {
    // A LAZ file's on-disk size is smaller than count * record length,
    // so the raw extent invariant only applies to uncompressed input.
    if !header.is_compressed() {
        header.validate_extent(source.len())?;
    }

    let reader = SourceReader::new(source);
    let mut reader = Reader::new(BufReader::new(reader))
        .map_err(|err| DecodeError::InvalidFormat(format!("LAS batch reader: {err}")))?;

    let total = header.point_count;
    let target = plan.target_points;
    let sample_every = plan.sample_every.max(1);
    let chunk_points = chunk_points.max(1);

    let mut colour_scale: Option<f32> = None;
    let mut positions: Vec<f32> = Vec::with_capacity(chunk_points * 3);
    let mut colours: Vec<f32> = Vec::new();
    let mut emit_colours = false;
    let mut seen: u64 = 0;
    let mut accepted: u64 = 0;

    let mut points = reader.points();
    'stream: loop {
        ctx.check_cancelled()?;

        let mut batch = BatchBuffers::default();
        for result in points.by_ref().take(BATCH_POINTS) {
            let point = result
                .map_err(|err| DecodeError::CorruptStream(format!("LAS point record: {err}")))?;
            batch.push(&point);
        }
        if batch.point_count() == 0 {
            break;
        }

        // Colour scale is inferred once, from the first coloured batch.
        if let Some(channels) = &batch.colours {
            let scale = *colour_scale.get_or_insert_with(|| {
                channels
                    .iter()
                    .take(3000)
                    .copied()
                    .max()
                    .map(colour::infer_wide_scale)
                    .unwrap_or(255.0)
            });
            emit_colours = true;

            for i in 0..batch.point_count() {
                ctx.check_cancelled()?;
                let current = seen;
                seen += 1;
                if current % sample_every != 0 {
                    continue;
                }
                let base = i * 3;
                positions.extend(batch.positions[base..base + 3].iter().map(|v| *v as f32));
                colours.extend(
                    channels[base..base + 3]
                        .iter()
                        .map(|v| colour::normalise(f32::from(*v), scale)),
                );
                accepted += 1;
                if positions.len() / 3 >= chunk_points {
                    ctx.emit_chunk(take_chunk(&mut positions, &mut colours, emit_colours));
                }
                if accepted >= target {
                    break 'stream;
                }
            }
        } else {
            for i in 0..batch.point_count() {
                ctx.check_cancelled()?;
                let current = seen;
                seen += 1;
                if current % sample_every != 0 {
                    continue;
                }
                let base = i * 3;
                positions.extend(batch.positions[base..base + 3].iter().map(|v| *v as f32));
                accepted += 1;
                if positions.len() / 3 >= chunk_points {
                    ctx.emit_chunk(take_chunk(&mut positions, &mut colours, emit_colours));
                }
                if accepted >= target {
                    break 'stream;
                }
            }
        }

        ctx.checkpoint();
        ctx.emit_progress(DecodeProgress {
            total_points: total,
            processed_points: seen,
            accepted_points: accepted,
            sample_every,
        });
    }

    ctx.emit_chunk(take_chunk(&mut positions, &mut colours, emit_colours));

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
