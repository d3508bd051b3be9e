//! PCD payload decoding.
//!
//! Supports `binary` payloads (layout resolved statistically) and
//! `binary_compressed` payloads (LZF, always field-major). Colour
//! comes from a packed `rgb`/`rgba` field — stored either as a raw
//! unsigned int or as a float whose bit pattern is the packed value —
//! or from split `r`/`g`/`b` scalar fields with per-point range
//! inference.

use crate::colour;
use crate::error::{DecodeError, Result};
use crate::events::{DecodeCtx, DecodeOutcome, DecodeProgress, PointChunk};
use crate::lzf;
use crate::pcd_header::{PcdDataMode, PcdHeader};
use crate::pcd_layout::{AxisFields, resolve_layout};
use crate::pcd_value::{PcdLayout, ensure_readable, read_packed_u32, read_scalar, value_offset};
use crate::sampling::SamplingPlan;
use crate::source::ByteSource;
use log::debug;

/// How often the sampling loop consults the scheduler.
const CHECK_INTERVAL: u64 = 1024;

/// Colour sources a PCD schema can declare.
#[derive(Debug, Clone, Copy)]
enum ColourFields {
    /// Packed 32-bit `rgb`/`rgba` value. Float-typed packed fields
    /// carry the integer in their bit pattern, so both storages read
    /// identically as raw little-endian bytes.
    Packed(usize),
    Split { r: usize, g: usize, b: usize },
    None,
}

fn colour_fields(header: &PcdHeader) -> ColourFields {
    if let Some(index) = header
        .find_field("rgb")
        .or_else(|| header.find_field("rgba"))
    {
        return ColourFields::Packed(index);
    }
    match (
        header.find_field("r"),
        header.find_field("g"),
        header.find_field("b"),
    ) {
        (Some(r), Some(g), Some(b)) => ColourFields::Split { r, g, b },
        _ => ColourFields::None,
    }
}

fn axis_fields(header: &PcdHeader) -> Result<AxisFields> {
    match (
        header.find_field("x"),
        header.find_field("y"),
        header.find_field("z"),
    ) {
        (Some(x), Some(y), Some(z)) => Ok(AxisFields { x, y, z }),
        (x, y, z) => {
            let missing: Vec<&str> = [("x", x), ("y", y), ("z", z)]
                .iter()
                .filter(|(_, index)| index.is_none())
                .map(|(name, _)| *name)
                .collect();
            Err(DecodeError::MissingRequiredFields(format!(
                "PCD schema lacks {}",
                missing.join("/")
            )))
        }
    }
}

/// Materialise the payload. Plain binary is read as-is;
/// `binary_compressed` carries a compressed/uncompressed size prefix
/// followed by the LZF stream, and is field-major by construction.
fn load_payload(
    source: &mut dyn ByteSource,
    header: &PcdHeader,
) -> Result<(Vec<u8>, Option<PcdLayout>)> {
    let payload_offset = header.payload_offset as u64;
    let payload_len = source.len().checked_sub(payload_offset).ok_or_else(|| {
        DecodeError::InvalidFormat("PCD payload offset past end of file".to_string())
    })?;

    match &header.data {
        PcdDataMode::Binary => {
            let payload = source.read_range(payload_offset, payload_len as usize)?;
            Ok((payload, None))
        }
        PcdDataMode::BinaryCompressed => {
            if payload_len < 8 {
                return Err(DecodeError::CorruptStream(
                    "compressed PCD payload lacks size prefix".to_string(),
                ));
            }
            let prefix = source.read_range(payload_offset, 8)?;
            let compressed_len =
                u32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as u64;
            let uncompressed_len =
                u32::from_le_bytes([prefix[4], prefix[5], prefix[6], prefix[7]]) as usize;
            if compressed_len > payload_len - 8 {
                return Err(DecodeError::CorruptStream(format!(
                    "compressed PCD payload declares {compressed_len} bytes, {} available",
                    payload_len - 8
                )));
            }
            let compressed = source.read_range(payload_offset + 8, compressed_len as usize)?;
            let payload = lzf::decompress(&compressed, uncompressed_len)?;
            Ok((payload, Some(PcdLayout::FieldMajor)))
        }
        PcdDataMode::Ascii => Err(DecodeError::Unsupported(
            "PCD DATA ascii is not supported; re-export as binary".to_string(),
        )),
        PcdDataMode::Unrecognised(token) => Err(DecodeError::Unsupported(format!(
            "PCD DATA mode '{token}' is not supported"
        ))),
    }
}

/// Decode a PCD payload under `plan`, emitting chunks of at most
/// `chunk_points` points through `ctx`.
pub fn decode_pcd(
    source: &mut dyn ByteSource,
    header: &PcdHeader,
    plan: &SamplingPlan,
    chunk_points: usize,
    ctx: &mut DecodeCtx<'_>,
) -> Result<DecodeOutcome> {
    let axes = axis_fields(header)?;
    for index in [axes.x, axes.y, axes.z] {
        ensure_readable(&header.fields[index])?;
    }
    let colour_source = colour_fields(header);
    if let ColourFields::Split { r, g, b } = colour_source {
        for index in [r, g, b] {
            ensure_readable(&header.fields[index])?;
        }
    }

    let (payload, forced_layout) = load_payload(source, header)?;

    let total = header.point_count;
    let stride = header.point_stride();
    let required = (total as usize)
        .checked_mul(stride)
        .ok_or_else(|| DecodeError::InvalidFormat("PCD payload extent overflows".to_string()))?;
    if payload.len() < required {
        return Err(DecodeError::CorruptStream(format!(
            "PCD payload holds {} of {required} expected bytes",
            payload.len()
        )));
    }

    let layout = forced_layout.unwrap_or_else(|| resolve_layout(&payload, header, &axes));
    debug!("PCD layout resolved: {layout:?}");

    let target = plan.target_points;
    let sample_every = plan.sample_every.max(1);
    let chunk_points = chunk_points.max(1);
    let has_colour = !matches!(colour_source, ColourFields::None);

    let mut positions: Vec<f32> = Vec::with_capacity(chunk_points * 3);
    let mut colours: Vec<f32> = Vec::new();
    let mut accepted: u64 = 0;
    let mut processed: u64 = 0;
    let mut iterations: u64 = 0;

    let mut point = 0u64;
    while point < total && accepted < target {
        if iterations % CHECK_INTERVAL == 0 {
            ctx.check_cancelled()?;
            ctx.checkpoint();
        }
        iterations += 1;

        let at = |index: usize| value_offset(header, layout, index, point as usize);
        let x = read_scalar(&payload, at(axes.x), &header.fields[axes.x])?;
        let y = read_scalar(&payload, at(axes.y), &header.fields[axes.y])?;
        let z = read_scalar(&payload, at(axes.z), &header.fields[axes.z])?;
        positions.extend([x as f32, y as f32, z as f32]);

        match colour_source {
            ColourFields::Packed(index) => {
                let packed = read_packed_u32(&payload, at(index), &header.fields[index])?;
                colours.extend([
                    ((packed >> 16) & 255) as f32 / 255.0,
                    ((packed >> 8) & 255) as f32 / 255.0,
                    (packed & 255) as f32 / 255.0,
                ]);
            }
            ColourFields::Split { r, g, b } => {
                let red = read_scalar(&payload, at(r), &header.fields[r])? as f32;
                let green = read_scalar(&payload, at(g), &header.fields[g])? as f32;
                let blue = read_scalar(&payload, at(b), &header.fields[b])? as f32;
                let scale = colour::infer_scale(red.max(green).max(blue));
                colours.extend([
                    colour::normalise(red, scale),
                    colour::normalise(green, scale),
                    colour::normalise(blue, scale),
                ]);
            }
            ColourFields::None => {}
        }

        accepted += 1;
        point += sample_every;
        processed = point.min(total);

        if positions.len() / 3 >= chunk_points {
            ctx.emit_chunk(take_chunk(&mut positions, &mut colours, has_colour));
        }
        ctx.emit_progress(DecodeProgress {
            total_points: total,
            processed_points: processed,
            accepted_points: accepted,
            sample_every,
        });
    }

    ctx.emit_chunk(take_chunk(&mut positions, &mut colours, has_colour));

    Ok(DecodeOutcome {
        total_points: total,
        processed_points: processed,
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
