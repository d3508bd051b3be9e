//! Shared fixture builders for integration tests.
#![allow(dead_code)]

/// Build a LAS 1.4 file with point data record format 2 (26-byte
/// records, RGB at offset 20). Coordinates are stored as raw integers
/// scaled by 0.01 against the given offset.
pub fn las14_format2(points: &[([i32; 3], [u16; 3])], offset: [f64; 3]) -> Vec<u8> {
    const HEADER_BYTES: usize = 375;
    const RECORD_BYTES: usize = 26;

    let mut buf = vec![0u8; HEADER_BYTES + points.len() * RECORD_BYTES];
    buf[0..4].copy_from_slice(b"LASF");
    buf[24] = 1; // version major
    buf[25] = 4; // version minor
    buf[94..96].copy_from_slice(&(HEADER_BYTES as u16).to_le_bytes());
    buf[96..100].copy_from_slice(&(HEADER_BYTES as u32).to_le_bytes());
    buf[104] = 2; // point format
    buf[105..107].copy_from_slice(&(RECORD_BYTES as u16).to_le_bytes());
    buf[107..111].copy_from_slice(&(points.len() as u32).to_le_bytes());
    for axis in 0..3 {
        buf[131 + axis * 8..139 + axis * 8].copy_from_slice(&0.01f64.to_le_bytes());
        buf[155 + axis * 8..163 + axis * 8].copy_from_slice(&offset[axis].to_le_bytes());
    }
    buf[247..255].copy_from_slice(&(points.len() as u64).to_le_bytes());

    for (i, (position, colour)) in points.iter().enumerate() {
        let base = HEADER_BYTES + i * RECORD_BYTES;
        for axis in 0..3 {
            buf[base + axis * 4..base + axis * 4 + 4]
                .copy_from_slice(&position[axis].to_le_bytes());
        }
        for channel in 0..3 {
            buf[base + 20 + channel * 2..base + 22 + channel * 2]
                .copy_from_slice(&colour[channel].to_le_bytes());
        }
    }
    buf
}

/// Build a PCD file from a header description and a raw payload.
pub fn pcd_file(fields: &[(&str, u32, char)], points: usize, data: &str, payload: &[u8]) -> Vec<u8> {
    let names: Vec<&str> = fields.iter().map(|(name, _, _)| *name).collect();
    let sizes: Vec<String> = fields.iter().map(|(_, size, _)| size.to_string()).collect();
    let types: Vec<String> = fields.iter().map(|(_, _, ty)| ty.to_string()).collect();
    let counts: Vec<&str> = fields.iter().map(|_| "1").collect();
    let header = format!(
        "# .PCD v0.7 - Point Cloud Data file format\n\
         VERSION 0.7\n\
         FIELDS {}\n\
         SIZE {}\n\
         TYPE {}\n\
         COUNT {}\n\
         WIDTH {points}\n\
         HEIGHT 1\n\
         VIEWPOINT 0 0 0 1 0 0 0\n\
         POINTS {points}\n\
         DATA {data}\n",
        names.join(" "),
        sizes.join(" "),
        types.join(" "),
        counts.join(" "),
    );
    let mut buf = header.into_bytes();
    buf.extend_from_slice(payload);
    buf
}

/// Interleave per-point field values into a binary PCD payload.
pub fn interleave(points: &[Vec<Vec<u8>>]) -> Vec<u8> {
    let mut payload = Vec::new();
    for point in points {
        for value in point {
            payload.extend_from_slice(value);
        }
    }
    payload
}

/// Lay the same values out field-major (all of field 0, then all of
/// field 1, and so on).
pub fn field_major(points: &[Vec<Vec<u8>>]) -> Vec<u8> {
    let fields = points.first().map(Vec::len).unwrap_or(0);
    let mut payload = Vec::new();
    for field in 0..fields {
        for point in points {
            payload.extend_from_slice(&point[field]);
        }
    }
    payload
}

/// Minimal valid LZF encoding: literal runs only, at most 32 bytes per
/// run. Decompresses to exactly `input`.
pub fn lzf_literal_compress(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len() + input.len() / 32 + 1);
    for run in input.chunks(32) {
        out.push((run.len() - 1) as u8);
        out.extend_from_slice(run);
    }
    out
}

/// Wrap an uncompressed field-major payload in the binary_compressed
/// envelope (compressed size, uncompressed size, LZF stream).
pub fn compressed_envelope(uncompressed: &[u8]) -> Vec<u8> {
    let stream = lzf_literal_compress(uncompressed);
    let mut payload = Vec::with_capacity(8 + stream.len());
    payload.extend_from_slice(&(stream.len() as u32).to_le_bytes());
    payload.extend_from_slice(&(uncompressed.len() as u32).to_le_bytes());
    payload.extend_from_slice(&stream);
    payload
}
