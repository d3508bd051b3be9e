//! PCD header parsing.
//!
//! PCD headers are whitespace-delimited key/value text lines followed
//! by a `DATA` line; the payload begins one byte past that line's
//! newline. Headers are bounded, so only the leading 64KB window is
//! ever scanned.

use crate::error::{DecodeError, Result};

/// Declared payload encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PcdDataMode {
    Ascii,
    Binary,
    BinaryCompressed,
    /// A `DATA` token the engine does not recognise; rejected at
    /// decode time with its original spelling.
    Unrecognised(String),
}

/// One declared field of the point schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcdField {
    pub name: String,
    /// Bytes per element.
    pub size: u32,
    /// Elements per point; `COUNT` defaults to 1 when absent.
    pub count: u32,
    /// Declared scalar type letter (`F`/`I`/`U`; anything else is
    /// rejected when the field is actually read).
    pub ty: char,
}

impl PcdField {
    /// Bytes this field occupies per point.
    pub fn byte_width(&self) -> usize {
        self.size as usize * self.count as usize
    }
}

/// Parsed PCD header.
#[derive(Debug, Clone, PartialEq)]
pub struct PcdHeader {
    /// Explicit `POINTS`, falling back to `WIDTH * HEIGHT`.
    pub point_count: u64,
    pub data: PcdDataMode,
    pub fields: Vec<PcdField>,
    /// Byte offset where the payload begins.
    pub payload_offset: usize,
}

impl PcdHeader {
    /// Bytes per point in the interleaved layout.
    pub fn point_stride(&self) -> usize {
        self.fields.iter().map(PcdField::byte_width).sum()
    }

    /// Byte offset of a field within one interleaved point record.
    pub fn field_offset(&self, index: usize) -> usize {
        self.fields[..index].iter().map(PcdField::byte_width).sum()
    }

    /// Case-insensitive field lookup.
    pub fn find_field(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|field| field.name.eq_ignore_ascii_case(name))
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn value_of<'a>(lines: &'a [&str], key: &str) -> Option<&'a str> {
    lines.iter().find_map(|line| {
        line.strip_prefix(key)
            .and_then(|rest| rest.strip_prefix(char::is_whitespace))
            .map(str::trim)
    })
}

fn numbers<T: std::str::FromStr>(raw: &str, what: &str) -> Result<Vec<T>> {
    raw.split_whitespace()
        .map(|token| {
            token
                .parse::<T>()
                .map_err(|_| DecodeError::InvalidFormat(format!("bad PCD {what} entry: {token}")))
        })
        .collect()
}

/// Parse a PCD header from the leading bytes of a file (at most the
/// 64KB header window). Fails with `InvalidFormat` when no `DATA`
/// line occurs inside the window.
pub fn read_pcd_header(buf: &[u8]) -> Result<PcdHeader> {
    let window = &buf[..buf.len().min(constants::PCD_HEADER_WINDOW_BYTES)];
    let data_at = find_subslice(window, b"\nDATA").ok_or_else(|| {
        DecodeError::InvalidFormat("PCD header has no DATA line".to_string())
    })?;
    let line_end = window[data_at + 1..]
        .iter()
        .position(|byte| *byte == b'\n')
        .map(|at| data_at + 1 + at)
        .ok_or_else(|| {
            DecodeError::InvalidFormat("PCD DATA line is unterminated".to_string())
        })?;

    let text = String::from_utf8_lossy(&window[..line_end]);
    let lines: Vec<&str> = text.lines().map(str::trim_end).collect();

    let points = value_of(&lines, "POINTS")
        .map(|raw| numbers::<u64>(raw, "POINTS").map(|v| v.first().copied().unwrap_or(0)))
        .transpose()?;
    let width = value_of(&lines, "WIDTH")
        .and_then(|raw| raw.split_whitespace().next())
        .and_then(|token| token.parse::<u64>().ok());
    let height = value_of(&lines, "HEIGHT")
        .and_then(|raw| raw.split_whitespace().next())
        .and_then(|token| token.parse::<u64>().ok());
    let point_count = match (points, width, height) {
        (Some(points), _, _) => points,
        (None, Some(width), Some(height)) => width * height,
        _ => 0,
    };

    let names: Vec<String> = value_of(&lines, "FIELDS")
        .map(|raw| raw.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default();
    let sizes: Vec<u32> = value_of(&lines, "SIZE")
        .map(|raw| numbers(raw, "SIZE"))
        .transpose()?
        .unwrap_or_default();
    let types: Vec<char> = value_of(&lines, "TYPE")
        .map(|raw| {
            raw.split_whitespace()
                .filter_map(|token| token.chars().next())
                .collect()
        })
        .unwrap_or_default();
    let counts: Vec<u32> = value_of(&lines, "COUNT")
        .map(|raw| numbers(raw, "COUNT"))
        .transpose()?
        .unwrap_or_default();

    if sizes.len() != names.len() || types.len() != names.len() {
        return Err(DecodeError::InvalidFormat(format!(
            "PCD schema arity mismatch: {} fields, {} sizes, {} types",
            names.len(),
            sizes.len(),
            types.len()
        )));
    }
    if !counts.is_empty() && counts.len() != names.len() {
        return Err(DecodeError::InvalidFormat(format!(
            "PCD COUNT lists {} entries for {} fields",
            counts.len(),
            names.len()
        )));
    }

    let fields = names
        .into_iter()
        .enumerate()
        .map(|(i, name)| PcdField {
            name,
            size: sizes[i],
            count: counts.get(i).copied().unwrap_or(1),
            ty: types[i],
        })
        .collect();

    let data = match value_of(&lines, "DATA") {
        Some("ascii") => PcdDataMode::Ascii,
        Some("binary") => PcdDataMode::Binary,
        Some("binary_compressed") => PcdDataMode::BinaryCompressed,
        Some(other) => PcdDataMode::Unrecognised(other.to_string()),
        None => PcdDataMode::Unrecognised(String::new()),
    };

    Ok(PcdHeader {
        point_count,
        data,
        fields,
        payload_offset: line_end + 1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "# .PCD v0.7 - Point Cloud Data file format\n\
        VERSION 0.7\n\
        FIELDS x y z rgb\n\
        SIZE 4 4 4 4\n\
        TYPE F F F F\n\
        COUNT 1 1 1 1\n\
        WIDTH 213\n\
        HEIGHT 1\n\
        VIEWPOINT 0 0 0 1 0 0 0\n\
        POINTS 213\n\
        DATA binary\n";

    #[test]
    fn parses_schema_and_payload_offset() {
        let header = read_pcd_header(HEADER.as_bytes()).unwrap();
        assert_eq!(header.point_count, 213);
        assert_eq!(header.data, PcdDataMode::Binary);
        assert_eq!(header.fields.len(), 4);
        assert_eq!(header.point_stride(), 16);
        assert_eq!(header.field_offset(3), 12);
        assert_eq!(header.find_field("RGB"), Some(3));
        assert_eq!(header.payload_offset, HEADER.len());
    }

    #[test]
    fn points_falls_back_to_width_times_height() {
        let text = HEADER.replace("POINTS 213\n", "");
        let header = read_pcd_header(text.as_bytes()).unwrap();
        assert_eq!(header.point_count, 213);
    }

    #[test]
    fn count_defaults_to_one_per_field() {
        let text = HEADER.replace("COUNT 1 1 1 1\n", "");
        let header = read_pcd_header(text.as_bytes()).unwrap();
        assert!(header.fields.iter().all(|field| field.count == 1));
        assert_eq!(header.point_stride(), 16);
    }

    #[test]
    fn missing_data_line_is_invalid() {
        let text = HEADER.replace("DATA binary\n", "");
        assert!(matches!(
            read_pcd_header(text.as_bytes()),
            Err(DecodeError::InvalidFormat(_))
        ));
    }

    #[test]
    fn schema_arity_mismatch_is_invalid() {
        let text = HEADER.replace("SIZE 4 4 4 4", "SIZE 4 4");
        assert!(matches!(
            read_pcd_header(text.as_bytes()),
            Err(DecodeError::InvalidFormat(_))
        ));
    }

    #[test]
    fn unknown_data_token_is_preserved() {
        let text = HEADER.replace("DATA binary\n", "DATA base64\n");
        let header = read_pcd_header(text.as_bytes()).unwrap();
        assert_eq!(header.data, PcdDataMode::Unrecognised("base64".to_string()));
    }
}
