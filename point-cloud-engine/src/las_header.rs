//! LAS fixed-header parsing.
//!
//! Reads only the declared header region at fixed byte offsets; no
//! variable-length records are touched. Works for LAS 1.2 through 1.4.

use crate::error::{DecodeError, Result};
use constants::las;

/// Parsed LAS file header.
#[derive(Debug, Clone, PartialEq)]
pub struct LasHeader {
    pub version_major: u8,
    pub version_minor: u8,
    pub header_size: u16,
    pub offset_to_point_data: u32,
    pub point_format: u8,
    pub record_length: u16,
    /// The larger of the legacy 32-bit and (when present) extended
    /// 64-bit point counts.
    pub point_count: u64,
    pub scale: [f64; 3],
    pub offset: [f64; 3],
}

impl LasHeader {
    /// Dotted version string, e.g. "1.4".
    pub fn version(&self) -> String {
        format!("{}.{}", self.version_major, self.version_minor)
    }

    /// True when the file needs the custom fixed-point streaming path
    /// rather than the batch reader collaborator (LAS 1.4 and later).
    pub fn needs_custom_parse(&self) -> bool {
        self.version_major > 1 || (self.version_major == 1 && self.version_minor >= 4)
    }

    /// True when the point format byte carries the LAZ compression
    /// bit. Compressed files declare record geometry for the
    /// uncompressed points, not for their on-disk bytes.
    pub fn is_compressed(&self) -> bool {
        self.point_format & 0x80 != 0
    }

    /// Byte offset of the RGB triple inside a record, when the format
    /// declares colour and the record is long enough to hold it.
    pub fn colour_offset(&self) -> Option<usize> {
        las::colour_offset(self.point_format)
            .filter(|offset| offset + 6 <= usize::from(self.record_length))
    }

    /// Validate that the declared point-data region fits the file.
    /// Violation is a fatal parse error, never silently tolerated.
    pub fn validate_extent(&self, file_len: u64) -> Result<()> {
        let record_bytes = self
            .point_count
            .checked_mul(u64::from(self.record_length))
            .and_then(|bytes| bytes.checked_add(u64::from(self.offset_to_point_data)))
            .ok_or_else(|| {
                DecodeError::InvalidFormat("LAS point data extent overflows".to_string())
            })?;
        if record_bytes > file_len {
            return Err(DecodeError::InvalidFormat(format!(
                "LAS point data extends past end of file ({record_bytes} > {file_len} bytes)"
            )));
        }
        Ok(())
    }
}

fn u16_at(buf: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([buf[offset], buf[offset + 1]])
}

fn u32_at(buf: &[u8], offset: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[offset..offset + 4]);
    u32::from_le_bytes(bytes)
}

fn u64_at(buf: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}

fn f64_at(buf: &[u8], offset: usize) -> f64 {
    f64::from_bits(u64_at(buf, offset))
}

/// Parse the fixed header region from the leading bytes of a file
/// (up to `HEADER_MIN_BYTES`; shorter pre-1.4 headers are accepted).
pub fn read_las_header(buf: &[u8]) -> Result<LasHeader> {
    if buf.len() < 4 || &buf[0..4] != las::SIGNATURE {
        return Err(DecodeError::InvalidFormat(
            "missing LASF signature".to_string(),
        ));
    }
    if buf.len() < las::HEADER_LEGACY_BYTES {
        return Err(DecodeError::InvalidFormat(format!(
            "LAS header truncated at {} bytes",
            buf.len()
        )));
    }

    let header_size = u16_at(buf, las::HEADER_SIZE);
    let legacy_point_count = u64::from(u32_at(buf, las::LEGACY_POINT_COUNT));

    // LAS 1.4 headers carry an extended 64-bit count; keep whichever
    // of the two counts is larger.
    let mut point_count = legacy_point_count;
    if usize::from(header_size) >= las::HEADER_MIN_BYTES
        && buf.len() >= las::EXTENDED_POINT_COUNT + 8
    {
        point_count = point_count.max(u64_at(buf, las::EXTENDED_POINT_COUNT));
    }

    Ok(LasHeader {
        version_major: buf[las::VERSION_MAJOR],
        version_minor: buf[las::VERSION_MINOR],
        header_size,
        offset_to_point_data: u32_at(buf, las::OFFSET_TO_POINT_DATA),
        point_format: buf[las::POINT_FORMAT],
        record_length: u16_at(buf, las::RECORD_LENGTH),
        point_count,
        scale: [
            f64_at(buf, las::SCALE),
            f64_at(buf, las::SCALE + 8),
            f64_at(buf, las::SCALE + 16),
        ],
        offset: [
            f64_at(buf, las::OFFSET),
            f64_at(buf, las::OFFSET + 8),
            f64_at(buf, las::OFFSET + 16),
        ],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_bytes(header_size: u16, legacy: u32, extended: Option<u64>) -> Vec<u8> {
        let mut buf = vec![0u8; las::HEADER_MIN_BYTES];
        buf[0..4].copy_from_slice(las::SIGNATURE);
        buf[las::VERSION_MAJOR] = 1;
        buf[las::VERSION_MINOR] = 4;
        buf[las::HEADER_SIZE..las::HEADER_SIZE + 2].copy_from_slice(&header_size.to_le_bytes());
        buf[las::OFFSET_TO_POINT_DATA..las::OFFSET_TO_POINT_DATA + 4]
            .copy_from_slice(&375u32.to_le_bytes());
        buf[las::POINT_FORMAT] = 2;
        buf[las::RECORD_LENGTH..las::RECORD_LENGTH + 2].copy_from_slice(&26u16.to_le_bytes());
        buf[las::LEGACY_POINT_COUNT..las::LEGACY_POINT_COUNT + 4]
            .copy_from_slice(&legacy.to_le_bytes());
        buf[las::SCALE..las::SCALE + 8].copy_from_slice(&0.01f64.to_le_bytes());
        buf[las::SCALE + 8..las::SCALE + 16].copy_from_slice(&0.01f64.to_le_bytes());
        buf[las::SCALE + 16..las::SCALE + 24].copy_from_slice(&0.01f64.to_le_bytes());
        if let Some(extended) = extended {
            buf[las::EXTENDED_POINT_COUNT..las::EXTENDED_POINT_COUNT + 8]
                .copy_from_slice(&extended.to_le_bytes());
        }
        buf
    }

    #[test]
    fn rejects_bad_signature() {
        let mut buf = header_bytes(375, 10, None);
        buf[0] = b'X';
        assert!(matches!(
            read_las_header(&buf),
            Err(DecodeError::InvalidFormat(_))
        ));
    }

    #[test]
    fn reads_fixed_fields() {
        let header = read_las_header(&header_bytes(375, 100, None)).unwrap();
        assert_eq!(header.version(), "1.4");
        assert_eq!(header.point_format, 2);
        assert_eq!(header.record_length, 26);
        assert_eq!(header.offset_to_point_data, 375);
        assert_eq!(header.point_count, 100);
        assert_eq!(header.scale, [0.01, 0.01, 0.01]);
        assert!(header.needs_custom_parse());
        assert_eq!(header.colour_offset(), Some(20));
    }

    #[test]
    fn extended_count_takes_the_larger_value() {
        let header = read_las_header(&header_bytes(375, 100, Some(5_000_000_000))).unwrap();
        assert_eq!(header.point_count, 5_000_000_000);
        // A zero extended field keeps the legacy count.
        let header = read_las_header(&header_bytes(375, 100, Some(0))).unwrap();
        assert_eq!(header.point_count, 100);
        // A smaller extended field never shrinks the legacy count.
        let header = read_las_header(&header_bytes(375, 100, Some(40))).unwrap();
        assert_eq!(header.point_count, 100);
    }

    #[test]
    fn short_headers_skip_the_extended_field() {
        let mut buf = header_bytes(227, 123, Some(99));
        buf.truncate(las::HEADER_LEGACY_BYTES);
        let header = read_las_header(&buf).unwrap();
        assert_eq!(header.point_count, 123);
    }

    #[test]
    fn laz_compression_bit_is_detected() {
        let mut buf = header_bytes(375, 10, None);
        buf[las::POINT_FORMAT] = 2 | 0x80;
        let header = read_las_header(&buf).unwrap();
        assert!(header.is_compressed());
        let plain = read_las_header(&header_bytes(375, 10, None)).unwrap();
        assert!(!plain.is_compressed());
    }

    #[test]
    fn extent_validation_is_fatal() {
        let header = read_las_header(&header_bytes(375, 100, None)).unwrap();
        assert!(header.validate_extent(375 + 100 * 26).is_ok());
        assert!(matches!(
            header.validate_extent(375 + 100 * 26 - 1),
            Err(DecodeError::InvalidFormat(_))
        ));
    }
}
