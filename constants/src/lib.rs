//! Shared fixed tables and tuning values for point cloud decoding.
//!
//! Everything here is consulted as data, never computed: LAS header
//! byte offsets come from the LAS 1.2-1.4 specifications and the
//! remaining values are engine-wide tuning knobs.

/// LAS fixed-header byte layout (identical across LAS 1.2-1.4).
pub mod las {
    /// Header bytes needed to read every field below, including the
    /// LAS 1.4 extended point count.
    pub const HEADER_MIN_BYTES: usize = 375;

    /// Header bytes of a pre-1.4 file; the smallest header we accept.
    pub const HEADER_LEGACY_BYTES: usize = 227;

    /// ASCII file signature at offset 0.
    pub const SIGNATURE: &[u8; 4] = b"LASF";

    /// Version major, u8.
    pub const VERSION_MAJOR: usize = 24;
    /// Version minor, u8.
    pub const VERSION_MINOR: usize = 25;
    /// Header size, u16 little-endian.
    pub const HEADER_SIZE: usize = 94;
    /// Offset to point data, u32 little-endian.
    pub const OFFSET_TO_POINT_DATA: usize = 96;
    /// Point data record format, u8.
    pub const POINT_FORMAT: usize = 104;
    /// Point data record length, u16 little-endian.
    pub const RECORD_LENGTH: usize = 105;
    /// Legacy number of point records, u32 little-endian.
    pub const LEGACY_POINT_COUNT: usize = 107;
    /// X/Y/Z scale factors, three consecutive f64 little-endian.
    pub const SCALE: usize = 131;
    /// X/Y/Z offsets, three consecutive f64 little-endian.
    pub const OFFSET: usize = 155;
    /// Extended number of point records, u64 little-endian.
    /// Only present when the header size is at least `HEADER_MIN_BYTES`.
    pub const EXTENDED_POINT_COUNT: usize = 247;

    /// Byte offset of the RGB triple inside a point record, per point
    /// data record format. Formats without colour map to `None`.
    pub fn colour_offset(point_format: u8) -> Option<usize> {
        match point_format {
            2 => Some(20),
            3 => Some(28),
            5 => Some(30),
            7 | 8 | 9 | 10 => Some(30),
            _ => None,
        }
    }
}

/// Fallback record size when a format does not declare one.
pub const DEFAULT_BYTES_PER_POINT: u32 = 20;

/// Bytes read per window in the streaming LAS path.
pub const DECODE_WINDOW_BYTES: usize = 32 * 1024 * 1024;

/// Cooperative time slice before a decoder yields to the scheduler.
pub const TIME_SLICE_MS: u64 = 12;

/// Minimum interval between progress events.
pub const PROGRESS_INTERVAL_MS: u64 = 80;

/// Text window scanned for a PCD header; headers are text and bounded.
pub const PCD_HEADER_WINDOW_BYTES: usize = 64 * 1024;

/// Points probed per layout hypothesis when resolving a PCD binary layout.
pub const LAYOUT_PROBE_POINTS: usize = 5000;

/// Extent slack before one layout hypothesis is considered worse than
/// the other rather than comparable.
pub const LAYOUT_EXTENT_SLACK: f64 = 1.1;

/// Accepted points per emitted chunk.
pub const DEFAULT_CHUNK_POINTS: usize = 65_536;

/// Hold window before buffered chunks are force-flushed to a busy consumer.
pub const ASSEMBLER_HOLD_MS: u64 = 200;
