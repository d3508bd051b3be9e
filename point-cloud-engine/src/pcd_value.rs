//! Scalar reads over a PCD payload in either binary layout.

use crate::error::{DecodeError, Result};
use crate::pcd_header::{PcdField, PcdHeader};

/// Where the values of one field live relative to a point index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PcdLayout {
    /// All fields of one point stored contiguously (array of structures).
    Interleaved,
    /// All values of one field stored contiguously (structure of arrays).
    FieldMajor,
}

/// Byte offset of field `index` for point `point`, under `layout`.
pub fn value_offset(header: &PcdHeader, layout: PcdLayout, index: usize, point: usize) -> usize {
    match layout {
        PcdLayout::Interleaved => point * header.point_stride() + header.field_offset(index),
        PcdLayout::FieldMajor => {
            let block_offset: usize = header.fields[..index]
                .iter()
                .map(|field| field.byte_width() * header.point_count as usize)
                .sum();
            block_offset + point * header.fields[index].byte_width()
        }
    }
}

/// Check once, before the decode loop, that a field's declared scalar
/// type and size can be read at all.
pub fn ensure_readable(field: &PcdField) -> Result<()> {
    let ok = matches!(
        (field.ty, field.size),
        ('F', 4) | ('F', 8) | ('I', 1) | ('I', 2) | ('I', 4) | ('U', 1) | ('U', 2) | ('U', 4)
    );
    if ok {
        Ok(())
    } else {
        Err(DecodeError::Unsupported(format!(
            "PCD field '{}' has unreadable type {}{}",
            field.name, field.ty, field.size
        )))
    }
}

/// Read one scalar as f64. Callers validate the type/size combination
/// up front with [`ensure_readable`]; bounds are still checked here.
pub fn read_scalar(payload: &[u8], offset: usize, field: &PcdField) -> Result<f64> {
    let size = field.size as usize;
    let end = offset
        .checked_add(size)
        .filter(|end| *end <= payload.len())
        .ok_or_else(|| {
            DecodeError::CorruptStream(format!(
                "PCD field '{}' read past end of payload",
                field.name
            ))
        })?;
    let bytes = &payload[offset..end];
    let value = match (field.ty, field.size) {
        ('F', 4) => f64::from(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])),
        ('F', 8) => {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(bytes);
            f64::from_le_bytes(raw)
        }
        ('I', 1) => f64::from(bytes[0] as i8),
        ('I', 2) => f64::from(i16::from_le_bytes([bytes[0], bytes[1]])),
        ('I', 4) => f64::from(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])),
        ('U', 1) => f64::from(bytes[0]),
        ('U', 2) => f64::from(u16::from_le_bytes([bytes[0], bytes[1]])),
        ('U', 4) => f64::from(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])),
        _ => {
            return Err(DecodeError::Unsupported(format!(
                "PCD field '{}' has unreadable type {}{}",
                field.name, field.ty, field.size
            )));
        }
    };
    Ok(value)
}

/// Read a field's raw 32-bit pattern, for packed colour values. A
/// 4-byte float field yields its bit pattern, not its numeric value.
pub fn read_packed_u32(payload: &[u8], offset: usize, field: &PcdField) -> Result<u32> {
    let end = offset
        .checked_add(4)
        .filter(|end| *end <= payload.len())
        .ok_or_else(|| {
            DecodeError::CorruptStream(format!(
                "PCD field '{}' read past end of payload",
                field.name
            ))
        })?;
    let bytes = &payload[offset..end];
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pcd_header::read_pcd_header;

    fn two_field_header(points: u64) -> PcdHeader {
        let text = format!(
            "FIELDS x y\nSIZE 4 4\nTYPE F F\nCOUNT 1 1\nPOINTS {points}\nDATA binary\n"
        );
        read_pcd_header(text.as_bytes()).unwrap()
    }

    #[test]
    fn offsets_differ_by_layout() {
        let header = two_field_header(10);
        // Interleaved: point 3's y sits after three full 8-byte records.
        assert_eq!(value_offset(&header, PcdLayout::Interleaved, 1, 3), 28);
        // Field-major: y block starts after all ten x values.
        assert_eq!(value_offset(&header, PcdLayout::FieldMajor, 1, 3), 52);
    }

    #[test]
    fn unreadable_types_are_reported_with_the_field_name() {
        let field = PcdField {
            name: "intensity".to_string(),
            size: 16,
            count: 1,
            ty: 'F',
        };
        let err = ensure_readable(&field).unwrap_err();
        assert!(err.to_string().contains("intensity"));
    }

    #[test]
    fn scalar_reads_are_bounds_checked() {
        let header = two_field_header(1);
        let payload = 1.5f32.to_le_bytes();
        let x = read_scalar(&payload, 0, &header.fields[0]).unwrap();
        assert_eq!(x, 1.5);
        assert!(read_scalar(&payload, 4, &header.fields[1]).is_err());
    }
}
