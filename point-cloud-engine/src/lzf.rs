//! LZF block decompression.
//!
//! PCD `binary_compressed` payloads use the LZF scheme: a control
//! byte below 32 starts a literal run of `ctrl + 1` bytes; anything
//! else is a back-reference with a 3-bit length (extended by one more
//! byte when the field saturates at 7) and a 13-bit distance split
//! across the control byte's low 5 bits and the next byte, offset by
//! one. Back-references may point into just-written output, so the
//! copy is byte-by-byte.

use crate::error::{DecodeError, Result};

/// Decompress `input` into exactly `output_len` bytes.
///
/// Fails with `CorruptStream` on a truncated stream, a back-reference
/// before the start of output, or any write past the declared length;
/// it never reads or writes out of bounds.
pub fn decompress(input: &[u8], output_len: usize) -> Result<Vec<u8>> {
    let mut output = vec![0u8; output_len];
    let mut in_pos = 0usize;
    let mut out_pos = 0usize;

    while in_pos < input.len() {
        let ctrl = usize::from(input[in_pos]);
        in_pos += 1;

        if ctrl < 32 {
            let run = ctrl + 1;
            if in_pos + run > input.len() {
                return Err(DecodeError::CorruptStream(
                    "LZF literal run past end of input".to_string(),
                ));
            }
            if out_pos + run > output_len {
                return Err(DecodeError::CorruptStream(
                    "LZF literal run exceeds declared output length".to_string(),
                ));
            }
            output[out_pos..out_pos + run].copy_from_slice(&input[in_pos..in_pos + run]);
            in_pos += run;
            out_pos += run;
        } else {
            let mut len = ctrl >> 5;
            if len == 7 {
                if in_pos >= input.len() {
                    return Err(DecodeError::CorruptStream(
                        "LZF back-reference truncated before length byte".to_string(),
                    ));
                }
                len += usize::from(input[in_pos]);
                in_pos += 1;
            }
            len += 2;

            if in_pos >= input.len() {
                return Err(DecodeError::CorruptStream(
                    "LZF back-reference truncated before offset byte".to_string(),
                ));
            }
            let distance = ((ctrl & 0x1f) << 8) + usize::from(input[in_pos]) + 1;
            in_pos += 1;

            if distance > out_pos {
                return Err(DecodeError::CorruptStream(
                    "LZF back-reference before start of output".to_string(),
                ));
            }
            if out_pos + len > output_len {
                return Err(DecodeError::CorruptStream(
                    "LZF back-reference exceeds declared output length".to_string(),
                ));
            }
            let mut from = out_pos - distance;
            for _ in 0..len {
                output[out_pos] = output[from];
                out_pos += 1;
                from += 1;
            }
        }
    }

    if out_pos != output_len {
        return Err(DecodeError::CorruptStream(format!(
            "LZF stream produced {out_pos} of {output_len} declared bytes"
        )));
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_runs_round_trip() {
        // Two literal runs: 3 bytes then 2 bytes.
        let input = [2, b'a', b'b', b'c', 1, b'd', b'e'];
        assert_eq!(decompress(&input, 5).unwrap(), b"abcde");
    }

    #[test]
    fn short_back_reference_copies_earlier_output() {
        // "abc" literal, then a 3-byte reference to offset -3.
        let input = [2, b'a', b'b', b'c', 0b0010_0000, 2];
        assert_eq!(decompress(&input, 6).unwrap(), b"abcabc");
    }

    #[test]
    fn overlapping_back_reference_repeats_bytes() {
        // One literal byte, then a 4-byte reference at distance 1:
        // classic run-length expansion through overlapping copy.
        let input = [0, b'x', 0b0100_0000, 0];
        assert_eq!(decompress(&input, 5).unwrap(), b"xxxxx");
    }

    #[test]
    fn extended_length_uses_extra_byte() {
        // Length field 7 saturates: 7 + 3 + 2 = 12 copied bytes.
        let mut input = vec![0, b'y'];
        input.extend([0b1110_0000, 3, 0]);
        assert_eq!(decompress(&input, 13).unwrap(), vec![b'y'; 13]);
    }

    #[test]
    fn rejects_reference_before_output_start() {
        let input = [0, b'a', 0b0010_0000, 9];
        assert!(matches!(
            decompress(&input, 4),
            Err(DecodeError::CorruptStream(_))
        ));
    }

    #[test]
    fn rejects_truncated_back_reference() {
        // Control byte promises a reference but the offset byte is gone.
        let input = [0, b'a', 0b0010_0000];
        assert!(matches!(
            decompress(&input, 4),
            Err(DecodeError::CorruptStream(_))
        ));
    }

    #[test]
    fn rejects_writes_past_declared_length() {
        let input = [2, b'a', b'b', b'c'];
        assert!(matches!(
            decompress(&input, 2),
            Err(DecodeError::CorruptStream(_))
        ));
    }

    #[test]
    fn rejects_short_output() {
        let input = [0, b'a'];
        assert!(matches!(
            decompress(&input, 3),
            Err(DecodeError::CorruptStream(_))
        ));
    }
}
