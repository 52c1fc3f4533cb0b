//! Base64 VLQ codec used by the `mappings` field

use crate::error::{Result, SourceMapError};

const BASE64_CHARS: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

const VLQ_BASE_SHIFT: u32 = 5;
const VLQ_BASE: i64 = 1 << VLQ_BASE_SHIFT;
const VLQ_BASE_MASK: i64 = VLQ_BASE - 1;
const VLQ_CONTINUATION_BIT: i64 = VLQ_BASE;

fn base64_digit(ch: u8) -> Option<i64> {
    let value = match ch {
        b'A'..=b'Z' => ch - b'A',
        b'a'..=b'z' => ch - b'a' + 26,
        b'0'..=b'9' => ch - b'0' + 52,
        b'+' => 62,
        b'/' => 63,
        _ => return None,
    };
    Some(i64::from(value))
}

/// Append the VLQ encoding of `value` to `out`
pub fn encode(value: i64, out: &mut String) {
    let mut vlq = if value < 0 {
        ((-value) << 1) | 1
    } else {
        value << 1
    };

    loop {
        let mut digit = vlq & VLQ_BASE_MASK;
        vlq >>= VLQ_BASE_SHIFT;
        if vlq > 0 {
            digit |= VLQ_CONTINUATION_BIT;
        }
        out.push(char::from(BASE64_CHARS[digit as usize]));
        if vlq == 0 {
            break;
        }
    }
}

/// Decode every value of one comma-free segment
///
/// Segments hold 1, 4 or 5 fields; anything else is rejected.
pub fn decode_segment(segment: &str) -> Result<Vec<i64>> {
    let mut values = Vec::with_capacity(5);
    let mut shift = 0u32;
    let mut accum = 0i64;

    for ch in segment.bytes() {
        let digit = base64_digit(ch)
            .ok_or_else(|| SourceMapError::InvalidVlq(format!("invalid character {:?}", ch as char)))?;
        if shift > 60 {
            return Err(SourceMapError::InvalidVlq(format!(
                "value too large in segment {:?}",
                segment
            )));
        }
        accum += (digit & VLQ_BASE_MASK) << shift;
        if digit & VLQ_CONTINUATION_BIT != 0 {
            shift += VLQ_BASE_SHIFT;
            continue;
        }

        let negative = accum & 1 == 1;
        let magnitude = accum >> 1;
        values.push(if negative { -magnitude } else { magnitude });
        shift = 0;
        accum = 0;
    }

    if shift != 0 {
        return Err(SourceMapError::InvalidVlq(format!(
            "unterminated value in segment {:?}",
            segment
        )));
    }

    match values.len() {
        1 | 4 | 5 => Ok(values),
        n => Err(SourceMapError::InvalidVlq(format!(
            "segment {:?} has {} fields",
            segment, n
        ))),
    }
}
