//! Text interpretation of string values (spec §4.1).
//!
//! A string is "text" if it begins with the UTF-16BE byte-order mark
//! `FE FF`; the remainder decodes as UTF-16BE, including validated
//! high/low surrogate pairs. Otherwise the bytes are left for the caller to
//! interpret (typically as PDFDocEncoding, which this crate does not
//! implement — no operation in spec §6.2 round-trips through it).

use crate::error::ObjectError;

const BOM: [u8; 2] = [0xFE, 0xFF];

pub fn is_text(bytes: &[u8]) -> bool {
    bytes.starts_with(&BOM)
}

/// Decode a text string's payload (including its BOM) as UTF-16BE.
pub fn decode_utf16be_text(bytes: &[u8]) -> Result<String, ObjectError> {
    let body = &bytes[BOM.len().min(bytes.len())..];
    if body.len() % 2 != 0 {
        return Err(ObjectError::InvalidSurrogatePair);
    }

    let units: Vec<u16> = body
        .chunks_exact(2)
        .map(|c| u16::from_be_bytes([c[0], c[1]]))
        .collect();

    char::decode_utf16(units)
        .collect::<Result<String, _>>()
        .map_err(|_| ObjectError::InvalidSurrogatePair)
}

/// Encode a string as a UTF-16BE text string, including the leading BOM.
pub fn encode_utf16be_text(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len() * 2 + 2);
    out.extend_from_slice(&BOM);
    for unit in s.encode_utf16() {
        out.extend_from_slice(&unit.to_be_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn round_trips_ascii_as_text() {
        let encoded = encode_utf16be_text("Hello");
        assert!(is_text(&encoded));
        assert_eq!(decode_utf16be_text(&encoded).unwrap(), "Hello");
    }

    #[test]
    fn round_trips_surrogate_pairs() {
        let s = "\u{1F600}"; // outside the BMP, needs a surrogate pair
        let encoded = encode_utf16be_text(s);
        assert_eq!(decode_utf16be_text(&encoded).unwrap(), s);
    }

    #[test]
    fn non_bom_bytes_are_not_text() {
        assert!(!is_text(b"plain bytes"));
    }
}
