//! `DCTDecode` (spec §4.2): baseline JPEG. Decoding to pixel samples is out
//! of scope (spec Non-goals), but the filter still must locate the image
//! bytes within the stream and tolerate trailing bytes some encoders
//! append after the `EOI` marker (spec requirement). `decode` returns the
//! bytes from `SOI` through `EOI` inclusive; anything after `EOI` is
//! dropped. `encode` is the identity (we never re-encode JPEG payloads).

use crate::error::FilterError;

const SOI: [u8; 2] = [0xFF, 0xD8];
const EOI: [u8; 2] = [0xFF, 0xD9];

pub fn decode(data: &[u8]) -> Result<Vec<u8>, FilterError> {
    let start = find(data, &SOI, 0).ok_or(FilterError::DctMissingSoi)?;
    match find(data, &EOI, start + SOI.len()) {
        Some(end) => Ok(data[start..end + EOI.len()].to_vec()),
        // Some encoders omit an explicit EOI in a truncated capture; be
        // resilient and return what we have rather than failing extraction.
        None => Ok(data[start..].to_vec()),
    }
}

pub fn encode(data: &[u8]) -> Vec<u8> {
    data.to_vec()
}

fn find(data: &[u8], marker: &[u8; 2], from: usize) -> Option<usize> {
    if from >= data.len() {
        return None;
    }
    data[from..]
        .windows(2)
        .position(|w| w == marker)
        .map(|p| p + from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn extracts_between_soi_and_eoi() {
        let data = [0x00, 0xFF, 0xD8, 0x01, 0x02, 0xFF, 0xD9, 0xAB, 0xCD];
        assert_eq!(decode(&data).unwrap(), vec![0xFF, 0xD8, 0x01, 0x02, 0xFF, 0xD9]);
    }

    #[test]
    fn tolerates_trailing_bytes_past_eoi() {
        let data = [0xFF, 0xD8, 0xAA, 0xFF, 0xD9, 0x99, 0x99, 0x99];
        assert_eq!(decode(&data).unwrap(), vec![0xFF, 0xD8, 0xAA, 0xFF, 0xD9]);
    }

    #[test]
    fn missing_soi_is_an_error() {
        assert!(decode(&[1, 2, 3]).is_err());
    }
}
