//! `ASCII85Decode` (spec §4.2): `~>` terminates, `z` expands to four zero
//! bytes, the final group is padded with `u` and truncated on decode.

use crate::error::FilterError;

pub fn decode(data: &[u8]) -> Result<Vec<u8>, FilterError> {
    let mut out = Vec::new();
    let mut group = [0u8; 5];
    let mut group_len = 0usize;
    let mut i = 0;

    while i < data.len() {
        let b = data[i];
        if b == b'~' {
            break;
        }
        if b.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        if b == b'z' && group_len == 0 {
            out.extend_from_slice(&[0, 0, 0, 0]);
            i += 1;
            continue;
        }
        if !(b'!'..=b'u').contains(&b) {
            i += 1;
            continue;
        }
        group[group_len] = b - b'!';
        group_len += 1;
        if group_len == 5 {
            decode_group(&group, 5, &mut out);
            group_len = 0;
        }
        i += 1;
    }

    if group_len > 0 {
        // Pad the trailing partial group with 'u' (== 84) per spec, then
        // truncate the output to group_len - 1 bytes.
        for slot in group.iter_mut().take(5).skip(group_len) {
            *slot = 84;
        }
        decode_group(&group, group_len, &mut out);
    }

    Ok(out)
}

fn decode_group(group: &[u8; 5], len: usize, out: &mut Vec<u8>) {
    let mut value: u32 = 0;
    for &digit in group {
        value = value
            .wrapping_mul(85)
            .wrapping_add(digit as u32);
    }
    let bytes = value.to_be_bytes();
    out.extend_from_slice(&bytes[..len - 1]);
}

pub fn encode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() * 5 / 4 + 2);
    for chunk in data.chunks(4) {
        if chunk.len() == 4 && chunk == [0, 0, 0, 0] {
            out.push(b'z');
            continue;
        }
        let mut buf = [0u8; 4];
        buf[..chunk.len()].copy_from_slice(chunk);
        let value = u32::from_be_bytes(buf);

        let mut digits = [0u8; 5];
        let mut v = value;
        for slot in digits.iter_mut().rev() {
            *slot = (v % 85) as u8 + b'!';
            v /= 85;
        }
        out.extend_from_slice(&digits[..chunk.len() + 1]);
    }
    out.extend_from_slice(b"~>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn round_trip_simple() {
        let raw = b"Man ".to_vec();
        let encoded = encode(&raw);
        assert_eq!(decode(&encoded).unwrap(), raw);
    }

    #[test]
    fn all_zero_group_uses_z_shorthand() {
        let raw = vec![0u8; 4];
        let encoded = encode(&raw);
        assert!(encoded.starts_with(b"z"));
        assert_eq!(decode(&encoded).unwrap(), raw);
    }

    #[test]
    fn terminator_stops_decoding() {
        assert_eq!(decode(b"~>trailing garbage").unwrap(), Vec::<u8>::new());
    }

    proptest! {
        #[test]
        fn round_trip_arbitrary(bytes in proptest::collection::vec(any::<u8>(), 0..200)) {
            let encoded = encode(&bytes);
            prop_assert_eq!(decode(&encoded).unwrap(), bytes);
        }
    }
}
