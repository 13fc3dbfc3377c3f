//! `RunLengthDecode` (spec §4.2): length byte `n<128` copies the next
//! `n+1` literal bytes; `n>128` repeats the next byte `257-n` times;
//! `n==128` is EOD.

pub fn decode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < data.len() {
        let n = data[i];
        i += 1;
        if n == 128 {
            break;
        } else if n < 128 {
            let count = n as usize + 1;
            let end = (i + count).min(data.len());
            out.extend_from_slice(&data[i..end]);
            i = end;
        } else {
            let count = 257 - n as usize;
            if i < data.len() {
                out.extend(std::iter::repeat(data[i]).take(count));
                i += 1;
            }
        }
    }
    out
}

pub fn encode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < data.len() {
        // Look for a run of identical bytes.
        let mut run = 1;
        while run < 128 && i + run < data.len() && data[i + run] == data[i] {
            run += 1;
        }
        if run >= 2 {
            out.push((257 - run) as u8);
            out.push(data[i]);
            i += run;
            continue;
        }

        // Otherwise accumulate a literal run up to 128 bytes, stopping
        // before any run of >=2 identical bytes so it can be RLE'd next.
        let start = i;
        let mut len = 0usize;
        while i < data.len() && len < 128 {
            let mut next_run = 1;
            while next_run < 128 && i + next_run < data.len() && data[i + next_run] == data[i] {
                next_run += 1;
            }
            if next_run >= 2 {
                break;
            }
            i += 1;
            len += 1;
        }
        out.push((len - 1) as u8);
        out.extend_from_slice(&data[start..start + len]);
    }
    out.push(128);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn decodes_literal_run() {
        assert_eq!(decode(&[2, b'a', b'b', b'c', 128]), b"abc");
    }

    #[test]
    fn decodes_repeat_run() {
        assert_eq!(decode(&[253, b'x', 128]), b"xxxx"); // 257-253 = 4
    }

    #[test]
    fn eod_stops_decoding() {
        assert_eq!(decode(&[128, 1, b'a', b'b']), Vec::<u8>::new());
    }

    proptest! {
        #[test]
        fn round_trip_arbitrary(bytes in proptest::collection::vec(any::<u8>(), 0..300)) {
            let encoded = encode(&bytes);
            prop_assert_eq!(decode(&encoded), bytes);
        }
    }
}
