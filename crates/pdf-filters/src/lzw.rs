//! `LZWDecode` (spec §4.2): variable-width codes from 9 to 12 bits, with
//! `Clear` (256) and `EOD` (257) control codes, plus the same predictor
//! suite as Flate.

use crate::error::FilterError;
use crate::params::PredictorParams;
use crate::predictor;

const CLEAR: u16 = 256;
const EOD: u16 = 257;
const FIRST_FREE: u16 = 258;
const MAX_CODE_WIDTH: u8 = 12;

/// Whether the encoder/decoder bumps code width one code early (PDF's
/// `EarlyChange` DecodeParms entry; default `true`, matching Adobe's own
/// writer and every PDF in the wild).
pub fn decode(data: &[u8], parms: &PredictorParams, early_change: bool) -> Result<Vec<u8>, FilterError> {
    let codes = BitReader::new(data);
    let mut table: Vec<Vec<u8>> = Vec::new();
    let mut code_width = 9u8;
    let mut out = Vec::new();
    let mut prev: Option<Vec<u8>> = None;

    let reset_table = |table: &mut Vec<Vec<u8>>| {
        table.clear();
        for b in 0u16..256 {
            table.push(vec![b as u8]);
        }
        table.push(Vec::new()); // 256: Clear
        table.push(Vec::new()); // 257: EOD
    };
    reset_table(&mut table);

    let mut reader = codes;
    loop {
        let code = match reader.read(code_width) {
            Some(c) => c,
            None => break,
        };

        if code == CLEAR {
            reset_table(&mut table);
            code_width = 9;
            prev = None;
            continue;
        }
        if code == EOD {
            break;
        }

        let entry: Vec<u8> = if (code as usize) < table.len() {
            table[code as usize].clone()
        } else if code as usize == table.len() {
            match &prev {
                Some(p) => {
                    let mut e = p.clone();
                    e.push(p[0]);
                    e
                }
                None => {
                    return Err(FilterError::LzwCorrupt(
                        "code references empty table with no previous entry".into(),
                    ))
                }
            }
        } else {
            return Err(FilterError::LzwCorrupt(format!(
                "code {code} out of range"
            )));
        };

        out.extend_from_slice(&entry);

        if let Some(p) = &prev {
            let mut new_entry = p.clone();
            new_entry.push(entry[0]);
            table.push(new_entry);
        }
        prev = Some(entry);

        let next_size = table.len() as u16 + if early_change { 1 } else { 0 };
        code_width = width_for(next_size);
    }

    predictor::decode(&out, parms)
}

fn width_for(table_len: u16) -> u8 {
    if table_len <= 512 {
        9
    } else if table_len <= 1024 {
        10
    } else if table_len <= 2048 {
        11
    } else {
        MAX_CODE_WIDTH
    }
}

pub fn encode(data: &[u8], parms: &PredictorParams, early_change: bool) -> Result<Vec<u8>, FilterError> {
    let data = predictor::encode(data, parms)?;
    let mut writer = BitWriter::new();
    let mut table: std::collections::HashMap<Vec<u8>, u16> = std::collections::HashMap::new();
    let reset_table = |table: &mut std::collections::HashMap<Vec<u8>, u16>| {
        table.clear();
        for b in 0u16..256 {
            table.insert(vec![b as u8], b);
        }
    };
    reset_table(&mut table);
    let mut next_code = FIRST_FREE;
    let mut code_width = 9u8;

    writer.write(CLEAR, code_width);

    let mut current: Vec<u8> = Vec::new();
    for &byte in &data {
        let mut candidate = current.clone();
        candidate.push(byte);
        if table.contains_key(&candidate) {
            current = candidate;
        } else {
            if !current.is_empty() {
                writer.write(table[&current], code_width);
            }
            table.insert(candidate, next_code);
            next_code += 1;
            let size_for_width = next_code + if early_change { 1 } else { 0 };
            code_width = width_for(size_for_width);
            if next_code >= (1 << MAX_CODE_WIDTH) - 1 {
                writer.write(CLEAR, code_width);
                reset_table(&mut table);
                next_code = FIRST_FREE;
                code_width = 9;
            }
            current = vec![byte];
        }
    }
    if !current.is_empty() {
        writer.write(table[&current], code_width);
    }
    writer.write(EOD, code_width);

    Ok(writer.finish())
}

struct BitReader<'a> {
    data: &'a [u8],
    bit_pos: usize,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        BitReader { data, bit_pos: 0 }
    }

    fn read(&mut self, width: u8) -> Option<u16> {
        let width = width as usize;
        if (self.bit_pos + width) > self.data.len() * 8 {
            return None;
        }
        let mut value: u32 = 0;
        for _ in 0..width {
            let byte = self.data[self.bit_pos / 8];
            let bit = (byte >> (7 - (self.bit_pos % 8))) & 1;
            value = (value << 1) | bit as u32;
            self.bit_pos += 1;
        }
        Some(value as u16)
    }
}

struct BitWriter {
    bytes: Vec<u8>,
    cur: u32,
    cur_bits: u8,
}

impl BitWriter {
    fn new() -> Self {
        BitWriter {
            bytes: Vec::new(),
            cur: 0,
            cur_bits: 0,
        }
    }

    fn write(&mut self, code: u16, width: u8) {
        self.cur = (self.cur << width) | code as u32;
        self.cur_bits += width;
        while self.cur_bits >= 8 {
            let shift = self.cur_bits - 8;
            self.bytes.push((self.cur >> shift) as u8);
            self.cur_bits -= 8;
            self.cur &= (1 << self.cur_bits) - 1;
        }
    }

    fn finish(mut self) -> Vec<u8> {
        if self.cur_bits > 0 {
            let shift = 8 - self.cur_bits;
            self.bytes.push((self.cur << shift) as u8);
        }
        self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn round_trip_no_predictor() {
        let raw = b"TOBEORNOTTOBEORTOBEORNOT".to_vec();
        let parms = PredictorParams::default();
        let encoded = encode(&raw, &parms, true).unwrap();
        let decoded = decode(&encoded, &parms, true).unwrap();
        assert_eq!(decoded, raw);
    }

    #[test]
    fn round_trip_repetitive_data_grows_table() {
        let raw: Vec<u8> = (0..2000).map(|i| (i % 7) as u8).collect();
        let parms = PredictorParams::default();
        let encoded = encode(&raw, &parms, true).unwrap();
        let decoded = decode(&encoded, &parms, true).unwrap();
        assert_eq!(decoded, raw);
    }

    proptest! {
        #[test]
        fn round_trip_arbitrary(bytes in proptest::collection::vec(any::<u8>(), 0..500)) {
            let parms = PredictorParams::default();
            let encoded = encode(&bytes, &parms, true).unwrap();
            let decoded = decode(&encoded, &parms, true).unwrap();
            prop_assert_eq!(decoded, bytes);
        }
    }
}
