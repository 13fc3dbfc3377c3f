use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::FilterError;
use crate::params::PredictorParams;
use crate::predictor;

pub fn decode(data: &[u8], parms: &PredictorParams) -> Result<Vec<u8>, FilterError> {
    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| FilterError::FlateCorrupt(e.to_string()))?;
    predictor::decode(&out, parms)
}

pub fn encode(data: &[u8], parms: &PredictorParams) -> Result<Vec<u8>, FilterError> {
    let predicted = predictor::encode(data, parms)?;
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&predicted)
        .map_err(|e| FilterError::FlateCorrupt(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| FilterError::FlateCorrupt(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn round_trips_without_predictor() {
        let raw = b"the quick brown fox jumps over the lazy dog".to_vec();
        let parms = PredictorParams::default();
        let encoded = encode(&raw, &parms).unwrap();
        let decoded = decode(&encoded, &parms).unwrap();
        assert_eq!(decoded, raw);
    }

    #[test]
    fn round_trips_with_png_predictor() {
        let raw: Vec<u8> = (0u8..64).collect();
        let parms = PredictorParams {
            predictor: 15,
            colors: 1,
            bits_per_component: 8,
            columns: 8,
        };
        let encoded = encode(&raw, &parms).unwrap();
        let decoded = decode(&encoded, &parms).unwrap();
        assert_eq!(decoded, raw);
    }
}
