//! Assembles a stream's `/Filter` (+ `/DecodeParms`) entries into a
//! pipeline and runs it (spec §4.2). Decode runs left-to-right; encode
//! runs right-to-left so that `encode(decode(x)) == x` for the chain as a
//! whole when every filter round-trips.

use pdf_object::{Dict, Object};

use crate::ccitt;
use crate::dct;
use crate::error::FilterError;
use crate::params::{CcittParams, PredictorParams};
use crate::{ascii85, ascii_hex, flate, lzw, run_length};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterKind {
    Flate,
    Lzw,
    Ascii85,
    AsciiHex,
    RunLength,
    Ccitt,
    Dct,
    /// `Crypt` filters carry the sub-filter name from `/DecodeParms /Name`;
    /// `Identity` (including an absent `Name`) is transparent (spec §4.2).
    Crypt(Vec<u8>),
    Unsupported(Vec<u8>),
}

impl FilterKind {
    pub fn from_name(name: &[u8], decode_parms: Option<&Dict>) -> Self {
        match name {
            b"FlateDecode" | b"Fl" => FilterKind::Flate,
            b"LZWDecode" | b"LZW" => FilterKind::Lzw,
            b"ASCII85Decode" | b"A85" => FilterKind::Ascii85,
            b"ASCIIHexDecode" | b"AHx" => FilterKind::AsciiHex,
            b"RunLengthDecode" | b"RL" => FilterKind::RunLength,
            b"CCITTFaxDecode" | b"CCF" => FilterKind::Ccitt,
            b"DCTDecode" | b"DCT" => FilterKind::Dct,
            b"Crypt" => {
                let sub = decode_parms
                    .and_then(|p| p.name_entry(b"Name"))
                    .unwrap_or(b"Identity")
                    .to_vec();
                FilterKind::Crypt(sub)
            }
            other => FilterKind::Unsupported(other.to_vec()),
        }
    }
}

/// The filters and matching `DecodeParms` entries of one stream, in the
/// order they're applied on decode (`/Filter` is a Name or Array of Names;
/// `/DecodeParms` is the corresponding Dict or Array of Dicts, possibly
/// shorter than `/Filter` — missing entries mean "no parameters").
pub fn filter_chain(dict: &Dict) -> Vec<(FilterKind, Option<Dict>)> {
    let names: Vec<Vec<u8>> = match dict.get(b"Filter") {
        Some(Object::Name(n)) => vec![n.clone()],
        Some(Object::Array(arr)) => arr
            .iter()
            .filter_map(|o| o.as_name().map(|n| n.to_vec()))
            .collect(),
        _ => Vec::new(),
    };

    let parms: Vec<Option<Dict>> = match dict.get(b"DecodeParms").or_else(|| dict.get(b"DP")) {
        Some(Object::Dict(d)) => vec![Some(d.clone())],
        Some(Object::Array(arr)) => arr
            .iter()
            .map(|o| o.as_dict().cloned())
            .collect(),
        _ => Vec::new(),
    };

    names
        .into_iter()
        .enumerate()
        .map(|(i, name)| {
            let p = parms.get(i).cloned().flatten();
            (FilterKind::from_name(&name, p.as_ref()), p)
        })
        .collect()
}

/// Injected by `pdf-core` so this crate never needs to depend on
/// `pdf-crypto`: a non-`Identity` `Crypt` filter dispatches through
/// whichever security handler the document is using (spec §4.2, §4.3).
pub trait CryptHook {
    fn decrypt(&self, filter_name: &[u8], data: &[u8]) -> Result<Vec<u8>, FilterError>;
    fn encrypt(&self, filter_name: &[u8], data: &[u8]) -> Result<Vec<u8>, FilterError>;
}

/// Run the full decode chain on raw stream bytes. An `Unsupported` filter
/// anywhere in the chain fails with `UnsupportedFilter`; callers that want
/// "skip this object" semantics (spec: the extractor treats this as
/// non-fatal) should catch that specific variant.
pub fn decode(
    dict: &Dict,
    raw: &[u8],
    crypt: Option<&dyn CryptHook>,
) -> Result<Vec<u8>, FilterError> {
    let mut data = raw.to_vec();
    for (kind, parms) in filter_chain(dict) {
        data = decode_one(&kind, &data, parms.as_ref(), crypt)?;
    }
    Ok(data)
}

/// Run the full encode chain (right-to-left over the declared filters, so
/// the result matches what a reader decoding left-to-right expects).
pub fn encode(
    dict: &Dict,
    decoded: &[u8],
    crypt: Option<&dyn CryptHook>,
) -> Result<Vec<u8>, FilterError> {
    let mut data = decoded.to_vec();
    for (kind, parms) in filter_chain(dict).into_iter().rev() {
        data = encode_one(&kind, &data, parms.as_ref(), crypt)?;
    }
    Ok(data)
}

fn decode_one(
    kind: &FilterKind,
    data: &[u8],
    parms: Option<&Dict>,
    crypt: Option<&dyn CryptHook>,
) -> Result<Vec<u8>, FilterError> {
    match kind {
        FilterKind::Flate => flate::decode(data, &PredictorParams::from_decode_parms(parms)),
        FilterKind::Lzw => lzw::decode(
            data,
            &PredictorParams::from_decode_parms(parms),
            early_change(parms),
        ),
        FilterKind::Ascii85 => ascii85::decode(data),
        FilterKind::AsciiHex => Ok(ascii_hex::decode(data)),
        FilterKind::RunLength => Ok(run_length::decode(data)),
        FilterKind::Ccitt => ccitt::decode(data, &CcittParams::from_decode_parms(parms)),
        FilterKind::Dct => dct::decode(data),
        FilterKind::Crypt(name) => {
            if name == b"Identity" {
                Ok(data.to_vec())
            } else {
                match crypt {
                    Some(hook) => hook.decrypt(name, data),
                    None => Err(FilterError::UnsupportedFilter(format!(
                        "Crypt/{}",
                        String::from_utf8_lossy(name)
                    ))),
                }
            }
        }
        FilterKind::Unsupported(name) => Err(FilterError::UnsupportedFilter(
            String::from_utf8_lossy(name).into_owned(),
        )),
    }
}

fn encode_one(
    kind: &FilterKind,
    data: &[u8],
    parms: Option<&Dict>,
    crypt: Option<&dyn CryptHook>,
) -> Result<Vec<u8>, FilterError> {
    match kind {
        FilterKind::Flate => flate::encode(data, &PredictorParams::from_decode_parms(parms)),
        FilterKind::Lzw => lzw::encode(
            data,
            &PredictorParams::from_decode_parms(parms),
            early_change(parms),
        ),
        FilterKind::Ascii85 => Ok(ascii85::encode(data)),
        FilterKind::AsciiHex => Ok(ascii_hex::encode(data)),
        FilterKind::RunLength => Ok(run_length::encode(data)),
        FilterKind::Ccitt => ccitt::encode(data, &CcittParams::from_decode_parms(parms)),
        FilterKind::Dct => Ok(dct::encode(data)),
        FilterKind::Crypt(name) => {
            if name == b"Identity" {
                Ok(data.to_vec())
            } else {
                match crypt {
                    Some(hook) => hook.encrypt(name, data),
                    None => Err(FilterError::UnsupportedFilter(format!(
                        "Crypt/{}",
                        String::from_utf8_lossy(name)
                    ))),
                }
            }
        }
        FilterKind::Unsupported(name) => Err(FilterError::UnsupportedFilter(
            String::from_utf8_lossy(name).into_owned(),
        )),
    }
}

fn early_change(parms: Option<&Dict>) -> bool {
    parms
        .and_then(|p| p.int_entry(b"EarlyChange"))
        .map(|v| v != 0)
        .unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdf_object::Dict;
    use pretty_assertions::assert_eq;

    fn dict_with_filter(name: &[u8]) -> Dict {
        let mut d = Dict::new();
        d.set(b"Filter".to_vec(), Object::Name(name.to_vec()));
        d
    }

    #[test]
    fn single_filter_round_trips() {
        let dict = dict_with_filter(b"FlateDecode");
        let raw = b"hello world".to_vec();
        let encoded = encode(&dict, &raw, None).unwrap();
        let decoded = decode(&dict, &encoded, None).unwrap();
        assert_eq!(decoded, raw);
    }

    #[test]
    fn chained_filters_round_trip_in_declared_order() {
        let mut d = Dict::new();
        d.set(
            b"Filter".to_vec(),
            Object::Array(vec![
                Object::Name(b"ASCII85Decode".to_vec()),
                Object::Name(b"FlateDecode".to_vec()),
            ]),
        );
        let raw = b"round trip through two filters".to_vec();
        let encoded = encode(&d, &raw, None).unwrap();
        let decoded = decode(&d, &encoded, None).unwrap();
        assert_eq!(decoded, raw);
    }

    #[test]
    fn identity_crypt_is_transparent() {
        let dict = dict_with_filter(b"Crypt");
        let raw = b"unchanged".to_vec();
        assert_eq!(decode(&dict, &raw, None).unwrap(), raw);
    }

    #[test]
    fn unsupported_filter_is_reported_distinctly() {
        let dict = dict_with_filter(b"SomeVendorFilter");
        let err = decode(&dict, b"data", None).unwrap_err();
        assert!(matches!(err, FilterError::UnsupportedFilter(_)));
    }
}
