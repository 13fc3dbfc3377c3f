//! `CCITTFaxDecode` (spec §4.2). Group 3/4 bi-level facsimile.
//!
//! This crate does not rasterize (spec Non-goals: "Rendering to pixels"),
//! and no operation in spec §6.2 needs decoded sample data from a CCITT
//! image — only correct `/Length` bookkeeping and filter-chain
//! participation. `decode` therefore validates the configured parameters
//! and returns the encoded payload unchanged; `encode` is its inverse
//! no-op. See `DESIGN.md` for the scoping rationale.

use crate::error::FilterError;
use crate::params::CcittParams;

pub fn decode(data: &[u8], params: &CcittParams) -> Result<Vec<u8>, FilterError> {
    validate(params)?;
    Ok(data.to_vec())
}

pub fn encode(data: &[u8], params: &CcittParams) -> Result<Vec<u8>, FilterError> {
    validate(params)?;
    Ok(data.to_vec())
}

fn validate(params: &CcittParams) -> Result<(), FilterError> {
    if params.columns <= 0 {
        return Err(FilterError::InvalidCcitt(format!(
            "Columns must be positive, got {}",
            params.columns
        )));
    }
    if !(-1000..=1000).contains(&params.k) {
        return Err(FilterError::InvalidCcitt(format!("K out of range: {}", params.k)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_round_trip() {
        let raw = b"not really ccitt data".to_vec();
        let params = CcittParams::default();
        let encoded = encode(&raw, &params).unwrap();
        assert_eq!(decode(&encoded, &params).unwrap(), raw);
    }

    #[test]
    fn rejects_non_positive_columns() {
        let params = CcittParams {
            columns: 0,
            ..CcittParams::default()
        };
        assert!(decode(b"x", &params).is_err());
    }
}
