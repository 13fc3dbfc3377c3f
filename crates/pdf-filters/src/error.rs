use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("unsupported filter '{0}'")]
    UnsupportedFilter(String),

    #[error("flate stream is corrupt: {0}")]
    FlateCorrupt(String),

    #[error("LZW stream is corrupt: {0}")]
    LzwCorrupt(String),

    #[error("invalid predictor parameters: {0}")]
    InvalidPredictor(String),

    #[error("CCITTFax parameters invalid: {0}")]
    InvalidCcitt(String),

    #[error("DCT stream has no SOI marker")]
    DctMissingSoi,
}
