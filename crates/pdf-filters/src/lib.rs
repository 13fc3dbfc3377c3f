//! The stream filter pipeline: each filter's own encode/decode plus the
//! chain dispatcher that reads a stream dict's `/Filter` and
//! `/DecodeParms` entries (spec §4.2).

pub mod ascii85;
pub mod ascii_hex;
pub mod ccitt;
pub mod dct;
pub mod error;
pub mod flate;
pub mod lzw;
pub mod params;
pub mod pipeline;
pub mod predictor;
pub mod run_length;

pub use error::FilterError;
pub use pipeline::{decode, encode, filter_chain, CryptHook, FilterKind};
