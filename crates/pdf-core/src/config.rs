//! The configuration surface (spec §6.3, §9 "Configuration surface"): one
//! struct, passed by shared reference through the whole pipeline, no
//! globals besides whatever `tracing` subscriber a binary installs.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationMode {
    Strict,
    Relaxed,
    None,
}

impl Default for ValidationMode {
    fn default() -> Self {
        ValidationMode::Relaxed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Eol {
    Lf,
    Cr,
    CrLf,
}

impl Default for Eol {
    fn default() -> Self {
        Eol::Lf
    }
}

impl Eol {
    pub fn as_bytes(self) -> &'static [u8] {
        match self {
            Eol::Lf => b"\n",
            Eol::Cr => b"\r",
            Eol::CrLf => b"\r\n",
        }
    }
}

/// Tri-state used internally by the Encrypt/Decrypt entry points (spec
/// §6.3 `decrypt`): `Unspecified` lets the command pick its own default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tristate {
    Unspecified,
    Yes,
    No,
}

impl Default for Tristate {
    fn default() -> Self {
        Tristate::Unspecified
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub reader_15: ReaderFifteen,
    pub decode_all_streams: bool,
    pub validation_mode: ValidationMode,
    pub write_object_stream: bool,
    pub write_xref_stream: bool,
    pub eol: Eol,
    pub collect_stats: bool,
    pub stats_file_name: Option<String>,

    pub user_pw: Option<String>,
    pub owner_pw: Option<String>,
    pub user_pw_new: Option<String>,
    pub owner_pw_new: Option<String>,

    pub decrypt: Tristate,
    pub encrypt_using_aes: bool,
    pub encrypt_using_128_bit_key: bool,
    pub user_access_permissions: i32,
}

/// Newtype so `Default` can give it `true` (spec: "permit xref streams and
/// object streams on read (default true)") without hand-writing `Default`
/// for the whole `Config`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderFifteen(pub bool);

impl Default for ReaderFifteen {
    fn default() -> Self {
        ReaderFifteen(true)
    }
}

impl Config {
    /// Forcing `write_xref_stream` on whenever `write_object_stream` is set
    /// is spec-mandated (§6.3): an object-stream-bearing file without an
    /// xref stream has nowhere to record the compressed entries.
    pub fn normalized(mut self) -> Self {
        if self.write_object_stream {
            self.write_xref_stream = true;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_permits_reading_xref_streams() {
        let conf = Config::default();
        assert!(conf.reader_15.0);
        assert_eq!(conf.eol, Eol::Lf);
        assert_eq!(conf.validation_mode, ValidationMode::Relaxed);
    }

    #[test]
    fn normalizing_forces_xref_stream_when_object_stream_requested() {
        let conf = Config {
            write_object_stream: true,
            write_xref_stream: false,
            ..Config::default()
        }
        .normalized();
        assert!(conf.write_xref_stream);
    }
}
