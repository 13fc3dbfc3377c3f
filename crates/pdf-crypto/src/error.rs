use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("unsupported security handler V={v} R={r}")]
    UnsupportedVersion { v: u8, r: u8 },

    #[error("neither user nor owner password authenticates this document")]
    AuthenticationFailed,

    #[error("ciphertext is too short to contain an IV")]
    CiphertextTooShort,

    #[error("padding is invalid on decrypt")]
    InvalidPadding,

    #[error("/ID is required to derive the file key but is missing")]
    MissingFileId,
}
