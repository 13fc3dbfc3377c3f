use thiserror::Error;

/// Errors raised while constructing or interpreting object-model values.
///
/// This is deliberately narrow: most "this PDF is malformed" conditions are
/// reported by the parser (`pdf-core`) against the broader error taxonomy.
/// This enum only covers failures that are intrinsic to a value once you
/// already have its bytes in hand.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ObjectError {
    #[error("invalid escape sequence '\\{0}' in string literal")]
    InvalidEscape(char),

    #[error("unterminated string literal")]
    UnterminatedString,

    #[error("invalid surrogate pair in UTF-16BE text string")]
    InvalidSurrogatePair,

    #[error("name '{0:?}' is not valid for this operation")]
    InvalidName(Vec<u8>),
}
