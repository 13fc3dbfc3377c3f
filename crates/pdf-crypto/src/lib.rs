//! Standard security handler: password authentication, file/object key
//! derivation, and RC4/AES-CBC encryption of strings and stream bytes
//! (spec §4.3).

mod aes;
mod error;
mod handler;
mod key;
mod objkey;
mod permissions;
mod rc4;

pub use error::CryptoError;
pub use handler::{AccessLevel, EncryptDictFields, EncryptionSetup, SecurityHandler};
pub use key::{
    check_user_password, compute_file_key_legacy, compute_o, compute_o_r6, compute_u,
    compute_u_r6, pad_password, recover_file_key_r6, recover_padded_user_password,
    verify_r6_password, PAD,
};
pub use objkey::derive as derive_object_key;
pub use permissions::{PdfOperation, Permissions};
