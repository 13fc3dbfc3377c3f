//! Per-object key derivation (spec §4.3, §9 "Per-object crypto state").
//!
//! Stateless by design: nothing here is cached across objects, so every
//! call gets a fresh `Md5`/AES context and there is no way to
//! accidentally reuse key material across two different `(n, g)` pairs.

use md5::{Digest, Md5};

const AES_SALT: [u8; 4] = *b"sAlT";

/// Derive the per-object RC4/AES-128 key for object `(n, g)` from the file
/// key. Not used for V=5 (AES-256), which encrypts directly under the file
/// key.
pub fn derive(file_key: &[u8], n: u32, g: u16, aes: bool) -> Vec<u8> {
    let mut hasher = Md5::new();
    hasher.update(file_key);
    hasher.update(&n.to_le_bytes()[..3]);
    hasher.update(&g.to_le_bytes()[..2]);
    if aes {
        hasher.update(AES_SALT);
    }
    let hash = hasher.finalize();
    let len = (file_key.len() + 5).min(16);
    hash[..len].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn derived_key_is_no_longer_than_16_bytes() {
        let file_key = vec![0u8; 16];
        let key = derive(&file_key, 5, 0, true);
        assert_eq!(key.len(), 16);
    }

    #[test]
    fn different_objects_derive_different_keys() {
        let file_key = vec![0xAB; 5];
        let a = derive(&file_key, 1, 0, false);
        let b = derive(&file_key, 2, 0, false);
        assert_ne!(a, b);
    }

    #[test]
    fn aes_and_rc4_derivations_differ() {
        let file_key = vec![0xAB; 5];
        let rc4_key = derive(&file_key, 1, 0, false);
        let aes_key = derive(&file_key, 1, 0, true);
        assert_ne!(rc4_key, aes_key);
    }
}
