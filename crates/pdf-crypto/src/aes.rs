//! AES-128/256 CBC, used for per-object string/stream encryption (with
//! PKCS#7 padding and a random IV, spec §4.3) and for the raw, unpadded
//! CBC rounds the R5/R6 hardened hash and the `UE`/`OE` unwrap require.
//!
//! Implemented as manual block chaining over `aes`'s `BlockEncrypt`/
//! `BlockDecrypt` rather than pulling in the `cbc` mode crate: the R6 hash
//! needs an unpadded, externally-chained variant that mode crates don't
//! expose directly, so we'd end up hand-rolling half of this anyway.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::{Aes128, Aes256};
use rand::RngCore;

use crate::error::CryptoError;

const BLOCK: usize = 16;

fn xor_block(a: &mut [u8; BLOCK], b: &[u8]) {
    for i in 0..BLOCK {
        a[i] ^= b[i];
    }
}

fn pkcs7_pad(data: &[u8]) -> Vec<u8> {
    let pad_len = BLOCK - (data.len() % BLOCK);
    let mut out = data.to_vec();
    out.extend(std::iter::repeat(pad_len as u8).take(pad_len));
    out
}

fn pkcs7_unpad(data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let pad_len = *data.last().ok_or(CryptoError::InvalidPadding)? as usize;
    if pad_len == 0 || pad_len > BLOCK || pad_len > data.len() {
        return Err(CryptoError::InvalidPadding);
    }
    if !data[data.len() - pad_len..].iter().all(|&b| b as usize == pad_len) {
        return Err(CryptoError::InvalidPadding);
    }
    Ok(data[..data.len() - pad_len].to_vec())
}

macro_rules! cbc_impl {
    ($name_enc:ident, $name_dec:ident, $cipher:ty) => {
        fn $name_enc(key: &[u8], iv: &[u8; BLOCK], plaintext: &[u8]) -> Vec<u8> {
            let cipher = <$cipher>::new(GenericArray::from_slice(key));
            let mut prev = *iv;
            let mut out = Vec::with_capacity(plaintext.len());
            for chunk in plaintext.chunks(BLOCK) {
                let mut block = [0u8; BLOCK];
                block[..chunk.len()].copy_from_slice(chunk);
                xor_block(&mut block, &prev);
                let mut ga = GenericArray::clone_from_slice(&block);
                cipher.encrypt_block(&mut ga);
                let out_block: [u8; BLOCK] = ga.as_slice().try_into().expect("AES block is 16 bytes");
                out.extend_from_slice(&out_block);
                prev = out_block;
            }
            out
        }

        fn $name_dec(key: &[u8], iv: &[u8; BLOCK], ciphertext: &[u8]) -> Vec<u8> {
            let cipher = <$cipher>::new(GenericArray::from_slice(key));
            let mut prev = *iv;
            let mut out = Vec::with_capacity(ciphertext.len());
            for chunk in ciphertext.chunks(BLOCK) {
                let next_prev: [u8; BLOCK] = chunk.try_into().expect("AES block is 16 bytes");
                let mut ga = GenericArray::clone_from_slice(chunk);
                cipher.decrypt_block(&mut ga);
                let mut block: [u8; BLOCK] = ga.as_slice().try_into().expect("AES block is 16 bytes");
                xor_block(&mut block, &prev);
                out.extend_from_slice(&block);
                prev = next_prev;
            }
            out
        }
    };
}

cbc_impl!(cbc_encrypt_128_raw, cbc_decrypt_128_raw, Aes128);
cbc_impl!(cbc_encrypt_256_raw, cbc_decrypt_256_raw, Aes256);

/// Unpadded AES-128-CBC, used inside the R6 hardened hash.
pub fn cbc_encrypt_128_no_pad(key: &[u8; 16], iv: &[u8; 16], plaintext: &[u8]) -> Vec<u8> {
    cbc_encrypt_128_raw(key, iv, plaintext)
}

/// Unpadded AES-256-CBC decrypt, used to unwrap `UE`/`OE` into the file key.
pub fn cbc_decrypt_256_no_pad(key: &[u8; 32], iv: &[u8; 16], ciphertext: &[u8]) -> Vec<u8> {
    cbc_decrypt_256_raw(key, iv, ciphertext)
}

/// Encrypt with a random IV prepended and PKCS#7 padding (spec §4.3: "a
/// random 16-byte IV prepended to the ciphertext"). `key` selects AES-128
/// vs AES-256 by its length.
pub fn encrypt(key: &[u8], plaintext: &[u8]) -> Vec<u8> {
    let mut iv = [0u8; BLOCK];
    rand::thread_rng().fill_bytes(&mut iv);
    let padded = pkcs7_pad(plaintext);
    let body = if key.len() == 32 {
        cbc_encrypt_256_raw(key, &iv, &padded)
    } else {
        cbc_encrypt_128_raw(key, &iv, &padded)
    };
    let mut out = Vec::with_capacity(BLOCK + body.len());
    out.extend_from_slice(&iv);
    out.extend_from_slice(&body);
    out
}

/// Inverse of [`encrypt`]: split the leading IV, CBC-decrypt, strip PKCS#7
/// padding.
pub fn decrypt(key: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if ciphertext.len() < BLOCK {
        return Err(CryptoError::CiphertextTooShort);
    }
    let mut iv = [0u8; BLOCK];
    iv.copy_from_slice(&ciphertext[..BLOCK]);
    let body = &ciphertext[BLOCK..];
    if body.is_empty() || body.len() % BLOCK != 0 {
        return Err(CryptoError::InvalidPadding);
    }
    let plain = if key.len() == 32 {
        cbc_decrypt_256_raw(key, &iv, body)
    } else {
        cbc_decrypt_128_raw(key, &iv, body)
    };
    pkcs7_unpad(&plain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn round_trip_aes128() {
        let key = [0x42u8; 16];
        let plain = b"the quick brown fox".to_vec();
        let ciphertext = encrypt(&key, &plain);
        assert_eq!(decrypt(&key, &ciphertext).unwrap(), plain);
    }

    #[test]
    fn round_trip_aes256() {
        let key = [0x11u8; 32];
        let plain = b"a much longer message spanning several blocks of AES-CBC".to_vec();
        let ciphertext = encrypt(&key, &plain);
        assert_eq!(decrypt(&key, &ciphertext).unwrap(), plain);
    }

    #[test]
    fn each_encryption_uses_a_fresh_iv() {
        let key = [0x07u8; 16];
        let plain = b"same plaintext".to_vec();
        let a = encrypt(&key, &plain);
        let b = encrypt(&key, &plain);
        assert_ne!(&a[..16], &b[..16], "IV should not repeat across calls");
    }

    proptest! {
        #[test]
        fn round_trip_arbitrary(bytes in proptest::collection::vec(any::<u8>(), 0..200)) {
            let key = [0x99u8; 16];
            let ciphertext = encrypt(&key, &bytes);
            prop_assert_eq!(decrypt(&key, &ciphertext).unwrap(), bytes);
        }
    }
}
