//! The "Standard" security handler (spec §4.3): the thing `pdf-core` talks
//! to for authenticating a document and encrypting/decrypting its strings
//! and streams.

use crate::aes;
use crate::error::CryptoError;
use crate::key;
use crate::objkey;
use crate::permissions::Permissions;
use crate::rc4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessLevel {
    User,
    Owner,
}

/// Everything pulled out of the `/Encrypt` dict (and `/ID[0]`) needed to
/// authenticate and then operate the handler. `pdf-core` is responsible
/// for reading this out of the dict; this crate never parses PDF syntax.
#[derive(Debug, Clone)]
pub struct EncryptDictFields {
    pub v: u8,
    pub r: u8,
    pub o: Vec<u8>,
    pub u: Vec<u8>,
    pub oe: Vec<u8>,
    pub ue: Vec<u8>,
    pub p: i32,
    pub id0: Vec<u8>,
    pub key_len_bytes: usize,
    pub use_aes: bool,
    pub encrypt_metadata: bool,
}

#[derive(Debug, Clone)]
pub struct SecurityHandler {
    pub v: u8,
    pub r: u8,
    pub use_aes: bool,
    pub file_key: Vec<u8>,
    pub permissions: Permissions,
    pub access: AccessLevel,
    pub encrypt_metadata: bool,
}

impl SecurityHandler {
    /// Try the user password, then the owner password (spec §4.6 stage 4).
    pub fn authenticate(
        fields: &EncryptDictFields,
        user_pw: &[u8],
        owner_pw: &[u8],
    ) -> Result<Self, CryptoError> {
        if fields.v <= 4 {
            Self::authenticate_legacy(fields, user_pw, owner_pw)
        } else {
            Self::authenticate_r6(fields, user_pw, owner_pw)
        }
    }

    fn authenticate_legacy(
        fields: &EncryptDictFields,
        user_pw: &[u8],
        owner_pw: &[u8],
    ) -> Result<Self, CryptoError> {
        let candidate_key = key::compute_file_key_legacy(
            user_pw,
            &fields.o,
            fields.p,
            &fields.id0,
            fields.key_len_bytes,
            fields.r,
            fields.encrypt_metadata,
        );
        if key::check_user_password(&candidate_key, &fields.id0, &fields.u, fields.r) {
            return Ok(Self::built(fields, candidate_key, AccessLevel::User));
        }

        let recovered_user_pw =
            key::recover_padded_user_password(owner_pw, &fields.o, fields.r, fields.key_len_bytes);
        let owner_candidate_key = key::compute_file_key_legacy(
            &recovered_user_pw,
            &fields.o,
            fields.p,
            &fields.id0,
            fields.key_len_bytes,
            fields.r,
            fields.encrypt_metadata,
        );
        if key::check_user_password(&owner_candidate_key, &fields.id0, &fields.u, fields.r) {
            return Ok(Self::built(fields, owner_candidate_key, AccessLevel::Owner));
        }

        Err(CryptoError::AuthenticationFailed)
    }

    fn authenticate_r6(
        fields: &EncryptDictFields,
        user_pw: &[u8],
        owner_pw: &[u8],
    ) -> Result<Self, CryptoError> {
        if fields.u.len() < 48 || fields.o.len() < 48 {
            return Err(CryptoError::AuthenticationFailed);
        }
        let u_hash = &fields.u[0..32];
        let u_vsalt: [u8; 8] = fields.u[32..40].try_into().unwrap();
        let u_ksalt: [u8; 8] = fields.u[40..48].try_into().unwrap();

        if key::verify_r6_password(user_pw, fields.r, &u_vsalt, &[], u_hash) {
            let file_key = key::recover_file_key_r6(user_pw, fields.r, &u_vsalt, &u_ksalt, &fields.ue, &[]);
            return Ok(Self::built(fields, file_key, AccessLevel::User));
        }

        let o_hash = &fields.o[0..32];
        let o_vsalt: [u8; 8] = fields.o[32..40].try_into().unwrap();
        let o_ksalt: [u8; 8] = fields.o[40..48].try_into().unwrap();
        if key::verify_r6_password(owner_pw, fields.r, &o_vsalt, &fields.u[..48], o_hash) {
            let file_key = key::recover_file_key_r6(
                owner_pw,
                fields.r,
                &o_vsalt,
                &o_ksalt,
                &fields.oe,
                &fields.u[..48],
            );
            return Ok(Self::built(fields, file_key, AccessLevel::Owner));
        }

        Err(CryptoError::AuthenticationFailed)
    }

    fn built(fields: &EncryptDictFields, file_key: Vec<u8>, access: AccessLevel) -> Self {
        SecurityHandler {
            v: fields.v,
            r: fields.r,
            use_aes: fields.use_aes,
            file_key,
            permissions: Permissions::from_p(fields.p),
            access,
            encrypt_metadata: fields.encrypt_metadata,
        }
    }

    pub fn is_owner(&self) -> bool {
        self.access == AccessLevel::Owner
    }

    fn object_key(&self, n: u32, g: u16) -> Vec<u8> {
        if self.v >= 5 {
            self.file_key.clone()
        } else {
            objkey::derive(&self.file_key, n, g, self.use_aes)
        }
    }

    pub fn decrypt(&self, n: u32, g: u16, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let key = self.object_key(n, g);
        if self.use_aes {
            aes::decrypt(&key, data)
        } else {
            Ok(rc4::apply(&key, data))
        }
    }

    pub fn encrypt(&self, n: u32, g: u16, data: &[u8]) -> Vec<u8> {
        let key = self.object_key(n, g);
        if self.use_aes {
            aes::encrypt(&key, data)
        } else {
            rc4::apply(&key, data)
        }
    }
}

/// Everything needed to populate a fresh `/Encrypt` dict: the handler
/// itself plus the `O`/`U`/`OE`/`UE` byte strings a caller writes back.
pub struct EncryptionSetup {
    pub handler: SecurityHandler,
    pub o: Vec<u8>,
    pub u: Vec<u8>,
    pub oe: Vec<u8>,
    pub ue: Vec<u8>,
}

impl SecurityHandler {
    /// Establish encryption on a previously-unencrypted document (spec
    /// §6.2 `encrypt`): derive `O`/`U` (plus `OE`/`UE` for R6) from the
    /// chosen passwords and permissions.
    pub fn new_for_encryption(
        v: u8,
        r: u8,
        user_pw: &[u8],
        owner_pw: &[u8],
        permissions: Permissions,
        id0: &[u8],
        key_len_bytes: usize,
        use_aes: bool,
        encrypt_metadata: bool,
    ) -> EncryptionSetup {
        if v <= 4 {
            Self::setup_legacy(v, r, user_pw, owner_pw, permissions, id0, key_len_bytes, use_aes, encrypt_metadata)
        } else {
            Self::setup_r6(v, r, user_pw, owner_pw, permissions, use_aes, encrypt_metadata)
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn setup_legacy(
        v: u8,
        r: u8,
        user_pw: &[u8],
        owner_pw: &[u8],
        permissions: Permissions,
        id0: &[u8],
        key_len_bytes: usize,
        use_aes: bool,
        encrypt_metadata: bool,
    ) -> EncryptionSetup {
        let p = permissions.to_p();
        let o = key::compute_o(owner_pw, user_pw, r, key_len_bytes);
        let file_key =
            key::compute_file_key_legacy(user_pw, &o, p, id0, key_len_bytes, r, encrypt_metadata);
        let u = key::compute_u(&file_key, id0, r);
        EncryptionSetup {
            handler: SecurityHandler {
                v,
                r,
                use_aes,
                file_key,
                permissions,
                access: AccessLevel::Owner,
                encrypt_metadata,
            },
            o,
            u,
            oe: Vec::new(),
            ue: Vec::new(),
        }
    }

    fn setup_r6(
        v: u8,
        r: u8,
        user_pw: &[u8],
        owner_pw: &[u8],
        permissions: Permissions,
        use_aes: bool,
        encrypt_metadata: bool,
    ) -> EncryptionSetup {
        use rand::RngCore;
        let mut rng = rand::thread_rng();

        let mut file_key = [0u8; 32];
        rng.fill_bytes(&mut file_key);

        let mut u_vsalt = [0u8; 8];
        let mut u_ksalt = [0u8; 8];
        rng.fill_bytes(&mut u_vsalt);
        rng.fill_bytes(&mut u_ksalt);
        let (u, ue) = key::compute_u_r6(user_pw, r, &u_vsalt, &u_ksalt, &file_key);

        let mut o_vsalt = [0u8; 8];
        let mut o_ksalt = [0u8; 8];
        rng.fill_bytes(&mut o_vsalt);
        rng.fill_bytes(&mut o_ksalt);
        let (o, oe) = key::compute_o_r6(owner_pw, r, &o_vsalt, &o_ksalt, &u, &file_key);

        EncryptionSetup {
            handler: SecurityHandler {
                v,
                r,
                use_aes,
                file_key: file_key.to_vec(),
                permissions,
                access: AccessLevel::Owner,
                encrypt_metadata,
            },
            o,
            u,
            oe,
            ue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn legacy_fields(user_pw: &[u8], owner_pw: &[u8], p: i32, use_aes: bool) -> EncryptDictFields {
        let id0 = b"0123456789abcdef".to_vec();
        let key_len = 16;
        let r = 4;
        let o = key::compute_o(owner_pw, user_pw, r, key_len);
        let file_key =
            key::compute_file_key_legacy(user_pw, &o, p, &id0, key_len, r, true);
        let u = key::compute_u(&file_key, &id0, r);
        EncryptDictFields {
            v: 4,
            r,
            o,
            u,
            oe: Vec::new(),
            ue: Vec::new(),
            p,
            id0,
            key_len_bytes: key_len,
            use_aes,
            encrypt_metadata: true,
        }
    }

    #[test]
    fn authenticates_with_user_password() {
        let fields = legacy_fields(b"u", b"o", -4, true);
        let handler = SecurityHandler::authenticate(&fields, b"u", b"").unwrap();
        assert_eq!(handler.access, AccessLevel::User);
    }

    #[test]
    fn authenticates_with_owner_password_when_user_password_is_wrong() {
        let fields = legacy_fields(b"u", b"o", -4, true);
        let handler = SecurityHandler::authenticate(&fields, b"wrong", b"o").unwrap();
        assert_eq!(handler.access, AccessLevel::Owner);
    }

    #[test]
    fn fails_when_neither_password_matches() {
        let fields = legacy_fields(b"u", b"o", -4, true);
        assert!(SecurityHandler::authenticate(&fields, b"wrong", b"also-wrong").is_err());
    }

    #[test]
    fn stream_round_trips_through_encrypt_and_decrypt() {
        let fields = legacy_fields(b"u", b"o", -4, true);
        let handler = SecurityHandler::authenticate(&fields, b"u", b"").unwrap();
        let plain = b"stream payload bytes".to_vec();
        let encrypted = handler.encrypt(7, 0, &plain);
        let decrypted = handler.decrypt(7, 0, &encrypted).unwrap();
        assert_eq!(decrypted, plain);
    }

    #[test]
    fn rc4_mode_round_trips_too() {
        let fields = legacy_fields(b"u", b"o", -4, false);
        let handler = SecurityHandler::authenticate(&fields, b"u", b"").unwrap();
        let plain = b"rc4 payload".to_vec();
        let encrypted = handler.encrypt(3, 0, &plain);
        let decrypted = handler.decrypt(3, 0, &encrypted).unwrap();
        assert_eq!(decrypted, plain);
    }

    #[test]
    fn legacy_setup_is_self_authenticating() {
        let id0 = b"0123456789abcdef".to_vec();
        let setup = SecurityHandler::new_for_encryption(
            4,
            4,
            b"user-pw",
            b"owner-pw",
            Permissions::from_p(-4),
            &id0,
            16,
            true,
            true,
        );
        let fields = EncryptDictFields {
            v: 4,
            r: 4,
            o: setup.o,
            u: setup.u,
            oe: setup.oe,
            ue: setup.ue,
            p: setup.handler.permissions.to_p(),
            id0,
            key_len_bytes: 16,
            use_aes: true,
            encrypt_metadata: true,
        };
        let reopened = SecurityHandler::authenticate(&fields, b"user-pw", b"owner-pw").unwrap();
        assert_eq!(reopened.file_key, setup.handler.file_key);
    }

    #[test]
    fn r6_setup_is_self_authenticating() {
        let setup = SecurityHandler::new_for_encryption(
            5,
            6,
            b"user-pw",
            b"owner-pw",
            Permissions::from_p(-4),
            b"",
            32,
            true,
            true,
        );
        let fields = EncryptDictFields {
            v: 5,
            r: 6,
            o: setup.o,
            u: setup.u,
            oe: setup.oe,
            ue: setup.ue,
            p: setup.handler.permissions.to_p(),
            id0: Vec::new(),
            key_len_bytes: 32,
            use_aes: true,
            encrypt_metadata: true,
        };
        let reopened = SecurityHandler::authenticate(&fields, b"user-pw", b"").unwrap();
        assert_eq!(reopened.file_key, setup.handler.file_key);
    }
}
