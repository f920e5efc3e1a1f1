//! Password digests and one-time verification codes.
//!
//! Stored form of a password is `<salt hex>$<blake3 hex>`, where the digest
//! covers the salt followed by the password bytes.

use rand::{Rng, RngCore};
use subtle::ConstantTimeEq;

use banca_shared::constants::VERIFICATION_CODE_LEN;

const SALT_LEN: usize = 16;

pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    format!("{}${}", hex::encode(salt), digest(&salt, password))
}

/// Check `password` against a stored digest. Malformed digests never match.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt_hex, expected)) = stored.split_once('$') else {
        return false;
    };
    let Ok(salt) = hex::decode(salt_hex) else {
        return false;
    };

    constant_time_eq(&digest(&salt, password), expected)
}

/// Compare a submitted verification code against the stored one.
pub fn code_matches(submitted: &str, stored: &str) -> bool {
    constant_time_eq(submitted.trim(), stored)
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    a.len() == b.len() && a.as_bytes().ct_eq(b.as_bytes()).unwrap_u8() == 1
}

/// A zero-padded numeric code, e.g. `"042917"`.
pub fn generate_verification_code() -> String {
    let upper = 10u32.pow(VERIFICATION_CODE_LEN as u32);
    let code = rand::thread_rng().gen_range(0..upper);
    format!("{code:0width$}", width = VERIFICATION_CODE_LEN)
}

fn digest(salt: &[u8], password: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use banca_shared::validation::is_well_formed_code;

    #[test]
    fn test_password_roundtrip() {
        let stored = hash_password("password123");
        assert!(verify_password("password123", &stored));
        assert!(!verify_password("password124", &stored));
    }

    #[test]
    fn test_salts_differ() {
        assert_ne!(hash_password("same"), hash_password("same"));
    }

    #[test]
    fn test_malformed_digest_never_matches() {
        assert!(!verify_password("x", ""));
        assert!(!verify_password("x", "no-separator"));
        assert!(!verify_password("x", "zz$abcd"));
    }

    #[test]
    fn test_code_matches() {
        assert!(code_matches("042917", "042917"));
        assert!(code_matches(" 042917 ", "042917"));
        assert!(!code_matches("042918", "042917"));
        assert!(!code_matches("42917", "042917"));
    }

    #[test]
    fn test_verification_code_shape() {
        for _ in 0..50 {
            let code = generate_verification_code();
            assert_eq!(code.len(), VERIFICATION_CODE_LEN);
            assert!(is_well_formed_code(&code));
        }
    }
}
