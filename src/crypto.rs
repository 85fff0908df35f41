//! SHA-256 based primitives used by the exchange.

use std::num::NonZeroU32;

use rand::distributions::{Distribution, Uniform};
use rand::{CryptoRng, Rng};
use ring::digest::{self, SHA256};
use ring::{constant_time, hmac, pbkdf2};

use crate::SHA256_LEN;

/// SHA-256 digest of `data`.
pub fn hash(data: &[u8]) -> [u8; SHA256_LEN] {
    to_array(digest::digest(&SHA256, data).as_ref())
}

/// HMAC-SHA-256 of `message` under `key`.
pub fn hmac(key: &[u8], message: &[u8]) -> [u8; SHA256_LEN] {
    let key = hmac::Key::new(hmac::HMAC_SHA256, key);
    to_array(hmac::sign(&key, message).as_ref())
}

/// Element-wise XOR of two equally long byte strings.
///
/// # Panics
///
/// Panics if the lengths differ.
pub fn xor(a: &[u8], b: &[u8]) -> Vec<u8> {
    assert_eq!(a.len(), b.len(), "xor operands differ in length");
    a.iter().zip(b).map(|(x, y)| x ^ y).collect()
}

/// The `Hi` function of RFC5802: PBKDF2 with HMAC-SHA-256 and a single output block.
pub fn derive_key(password: &[u8], salt: &[u8], iterations: NonZeroU32) -> [u8; SHA256_LEN] {
    let mut salted_password = [0u8; SHA256_LEN];
    pbkdf2::derive(pbkdf2::PBKDF2_HMAC_SHA256,
                   iterations,
                   salt,
                   password,
                   &mut salted_password);
    salted_password
}

/// Generates `len` random printable characters, never a comma.
///
/// Each byte is drawn from `0x21..=0x7E`, a comma is replaced by `~`.
pub fn random_nonce<R: Rng + CryptoRng>(rng: &mut R, len: usize) -> String {
    let range = Uniform::new_inclusive(0x21u8, 0x7Eu8);
    range
        .sample_iter(rng)
        .take(len)
        .map(|x| if x == b',' { '~' } else { char::from(x) })
        .collect()
}

/// Compares two byte strings in time independent of where they differ.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    constant_time::verify_slices_are_equal(a, b).is_ok()
}

fn to_array(bytes: &[u8]) -> [u8; SHA256_LEN] {
    let mut out = [0u8; SHA256_LEN];
    out.copy_from_slice(bytes);
    out
}

#[cfg(test)]
mod tests {
    use rand::rngs::{OsRng, StdRng};
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn sha256_known_answer() {
        assert_eq!(base64::encode(hash(b"abc")), "ungWv48Bz+pBQUDeXa4iI7ADYaOWF3qctBD/YfIAFa0=");
    }

    // RFC 4231 test case 2.
    #[test]
    fn hmac_known_answer() {
        let mac = hmac(b"Jefe", b"what do ya want for nothing?");
        assert_eq!(base64::encode(mac), "W9zBRr9gdU5qBCQmCJV1x1oAPwidJzmDnexYuWTsOEM=");
    }

    #[test]
    fn derive_key_matches_rfc7677() {
        let salt = base64::decode("W22ZaJ0SNY7soEsUEjb6gQ==").unwrap();
        let iterations = NonZeroU32::new(4096).unwrap();
        let first = derive_key(b"pencil", &salt, iterations);
        let second = derive_key(b"pencil", &salt, iterations);
        assert_eq!(first, second);
        assert_eq!(first.len(), SHA256_LEN);
        assert_eq!(base64::encode(first), "xKSVEDI6tPlSysH6mUQZOeeOp01r6B3fcJbodRPcYV0=");
    }

    #[test]
    fn derive_key_single_iteration_is_one_hmac() {
        let salted = derive_key(b"password", b"salt", NonZeroU32::new(1).unwrap());
        assert_eq!(salted, hmac(b"password", b"salt\x00\x00\x00\x01"));
    }

    #[test]
    fn xor_bytes() {
        assert_eq!(xor(&[0b1010, 0xFF], &[0b0110, 0x0F]), vec![0b1100, 0xF0]);
    }

    #[test]
    #[should_panic]
    fn xor_length_mismatch_panics() {
        xor(&[1, 2], &[1]);
    }

    #[test]
    fn nonce_never_contains_comma() {
        let mut rng = OsRng;
        for len in 0..1000 {
            let nonce = random_nonce(&mut rng, len % 64);
            assert_eq!(nonce.len(), len % 64);
            assert!(!nonce.contains(','));
            assert!(nonce.bytes().all(|b| (0x21..=0x7E).contains(&b)));
        }
    }

    #[test]
    fn nonce_is_deterministic_for_seeded_rng() {
        let a = random_nonce(&mut StdRng::seed_from_u64(7), 24);
        let b = random_nonce(&mut StdRng::seed_from_u64(7), 24);
        assert_eq!(a, b);
    }

    #[test]
    fn constant_time_comparison() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"ab"));
    }
}
