// SPDX-FileCopyrightText: 2026 Coffer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Crypto primitives: AES-256-GCM sealing, key and token generation, token
//! hashing, key-share combination and credential comparison.
//!
//! Every call to [`encrypt`] draws a fresh random 96-bit nonce from the system
//! CSPRNG. There is no way to pass a nonce in.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use coffer_core::CofferError;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
use secrecy::SecretString;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

/// A 256-bit symmetric key, zeroed on drop.
pub type Key = Zeroizing<[u8; 32]>;

/// Length of the AES-GCM authentication tag appended to every ciphertext.
pub const TAG_LEN: usize = 16;

/// Random bytes behind a bearer token.
const TOKEN_BYTES: usize = 32;

fn aead_key(key: &[u8; 32]) -> Result<LessSafeKey, CofferError> {
    let unbound = UnboundKey::new(&AES_256_GCM, key)
        .map_err(|_| CofferError::Vault("failed to create AES-256-GCM key".to_string()))?;
    Ok(LessSafeKey::new(unbound))
}

pub(crate) fn fill_random(buf: &mut [u8]) -> Result<(), CofferError> {
    SystemRandom::new()
        .fill(buf)
        .map_err(|_| CofferError::Vault("system random source failed".to_string()))
}

/// Encrypt `plaintext` under `key` with a fresh random nonce and empty AAD.
///
/// Returns `(ciphertext_with_tag, nonce)`. Both must be stored to decrypt.
pub fn encrypt(key: &[u8; 32], plaintext: &[u8]) -> Result<(Vec<u8>, Vec<u8>), CofferError> {
    let sealing_key = aead_key(key)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    fill_random(&mut nonce_bytes)?;

    let mut in_out = plaintext.to_vec();
    sealing_key
        .seal_in_place_append_tag(
            Nonce::assume_unique_for_key(nonce_bytes),
            Aad::empty(),
            &mut in_out,
        )
        .map_err(|_| CofferError::Vault("AES-256-GCM encryption failed".to_string()))?;

    Ok((in_out, nonce_bytes.to_vec()))
}

/// Decrypt and authenticate `ciphertext` (tag appended) under `key` and `nonce`.
///
/// Any mismatch (wrong key, altered ciphertext, altered or malformed nonce)
/// yields [`CofferError::AuthenticationFailure`] with no further detail.
pub fn decrypt(
    key: &[u8; 32],
    ciphertext: &[u8],
    nonce: &[u8],
) -> Result<Zeroizing<Vec<u8>>, CofferError> {
    let opening_key = aead_key(key)?;
    let nonce = Nonce::try_assume_unique_for_key(nonce)
        .map_err(|_| CofferError::AuthenticationFailure)?;

    let mut in_out = Zeroizing::new(ciphertext.to_vec());
    let len = opening_key
        .open_in_place(nonce, Aad::empty(), in_out.as_mut_slice())
        .map_err(|_| CofferError::AuthenticationFailure)?
        .len();
    in_out.truncate(len);
    Ok(in_out)
}

/// Generate a random 256-bit key.
pub fn generate_key() -> Result<Key, CofferError> {
    let mut key = Zeroizing::new([0u8; 32]);
    fill_random(key.as_mut())?;
    Ok(key)
}

/// Interpret unwrapped bytes as a 256-bit key.
pub fn key_from_bytes(bytes: &[u8]) -> Result<Key, CofferError> {
    let array: [u8; 32] = bytes
        .try_into()
        .map_err(|_| CofferError::Vault("unwrapped key has the wrong length".to_string()))?;
    Ok(Zeroizing::new(array))
}

/// Lowercase hex SHA-256 of a bearer token. The only form in which tokens are stored.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Generate a bearer token: 32 random bytes, URL-safe base64 without padding.
pub fn generate_bearer_token() -> Result<SecretString, CofferError> {
    let mut bytes = Zeroizing::new([0u8; TOKEN_BYTES]);
    fill_random(bytes.as_mut())?;
    Ok(SecretString::from(URL_SAFE_NO_PAD.encode(&bytes[..])))
}

/// Combine key shares into a master passphrase.
///
/// Shares are sorted so supply order does not matter, joined with NUL and
/// hashed; the result is the lowercase hex digest. At least two shares are
/// required.
pub fn combine_key_shares<S: AsRef<str>>(shares: &[S]) -> Result<SecretString, CofferError> {
    if shares.len() < 2 {
        return Err(CofferError::InvalidInput(
            "at least 2 key shares are required".to_string(),
        ));
    }

    let mut sorted: Vec<&str> = shares.iter().map(|s| s.as_ref()).collect();
    sorted.sort_unstable();
    let joined = Zeroizing::new(sorted.join("\0"));

    Ok(SecretString::from(hex::encode(Sha256::digest(
        joined.as_bytes(),
    ))))
}

/// Constant-time credential comparison.
///
/// Digests are compared rather than raw bytes so the input length does not
/// affect timing.
pub fn credentials_match(presented: &str, expected: &str) -> bool {
    let a = Sha256::digest(presented.as_bytes());
    let b = Sha256::digest(expected.as_bytes());
    a.as_slice().ct_eq(b.as_slice()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use secrecy::ExposeSecret;
    use std::collections::HashSet;

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let key = generate_key().unwrap();
        let (ct, nonce) = encrypt(&key, b"sk-live-abc123").unwrap();
        assert_eq!(nonce.len(), 12);
        assert_eq!(ct.len(), b"sk-live-abc123".len() + TAG_LEN);
        assert_eq!(decrypt(&key, &ct, &nonce).unwrap().as_slice(), b"sk-live-abc123");
    }

    #[test]
    fn empty_and_large_plaintexts_roundtrip() {
        let key = generate_key().unwrap();

        let (ct, nonce) = encrypt(&key, b"").unwrap();
        assert_eq!(ct.len(), TAG_LEN);
        assert!(decrypt(&key, &ct, &nonce).unwrap().is_empty());

        let large = vec![0x5Au8; 4 * 1024 * 1024];
        let (ct, nonce) = encrypt(&key, &large).unwrap();
        assert_eq!(*decrypt(&key, &ct, &nonce).unwrap(), large);
    }

    #[test]
    fn same_plaintext_encrypts_differently() {
        let key = generate_key().unwrap();
        let (ct1, n1) = encrypt(&key, b"same").unwrap();
        let (ct2, n2) = encrypt(&key, b"same").unwrap();
        assert_ne!(n1, n2);
        assert_ne!(ct1, ct2);
    }

    #[test]
    fn wrong_key_fails_authentication() {
        let (ct, nonce) = encrypt(&generate_key().unwrap(), b"data").unwrap();
        let err = decrypt(&generate_key().unwrap(), &ct, &nonce).unwrap_err();
        assert!(matches!(err, CofferError::AuthenticationFailure));
    }

    #[test]
    fn tampered_ciphertext_fails_authentication() {
        let key = generate_key().unwrap();
        let (mut ct, nonce) = encrypt(&key, b"do not tamper").unwrap();
        ct[0] ^= 0x01;
        assert!(matches!(
            decrypt(&key, &ct, &nonce),
            Err(CofferError::AuthenticationFailure)
        ));

        let (mut ct, nonce) = encrypt(&key, b"do not tamper").unwrap();
        let last = ct.len() - 1;
        ct[last] ^= 0x80;
        assert!(decrypt(&key, &ct, &nonce).is_err());
    }

    #[test]
    fn wrong_or_malformed_nonce_fails_authentication() {
        let key = generate_key().unwrap();
        let (ct, mut nonce) = encrypt(&key, b"payload").unwrap();
        nonce[11] ^= 0xFF;
        assert!(matches!(
            decrypt(&key, &ct, &nonce),
            Err(CofferError::AuthenticationFailure)
        ));
        assert!(matches!(
            decrypt(&key, &ct, &[0u8; 5]),
            Err(CofferError::AuthenticationFailure)
        ));
    }

    #[test]
    fn generated_keys_are_unique() {
        let keys: HashSet<[u8; 32]> = (0..100).map(|_| *generate_key().unwrap()).collect();
        assert_eq!(keys.len(), 100);
    }

    #[test]
    fn key_from_bytes_checks_length() {
        assert!(key_from_bytes(&[7u8; 32]).is_ok());
        assert!(matches!(key_from_bytes(&[7u8; 31]), Err(CofferError::Vault(_))));
    }

    #[test]
    fn bearer_tokens_are_unique_and_url_safe() {
        let tokens: HashSet<String> = (0..100)
            .map(|_| generate_bearer_token().unwrap().expose_secret().to_string())
            .collect();
        assert_eq!(tokens.len(), 100);
        for token in &tokens {
            assert_eq!(token.len(), 43);
            assert!(
                token
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'),
                "not URL-safe: {token}"
            );
        }
    }

    #[test]
    fn hash_token_is_lowercase_sha256_hex() {
        assert_eq!(
            hash_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(hash_token("x"), hash_token("x"));
        assert_ne!(hash_token("x"), hash_token("y"));
    }

    #[test]
    fn combine_requires_two_shares() {
        assert!(matches!(
            combine_key_shares(&["only-one"]),
            Err(CofferError::InvalidInput(_))
        ));
        let none: [&str; 0] = [];
        assert!(combine_key_shares(&none).is_err());
    }

    #[test]
    fn combine_hashes_sorted_nul_joined_shares() {
        let combined = combine_key_shares(&["b", "a"]).unwrap();
        assert_eq!(combined.expose_secret(), hex::encode(Sha256::digest(b"a\0b")));
        assert_eq!(combined.expose_secret().len(), 64);
    }

    #[test]
    fn credentials_match_compares_exactly() {
        assert!(credentials_match("admin-credential", "admin-credential"));
        assert!(!credentials_match("admin-credential", "admin-credentiaL"));
        assert!(!credentials_match("", "admin-credential"));
    }

    proptest! {
        #[test]
        fn share_order_does_not_matter(mut shares in proptest::collection::vec("[a-z0-9]{1,12}", 2..6)) {
            let forward = combine_key_shares(&shares).unwrap();
            shares.reverse();
            let reversed = combine_key_shares(&shares).unwrap();
            prop_assert_eq!(forward.expose_secret(), reversed.expose_secret());
        }
    }
}
