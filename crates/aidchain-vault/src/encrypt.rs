//! At-rest encryption of signing keys.
//!
//! Container format: `base64(salt):base64(iv):base64(ciphertext)` with a
//! 16-byte salt, 16-byte IV, AES-256-CBC/PKCS7, and the AES key derived by
//! PBKDF2-SHA256 over the passphrase at 10 000 iterations.
//!
//! Failure taxonomy matters here: a container that does not parse is
//! `BadFormat`; a container that parses but does not decrypt under the given
//! passphrase is `Unauthorized`. Callers branch on the distinction.

use aes::Aes256;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroizing;

use aidchain_core::{AidError, KEY_DERIVATION_ITERATIONS, KEY_IV_LEN, KEY_LEN, KEY_SALT_LEN};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

fn derive_key(passphrase: &str, salt: &[u8]) -> Zeroizing<[u8; KEY_LEN]> {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2_hmac::<Sha256>(
        passphrase.as_bytes(),
        salt,
        KEY_DERIVATION_ITERATIONS,
        key.as_mut(),
    );
    key
}

/// Encrypt `plain` under `passphrase` into the container format.
pub fn encrypt_key(plain: &str, passphrase: &str) -> String {
    let mut salt = [0u8; KEY_SALT_LEN];
    let mut iv = [0u8; KEY_IV_LEN];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    rand::rngs::OsRng.fill_bytes(&mut iv);

    let key = derive_key(passphrase, &salt);
    let ciphertext = Aes256CbcEnc::new_from_slices(key.as_slice(), &iv)
        .expect("key and iv lengths are fixed")
        .encrypt_padded_vec_mut::<Pkcs7>(plain.as_bytes());

    format!(
        "{}:{}:{}",
        BASE64.encode(salt),
        BASE64.encode(iv),
        BASE64.encode(ciphertext)
    )
}

/// Decrypt a container produced by [`encrypt_key`].
pub fn decrypt_key(cipher: &str, passphrase: &str) -> Result<String, AidError> {
    let parts: Vec<&str> = cipher.split(':').collect();
    if parts.len() != 3 {
        return Err(AidError::BadFormat(
            "encrypted key must have salt:iv:ciphertext parts".into(),
        ));
    }

    let salt = BASE64
        .decode(parts[0])
        .map_err(|_| AidError::BadFormat("encrypted key salt is not base64".into()))?;
    let iv = BASE64
        .decode(parts[1])
        .map_err(|_| AidError::BadFormat("encrypted key iv is not base64".into()))?;
    let ciphertext = BASE64
        .decode(parts[2])
        .map_err(|_| AidError::BadFormat("encrypted key ciphertext is not base64".into()))?;

    if salt.len() != KEY_SALT_LEN || iv.len() != KEY_IV_LEN {
        return Err(AidError::BadFormat("encrypted key salt/iv length".into()));
    }

    let key = derive_key(passphrase, &salt);
    let plain = Aes256CbcDec::new_from_slices(key.as_slice(), &iv)
        .expect("key and iv lengths checked above")
        .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
        .map_err(|_| AidError::Unauthorized("wrong passphrase or tampered key".into()))?;

    String::from_utf8(plain)
        .map_err(|_| AidError::Unauthorized("wrong passphrase or tampered key".into()))
}
