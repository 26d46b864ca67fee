use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use p256::ecdsa::{SigningKey, VerifyingKey};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use zeroize::Zeroizing;

use crate::ecdsa::{sign, SignatureError};

/// A P-256 keypair with base64-encoded key material.
///
/// Public key: uncompressed SEC1 point. Private key: the 32-byte scalar,
/// held in a `Zeroizing` string so it is wiped on drop.
pub struct KeyPair {
    pub public_key: String,
    private_key: Zeroizing<String>,
}

impl KeyPair {
    /// Generate a fresh keypair from OS randomness.
    pub fn generate() -> Self {
        let sk = SigningKey::random(&mut OsRng);
        let vk = VerifyingKey::from(&sk);
        Self {
            public_key: BASE64.encode(vk.to_encoded_point(false).as_bytes()),
            private_key: Zeroizing::new(BASE64.encode(sk.to_bytes())),
        }
    }

    /// Base64 of the private scalar.
    pub fn private_key(&self) -> &str {
        &self.private_key
    }

    /// Sign `message` with this keypair's private key.
    pub fn sign(&self, message: &[u8]) -> Result<String, SignatureError> {
        sign(&self.private_key, message)
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyPair {{ public_key: {}… }}", &self.public_key[..12.min(self.public_key.len())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecdsa::verify;

    #[test]
    fn generated_keys_are_distinct() {
        let a = KeyPair::generate();
        let b = KeyPair::generate();
        assert_ne!(a.public_key, b.public_key);
    }

    #[test]
    fn keypair_signs_verifiably() {
        let kp = KeyPair::generate();
        let sig = kp.sign(b"shipment sealed").unwrap();
        assert!(verify(&kp.public_key, b"shipment sealed", &sig));
    }
}
