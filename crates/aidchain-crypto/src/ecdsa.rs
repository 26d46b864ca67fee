use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("invalid private key encoding")]
    InvalidPrivateKey,
    #[error("signing failed")]
    SigningFailed,
}

/// Sign `message` with a base64-encoded P-256 private scalar. The message is
/// prehashed with SHA-256 per standard ECDSA. Returns the base64 of the
/// 64-byte fixed-width signature.
pub fn sign(private_key_b64: &str, message: &[u8]) -> Result<String, SignatureError> {
    let sk_bytes = BASE64
        .decode(private_key_b64)
        .map_err(|_| SignatureError::InvalidPrivateKey)?;
    let sk = SigningKey::from_slice(&sk_bytes).map_err(|_| SignatureError::InvalidPrivateKey)?;
    let signature: Signature = sk.sign(message);
    Ok(BASE64.encode(signature.to_bytes()))
}

/// Verify a base64 signature under a base64 SEC1 public key.
///
/// Total over its inputs: any malformed key, signature, or mismatch returns
/// `false`. Callers never have to distinguish "bad encoding" from "bad
/// signature" on the verification path.
pub fn verify(public_key_b64: &str, message: &[u8], signature_b64: &str) -> bool {
    let Ok(pk_bytes) = BASE64.decode(public_key_b64) else {
        return false;
    };
    let Ok(vk) = VerifyingKey::from_sec1_bytes(&pk_bytes) else {
        return false;
    };
    let Ok(sig_bytes) = BASE64.decode(signature_b64) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(&sig_bytes) else {
        return false;
    };
    vk.verify(message, &signature).is_ok()
}
