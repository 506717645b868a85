//! Keyed-hash signatures shared by both gateways
//!
//! Parameters are canonicalized by percent-encoding every key and value,
//! sorting on the encoded key and joining as `key=value&key=value`. The
//! HMAC digest is rendered as lowercase hex.

use std::collections::BTreeMap;

use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha512};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha256,
    Sha512,
}

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("HMAC key rejected: {0}")]
    InvalidKey(#[from] hmac::digest::InvalidLength),
}

/// Percent-encode one key or value; spaces become `+`.
fn encode(raw: &str) -> String {
    urlencoding::encode(raw).replace("%20", "+")
}

/// Canonical string signed by the gateways.
pub fn canonicalize<'a, I>(params: I) -> String
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    let encoded: BTreeMap<String, String> = params
        .into_iter()
        .map(|(key, value)| (encode(key), encode(value)))
        .collect();

    encoded
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&")
}

/// Sign an already-assembled string (VNPay query/refund use pipe-joined data).
pub fn sign_raw(
    algorithm: HashAlgorithm,
    secret: &str,
    data: &str,
) -> Result<String, SignatureError> {
    let digest = match algorithm {
        HashAlgorithm::Sha256 => {
            let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())?;
            mac.update(data.as_bytes());
            mac.finalize().into_bytes().to_vec()
        }
        HashAlgorithm::Sha512 => {
            let mut mac = Hmac::<Sha512>::new_from_slice(secret.as_bytes())?;
            mac.update(data.as_bytes());
            mac.finalize().into_bytes().to_vec()
        }
    };

    Ok(hex::encode(digest))
}

pub fn sign(
    algorithm: HashAlgorithm,
    secret: &str,
    params: &BTreeMap<String, String>,
) -> Result<String, SignatureError> {
    sign_raw(algorithm, secret, &canonicalize(params))
}

/// Constant-time check of a received hex signature against `data`.
pub fn verify(
    algorithm: HashAlgorithm,
    secret: &str,
    data: &str,
    signature: &str,
) -> Result<bool, SignatureError> {
    // Gateways are not consistent about hex case
    let Ok(expected) = hex::decode(signature.trim().to_ascii_lowercase()) else {
        return Ok(false);
    };

    let verified = match algorithm {
        HashAlgorithm::Sha256 => {
            let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())?;
            mac.update(data.as_bytes());
            mac.verify_slice(&expected).is_ok()
        }
        HashAlgorithm::Sha512 => {
            let mut mac = Hmac::<Sha512>::new_from_slice(secret.as_bytes())?;
            mac.update(data.as_bytes());
            mac.verify_slice(&expected).is_ok()
        }
    };

    Ok(verified)
}
