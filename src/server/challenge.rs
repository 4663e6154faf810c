use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, KeyIvInit};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::ChallengeError;

type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

const IV_LEN: usize = 16;
const URL_VERIFICATION: &str = "url_verification";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChallengeResponse {
    pub challenge: String,
}

/// Validates the provider's url_verification handshake.
///
/// Holds no state besides the configured secrets and behaves the same in
/// every transport mode.
#[derive(Debug, Clone, Default)]
pub struct ChallengeVerifier {
    encrypt_key: Option<String>,
    verification_token: Option<String>,
}

impl ChallengeVerifier {
    pub fn new(encrypt_key: Option<String>, verification_token: Option<String>) -> Self {
        let non_blank = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        Self {
            encrypt_key: non_blank(encrypt_key),
            verification_token: non_blank(verification_token),
        }
    }

    /// `None` means the caller should reject the request
    pub fn process_challenge(&self, raw: &str) -> Option<ChallengeResponse> {
        match self.verify(raw) {
            Ok(response) => {
                tracing::info!("Challenge verification passed");
                Some(response)
            }
            Err(e) => {
                tracing::debug!("Challenge rejected: {}", e);
                None
            }
        }
    }

    pub fn verify(&self, raw: &str) -> Result<ChallengeResponse, ChallengeError> {
        let doc = self.decode_envelope(raw)?;

        if let Some(expected) = &self.verification_token {
            if doc.get("token").and_then(Value::as_str) != Some(expected.as_str()) {
                return Err(ChallengeError::TokenMismatch);
            }
        }

        if doc.get("type").and_then(Value::as_str) != Some(URL_VERIFICATION) {
            return Err(ChallengeError::NotVerification);
        }

        match doc.get("challenge").and_then(Value::as_str) {
            Some(challenge) if !challenge.is_empty() => Ok(ChallengeResponse {
                challenge: challenge.to_string(),
            }),
            _ => Err(ChallengeError::MissingChallenge),
        }
    }

    /// Parse a callback body, decrypting it first when it carries an
    /// `encrypt` field. Event envelopes go through here too.
    pub fn decode_envelope(&self, raw: &str) -> Result<Value, ChallengeError> {
        let doc: Value = serde_json::from_str(raw).map_err(|_| ChallengeError::Parse)?;

        let Some(encrypted) = doc.get("encrypt").and_then(Value::as_str) else {
            return Ok(doc);
        };
        let key = self
            .encrypt_key
            .as_deref()
            .ok_or(ChallengeError::NoEncryptKey)?;

        let plaintext = decrypt(key, encrypted)?;
        serde_json::from_str(&plaintext).map_err(|_| ChallengeError::Parse)
    }
}

fn decrypt(encrypt_key: &str, encoded: &str) -> Result<String, ChallengeError> {
    let blob = STANDARD
        .decode(encoded.trim())
        .map_err(|_| ChallengeError::Decode)?;
    if blob.len() <= IV_LEN {
        return Err(ChallengeError::Decrypt);
    }
    let (iv, ciphertext) = blob.split_at(IV_LEN);

    let key = Sha256::digest(encrypt_key.as_bytes());
    let plain = Aes256CbcDec::new_from_slices(&key, iv)
        .map_err(|_| ChallengeError::Decrypt)?
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| ChallengeError::Decrypt)?;

    String::from_utf8(plain).map_err(|_| ChallengeError::Utf8)
}
