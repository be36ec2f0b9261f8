//! Client-side envelope codec for backup codes.
//!
//! The server never sees a plaintext code: callers derive a key from their
//! password and a random salt, seal the code with AES-256-GCM, and upload
//! the resulting envelope. Fixed layout, base64-encoded for transport:
//!
//! | Offset | Size | Field            |
//! |--------|------|------------------|
//! | 0      | 16   | salt             |
//! | 16     | 12   | nonce            |
//! | 28     | N    | ciphertext + tag |
//!
//! Each envelope carries its own salt, so a key is derived per code and no
//! two envelopes share key material even under the same password.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use base64ct::{Base64, Encoding};
use pbkdf2::pbkdf2_hmac;
use rand::{rngs::OsRng, RngCore};
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use zeroize::Zeroizing;

/// Salt length in bytes.
pub const SALT_LEN: usize = 16;
/// AES-GCM nonce length in bytes.
pub const NONCE_LEN: usize = 12;
/// AES-GCM authentication tag length in bytes.
pub const TAG_LEN: usize = 16;
/// Derived key length in bytes (AES-256).
pub const KEY_LEN: usize = 32;
/// Backup codes are exactly 8 ASCII digits.
pub const CODE_LEN: usize = 8;
/// PBKDF2-HMAC-SHA256 iteration count.
pub const PBKDF2_ROUNDS: u32 = 100_000;

// Smallest well-formed envelope: empty plaintext still carries the tag.
const MIN_ENVELOPE_LEN: usize = SALT_LEN + NONCE_LEN + TAG_LEN;

#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("backup code must be exactly 8 digits")]
    InvalidCode,
    #[error("failed to seal backup code")]
    EncryptionFailed,
    /// Single opaque failure for the whole decrypt path: malformed base64,
    /// truncated envelope, tag mismatch, and ill-shaped plaintext are
    /// indistinguishable to avoid a wrong-password-vs-corruption oracle.
    #[error("failed to open envelope")]
    DecryptionFailed,
}

/// Check that a code has the exact 8-digit shape.
#[must_use]
pub fn valid_code(code: &str) -> bool {
    Regex::new(r"^\d{8}$").map_or(false, |re| re.is_match(code))
}

/// Generate a random 8-digit backup code.
pub fn generate_code<R: RngCore + ?Sized>(rng: &mut R) -> String {
    let mut code = String::with_capacity(CODE_LEN);
    for _ in 0..CODE_LEN {
        let digit = rng.next_u32() % 10;
        code.push(char::from(b'0' + u8::try_from(digit).unwrap_or(0)));
    }
    code
}

fn derive_key(password: &SecretString, salt: &[u8]) -> Zeroizing<[u8; KEY_LEN]> {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2_hmac::<Sha256>(
        password.expose_secret().as_bytes(),
        salt,
        PBKDF2_ROUNDS,
        key.as_mut_slice(),
    );
    key
}

/// Seal an 8-digit code under a password.
///
/// A fresh salt and nonce are drawn from the OS RNG on every call; encrypting
/// the same code twice never yields the same envelope.
///
/// # Errors
/// Returns `InvalidCode` if `code` is not exactly 8 ASCII digits, or
/// `EncryptionFailed` if the cipher rejects the input.
pub fn encrypt(code: &str, password: &SecretString) -> Result<String, EnvelopeError> {
    if !valid_code(code) {
        return Err(EnvelopeError::InvalidCode);
    }

    let mut salt = [0u8; SALT_LEN];
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut salt);
    OsRng.fill_bytes(&mut nonce);

    let key = derive_key(password, &salt);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&*key));
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), code.as_bytes())
        .map_err(|_| EnvelopeError::EncryptionFailed)?;

    let mut raw = Vec::with_capacity(SALT_LEN + NONCE_LEN + ciphertext.len());
    raw.extend_from_slice(&salt);
    raw.extend_from_slice(&nonce);
    raw.extend_from_slice(&ciphertext);

    Ok(Base64::encode_string(&raw))
}

/// Open an envelope with a password and return the 8-digit code.
///
/// The decrypted plaintext is re-checked against the 8-digit shape before it
/// is trusted; a wrong password therefore never yields a plausible code.
///
/// # Errors
/// Returns `DecryptionFailed` for any malformed, truncated, tampered, or
/// wrong-password envelope.
pub fn decrypt(envelope: &str, password: &SecretString) -> Result<String, EnvelopeError> {
    let raw = Base64::decode_vec(envelope).map_err(|_| EnvelopeError::DecryptionFailed)?;
    if raw.len() < MIN_ENVELOPE_LEN {
        return Err(EnvelopeError::DecryptionFailed);
    }

    let (salt, rest) = raw.split_at(SALT_LEN);
    let (nonce, ciphertext) = rest.split_at(NONCE_LEN);

    let key = derive_key(password, salt);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&*key));
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| EnvelopeError::DecryptionFailed)?;

    let code = String::from_utf8(plaintext).map_err(|_| EnvelopeError::DecryptionFailed)?;

    if !valid_code(&code) {
        return Err(EnvelopeError::DecryptionFailed);
    }

    Ok(code)
}
