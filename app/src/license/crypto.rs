// ==============================================================================
// license/crypto.rs - Premium Catalog Encryption
// ==============================================================================
// Description: SHA-256 key derivation and AES-256-GCM catalog decryption
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================
// Key:        SHA-256(license key bytes), 32 bytes
// Cipher:     AES-256-GCM, 96-bit IV, 128-bit tag appended to the ciphertext
// Transport:  standard base64 for both ciphertext and IV
// ==============================================================================

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use rand::RngCore;
use sha2::{Digest, Sha256};
use tracing::debug;
use zeroize::Zeroizing;

use super::LicenseError;
use crate::catalog::{parse_catalog, LoadedCatalog};

/// AES-GCM IV length in bytes
pub const IV_LEN: usize = 12;

/// Derive the 256-bit AES key from a license key
pub fn derive_key(license_key: &str) -> Zeroizing<[u8; 32]> {
    let digest = Sha256::digest(license_key.as_bytes());
    let mut key = Zeroizing::new([0u8; 32]);
    key.copy_from_slice(&digest);
    key
}

fn cipher_for(license_key: &str) -> Aes256Gcm {
    let key = derive_key(license_key);
    Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_slice()))
}

/// Decrypt and validate a premium catalog payload
///
/// Any failure (bad base64, wrong IV length, authentication failure, invalid
/// UTF-8 or a catalog that fails validation) is reported as
/// `LicenseError::DecryptFailure`.
pub fn decrypt_catalog(
    ciphertext_b64: &str,
    iv_b64: &str,
    license_key: &str,
) -> Result<LoadedCatalog, LicenseError> {
    let ciphertext = STANDARD
        .decode(ciphertext_b64.trim())
        .map_err(|e| LicenseError::DecryptFailure(format!("ciphertext is not base64: {}", e)))?;
    let iv = STANDARD
        .decode(iv_b64.trim())
        .map_err(|e| LicenseError::DecryptFailure(format!("IV is not base64: {}", e)))?;

    if iv.len() != IV_LEN {
        return Err(LicenseError::DecryptFailure(format!(
            "IV must be {} bytes, got {}",
            IV_LEN,
            iv.len()
        )));
    }

    let plaintext = cipher_for(license_key)
        .decrypt(Nonce::from_slice(&iv), ciphertext.as_ref())
        .map_err(|_| LicenseError::DecryptFailure("authentication failed".to_string()))?;

    let json = String::from_utf8(plaintext)
        .map_err(|_| LicenseError::DecryptFailure("catalog is not UTF-8".to_string()))?;

    debug!("Decrypted premium catalog ({} bytes)", json.len());

    parse_catalog(&json).map_err(|e| LicenseError::DecryptFailure(e.to_string()))
}

/// Encrypt a catalog with a fresh random IV, returning base64 (ciphertext, iv)
pub fn encrypt_catalog(plaintext: &[u8], license_key: &str) -> Result<(String, String), LicenseError> {
    let mut iv = [0u8; IV_LEN];
    rand::thread_rng().fill_bytes(&mut iv);

    let ciphertext = cipher_for(license_key)
        .encrypt(Nonce::from_slice(&iv), plaintext)
        .map_err(|_| LicenseError::DecryptFailure("encryption failed".to_string()))?;

    Ok((STANDARD.encode(ciphertext), STANDARD.encode(iv)))
}
