//! Secret handling: environment-resolved API keys and the AES-256-GCM
//! cipher that seals upload tickets.
//!
//! API keys for the external capabilities are optional: an unset or
//! empty variable means the collaborator is called without credentials.
//! Ticket sealing uses AES-256-GCM so a ticket is both confidential and
//! tamper-evident; the hex encoding keeps tokens URL-safe.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use secrecy::SecretString;

/// Environment variable holding the ticket encryption key
/// (64 hex characters, 32 bytes decoded).
pub const TOKEN_KEY_ENV_VAR: &str = "SPENDSIGHT_TOKEN_KEY";

/// Nonce size for AES-256-GCM (96 bits = 12 bytes).
const NONCE_SIZE: usize = 12;

/// Errors from secret resolution or ticket sealing.
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("Environment variable '{name}' contains invalid UTF-8")]
    EnvVarNotUnicode { name: String },

    #[error("Invalid encryption key: {0}")]
    InvalidKey(String),

    #[error("Encryption error: {0}")]
    Encrypt(String),

    #[error("Decryption error: {0}")]
    Decrypt(String),
}

pub type Result<T> = std::result::Result<T, SecretError>;

/// Reads an optional API key from the environment.
///
/// Unset or empty means "no key". Values are trimmed since env files
/// often leave a trailing newline on the value.
pub fn env_secret(name: &str) -> Result<Option<SecretString>> {
    match std::env::var(name) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                Ok(None)
            } else {
                Ok(Some(SecretString::from(trimmed.to_string())))
            }
        }
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
            name: name.to_string(),
        }),
    }
}

/// Seals and opens upload tickets with AES-256-GCM.
///
/// Token format: `<12-byte nonce><ciphertext>`, hex-encoded.
pub struct TicketCipher {
    cipher: Aes256Gcm,
}

impl TicketCipher {
    /// Creates a cipher from a 64-character hex key.
    pub fn from_hex_key(key_hex: &str) -> Result<Self> {
        let key_bytes = hex_decode(key_hex)
            .map_err(|e| SecretError::InvalidKey(format!("Invalid hex key: {}", e)))?;

        if key_bytes.len() != 32 {
            return Err(SecretError::InvalidKey(format!(
                "Key must be 32 bytes (64 hex chars), got {} bytes",
                key_bytes.len()
            )));
        }

        let cipher = Aes256Gcm::new_from_slice(&key_bytes)
            .map_err(|e| SecretError::InvalidKey(format!("Failed to create cipher: {}", e)))?;

        Ok(Self { cipher })
    }

    /// Creates a cipher from `SPENDSIGHT_TOKEN_KEY`, or a freshly random
    /// ephemeral key when the variable is unset.
    ///
    /// With an ephemeral key, outstanding upload credentials become
    /// invalid when the process restarts.
    pub fn from_env_or_ephemeral() -> Result<Self> {
        match std::env::var(TOKEN_KEY_ENV_VAR) {
            Ok(key_hex) => Self::from_hex_key(key_hex.trim()),
            Err(_) => {
                tracing::warn!(
                    "{} not set; using an ephemeral ticket key, so outstanding upload \
                     credentials will not survive a restart",
                    TOKEN_KEY_ENV_VAR
                );
                let key_bytes = rand_bytes::<32>()?;
                let cipher = Aes256Gcm::new_from_slice(&key_bytes).map_err(|e| {
                    SecretError::InvalidKey(format!("Failed to create cipher: {}", e))
                })?;
                Ok(Self { cipher })
            }
        }
    }

    /// Encrypts plaintext and returns the hex token with prepended nonce.
    pub fn seal(&self, plaintext: &str) -> Result<String> {
        let nonce_bytes = rand_bytes::<NONCE_SIZE>()?;
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| SecretError::Encrypt(e.to_string()))?;

        let mut combined = nonce_bytes.to_vec();
        combined.extend(ciphertext);

        Ok(hex_encode(&combined))
    }

    /// Decrypts a hex token (with prepended nonce) back to plaintext.
    ///
    /// Fails on any tampering, since GCM authenticates the ciphertext.
    pub fn open(&self, token_hex: &str) -> Result<String> {
        let combined = hex_decode(token_hex)
            .map_err(|e| SecretError::Decrypt(format!("Invalid hex: {}", e)))?;

        if combined.len() < NONCE_SIZE {
            return Err(SecretError::Decrypt("Token too short".to_string()));
        }

        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_SIZE);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext_bytes = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| SecretError::Decrypt(e.to_string()))?;

        String::from_utf8(plaintext_bytes)
            .map_err(|e| SecretError::Decrypt(format!("Invalid UTF-8: {}", e)))
    }
}

/// Encodes bytes as a lowercase hex string.
fn hex_encode(bytes: &[u8]) -> String {
    const HEX_CHARS: &[u8; 16] = b"0123456789abcdef";
    let mut result = String::with_capacity(bytes.len() * 2);
    for &byte in bytes {
        result.push(HEX_CHARS[(byte >> 4) as usize] as char);
        result.push(HEX_CHARS[(byte & 0x0f) as usize] as char);
    }
    result
}

/// Decodes a hex string to bytes.
fn hex_decode(hex: &str) -> std::result::Result<Vec<u8>, String> {
    if hex.len() % 2 != 0 {
        return Err("Hex string must have even length".to_string());
    }

    (0..hex.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map_err(|e| format!("Invalid hex at position {}: {}", i, e))
        })
        .collect()
}

/// Generates cryptographically secure random bytes.
fn rand_bytes<const N: usize>() -> Result<[u8; N]> {
    let mut bytes = [0u8; N];
    getrandom::getrandom(&mut bytes)
        .map_err(|e| SecretError::Encrypt(format!("Failed to generate random bytes: {}", e)))?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use serial_test::serial;

    const TEST_KEY: &str = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

    #[test]
    #[serial]
    fn test_env_secret_present() {
        std::env::set_var("SPENDSIGHT_TEST_SECRET", "  api-key-value\n");
        let secret = env_secret("SPENDSIGHT_TEST_SECRET").unwrap().unwrap();
        assert_eq!(secret.expose_secret(), "api-key-value");
        std::env::remove_var("SPENDSIGHT_TEST_SECRET");
    }

    #[test]
    #[serial]
    fn test_env_secret_absent_or_empty() {
        std::env::remove_var("SPENDSIGHT_TEST_SECRET");
        assert!(env_secret("SPENDSIGHT_TEST_SECRET").unwrap().is_none());

        std::env::set_var("SPENDSIGHT_TEST_SECRET", "  ");
        assert!(env_secret("SPENDSIGHT_TEST_SECRET").unwrap().is_none());
        std::env::remove_var("SPENDSIGHT_TEST_SECRET");
    }

    #[test]
    fn test_seal_open_round_trip() {
        let cipher = TicketCipher::from_hex_key(TEST_KEY).unwrap();
        let token = cipher.seal(r#"{"key":"receipts/a.jpg"}"#).unwrap();
        let opened = cipher.open(&token).unwrap();
        assert_eq!(opened, r#"{"key":"receipts/a.jpg"}"#);
    }

    #[test]
    fn test_tokens_are_url_safe_hex() {
        let cipher = TicketCipher::from_hex_key(TEST_KEY).unwrap();
        let token = cipher.seal("payload").unwrap();
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_tampered_token_rejected() {
        let cipher = TicketCipher::from_hex_key(TEST_KEY).unwrap();
        let token = cipher.seal("payload").unwrap();

        // Flip one hex digit in the ciphertext portion.
        let mut tampered: Vec<char> = token.chars().collect();
        let last = tampered.len() - 1;
        tampered[last] = if tampered[last] == '0' { '1' } else { '0' };
        let tampered: String = tampered.into_iter().collect();

        assert!(matches!(
            cipher.open(&tampered),
            Err(SecretError::Decrypt(_))
        ));
    }

    #[test]
    fn test_wrong_key_rejected() {
        let cipher = TicketCipher::from_hex_key(TEST_KEY).unwrap();
        let other = TicketCipher::from_hex_key(
            "ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff",
        )
        .unwrap();

        let token = cipher.seal("payload").unwrap();
        assert!(other.open(&token).is_err());
    }

    #[test]
    fn test_invalid_key_lengths() {
        assert!(TicketCipher::from_hex_key("abcd").is_err());
        assert!(TicketCipher::from_hex_key("not-hex").is_err());
    }

    #[test]
    fn test_short_token_rejected() {
        let cipher = TicketCipher::from_hex_key(TEST_KEY).unwrap();
        assert!(cipher.open("abcdef").is_err());
    }
}
