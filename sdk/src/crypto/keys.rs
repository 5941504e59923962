//! # User Keys
//!
//! Ed25519 keypair used as the SDK's reference [`Signer`].
//!
//! The public half doubles as the user's certificate: it is what the
//! transaction ID is derived from and what the server verifies envelope
//! signatures against.
//!
//! Key bytes are never logged. The `Debug` impl prints the public key only.

use std::fmt;
use std::path::Path;

use ed25519_dalek::{Signer as DalekSigner, SigningKey, SECRET_KEY_LENGTH};
use rand::rngs::OsRng;
use thiserror::Error;

use super::signer::{Signer, SignerError};

/// Errors while loading key material.
///
/// Deliberately vague about the bytes involved.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("invalid secret key bytes: expected 32 hex-encoded bytes")]
    InvalidSecretKey,

    #[error("failed to read key file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// An Ed25519 keypair acting on behalf of one database user.
pub struct UserKeypair {
    signing_key: SigningKey,
}

impl UserKeypair {
    /// Generates a fresh keypair from the OS RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Builds a keypair from a 32-byte seed. Deterministic; handy in tests.
    pub fn from_seed(seed: &[u8; SECRET_KEY_LENGTH]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Parses a hex-encoded 32-byte secret key. Surrounding whitespace is
    /// ignored so key files with a trailing newline load fine.
    pub fn from_hex(hex_str: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_str.trim()).map_err(|_| KeyError::InvalidSecretKey)?;
        let seed: [u8; SECRET_KEY_LENGTH] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::InvalidSecretKey)?;
        Ok(Self::from_seed(&seed))
    }

    /// Loads a hex-encoded secret key from a file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, KeyError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| KeyError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_hex(&contents)
    }

    /// The user's certificate: the raw 32-byte public key.
    pub fn certificate(&self) -> Vec<u8> {
        self.signing_key.verifying_key().to_bytes().to_vec()
    }

    /// Hex form of [`certificate`](Self::certificate), as it appears in
    /// configuration.
    pub fn certificate_hex(&self) -> String {
        hex::encode(self.signing_key.verifying_key().to_bytes())
    }

    /// Hex-encoded secret key. Only for writing key files.
    pub fn secret_key_hex(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }
}

impl Signer for UserKeypair {
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, SignerError> {
        Ok(self.signing_key.sign(message).to_bytes().to_vec())
    }
}

impl Clone for UserKeypair {
    fn clone(&self) -> Self {
        Self::from_seed(&self.signing_key.to_bytes())
    }
}

impl fmt::Debug for UserKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserKeypair(pub={})", self.certificate_hex())
    }
}
