// ===============================
// src/credential.rs
// ===============================
//
// Wallet key as exported by Phantom/solana-keygen: Base58 of the 64-byte
// ed25519 keypair (32-byte secret seed followed by the 32-byte public key).
// Decoded once at startup; the trade API signs server-side so the bytes are
// only held, never used to sign locally.
//
use std::fmt;

use thiserror::Error;

pub const KEYPAIR_LEN: usize = 64;

#[derive(Debug, Error, PartialEq)]
pub enum CredentialError {
    #[error("WALLET_PRIVATE_KEY is not valid Base58")]
    NotBase58,
    #[error("WALLET_PRIVATE_KEY decodes to {0} bytes, expected {KEYPAIR_LEN}")]
    BadLength(usize),
}

pub struct Credential {
    bytes: [u8; KEYPAIR_LEN],
}

impl Credential {
    pub fn from_base58(encoded: &str) -> Result<Self, CredentialError> {
        let raw = bs58::decode(encoded.trim())
            .into_vec()
            .map_err(|_| CredentialError::NotBase58)?;
        let bytes: [u8; KEYPAIR_LEN] = raw
            .as_slice()
            .try_into()
            .map_err(|_| CredentialError::BadLength(raw.len()))?;
        Ok(Credential { bytes })
    }

    /// Base58 public key (second half of the keypair).
    pub fn public_key(&self) -> String {
        bs58::encode(&self.bytes[32..]).into_string()
    }
}

// never print the secret half
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential").field("public_key", &self.public_key()).finish()
    }
}
