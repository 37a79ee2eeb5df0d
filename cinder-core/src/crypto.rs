//! Cryptographic primitives for Cinder.
//!
//! - SHA-256 for signing digests
//! - secp256k1 ECDSA with DER-encoded hex signatures
//! - Argon2id for the block proof-of-work digest
//!
//! All textual forms are lowercase hex. Public keys are 33-byte compressed
//! points; signatures are DER.

use argon2::{Algorithm, Argon2, Params, Version};
use secp256k1::ecdsa::Signature;
use secp256k1::{Message, PublicKey, SecretKey, SECP256K1};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Fixed salt for the proof-of-work digest. Every node must use the same
/// value or hashes will not agree.
const POW_SALT: &[u8] = b"cinder/pow/v1";

/// Argon2id memory cost in KiB.
const POW_M_COST: u32 = 2048;
/// Argon2id iteration count.
const POW_T_COST: u32 = 1;
/// Argon2id lane count.
const POW_P_COST: u32 = 1;

/// Compute the SHA-256 digest of arbitrary data.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Compute the Argon2id proof-of-work digest of a block preimage.
pub fn pow_digest(data: &[u8]) -> Result<[u8; 32]> {
    let params = Params::new(POW_M_COST, POW_T_COST, POW_P_COST, Some(32))
        .map_err(|e| Error::invalid_block(format!("argon2 params: {e}")))?;
    let argon = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
    let mut out = [0u8; 32];
    argon
        .hash_password_into(data, POW_SALT, &mut out)
        .map_err(|e| Error::invalid_block(format!("argon2: {e}")))?;
    Ok(out)
}

/// Compute the lowercase-hex proof-of-work hash of a block preimage.
pub fn pow_hex(data: &[u8]) -> Result<String> {
    Ok(hex::encode(pow_digest(data)?))
}

/// Parse a hex-encoded compressed or uncompressed secp256k1 public key.
pub fn parse_pubkey(hex_key: &str) -> Result<PublicKey> {
    let bytes = hex::decode(hex_key)?;
    PublicKey::from_slice(&bytes).map_err(|e| Error::invalid_key(e.to_string()))
}

/// Verify a DER-hex signature over a 32-byte digest under a hex public key.
pub fn verify_der_hex(digest: &[u8; 32], signature_hex: &str, pubkey_hex: &str) -> Result<()> {
    let pubkey = parse_pubkey(pubkey_hex)?;
    let sig_bytes = hex::decode(signature_hex).map_err(|_| Error::InvalidSignature)?;
    let signature = Signature::from_der(&sig_bytes).map_err(|_| Error::InvalidSignature)?;
    let message = Message::from_digest(*digest);
    SECP256K1
        .verify_ecdsa(&message, &signature, &pubkey)
        .map_err(|_| Error::InvalidSignature)
}

/// Sign a 32-byte digest, producing a DER-hex signature.
pub fn sign_der_hex(digest: &[u8; 32], secret: &SecretKey) -> String {
    let message = Message::from_digest(*digest);
    let signature = SECP256K1.sign_ecdsa(&message, secret);
    hex::encode(signature.serialize_der())
}

/// A secp256k1 keypair with its hex public key.
#[derive(Clone)]
pub struct KeyPair {
    secret: SecretKey,
    public_hex: String,
}

impl KeyPair {
    /// Generate a fresh random keypair.
    pub fn generate() -> Self {
        let (secret, public) = SECP256K1.generate_keypair(&mut secp256k1::rand::thread_rng());
        Self {
            secret,
            public_hex: hex::encode(public.serialize()),
        }
    }

    /// Load a keypair from a hex-encoded 32-byte secret scalar.
    pub fn from_secret_hex(secret_hex: &str) -> Result<Self> {
        let bytes = hex::decode(secret_hex)?;
        let secret =
            SecretKey::from_slice(&bytes).map_err(|e| Error::invalid_key(e.to_string()))?;
        let public = PublicKey::from_secret_key(SECP256K1, &secret);
        Ok(Self {
            secret,
            public_hex: hex::encode(public.serialize()),
        })
    }

    /// The hex-encoded compressed public key (the node address form).
    pub fn public_hex(&self) -> &str {
        &self.public_hex
    }

    /// Sign a 32-byte digest, producing a DER-hex signature.
    pub fn sign(&self, digest: &[u8; 32]) -> String {
        sign_der_hex(digest, &self.secret)
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyPair({})", &self.public_hex[..8.min(self.public_hex.len())])
    }
}
