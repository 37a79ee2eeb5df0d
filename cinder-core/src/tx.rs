//! Transactions.
//!
//! Hashing and signing use the canonical JSON encoding: fields in the order
//! they are declared here, compact separators, absent optionals omitted. The
//! signing preimage is the transaction with `signature` set to the empty
//! string.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::crypto::{sha256, verify_der_hex, KeyPair};
use crate::error::{Error, Result};

/// Sentinel value carried in the `sender` field of protocol-injected reward
/// transactions.
pub const NETWORK_SENDER: &str = "network";

/// Sentinel value carried in the `sender` and `signature` fields of airdrop
/// transactions.
pub const MINT_SENDER: &str = "mint";

/// The originator of a transaction.
///
/// Reserved senders share the wire representation of addresses (a bare JSON
/// string) but are distinct at the type level so no code path can mistake
/// `"network"` for a spendable account.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Sender {
    /// An ordinary account, identified by its hex public key.
    Address(String),
    /// Protocol-injected reward transactions.
    Network,
    /// Protocol-synthesized airdrop transactions.
    Mint,
}

impl Sender {
    /// The wire string for this sender.
    pub fn as_str(&self) -> &str {
        match self {
            Sender::Address(a) => a,
            Sender::Network => NETWORK_SENDER,
            Sender::Mint => MINT_SENDER,
        }
    }

    /// Whether this is one of the reserved protocol senders.
    pub fn is_reserved(&self) -> bool {
        !matches!(self, Sender::Address(_))
    }

    /// The address, for ordinary senders.
    pub fn address(&self) -> Option<&str> {
        match self {
            Sender::Address(a) => Some(a),
            _ => None,
        }
    }
}

impl std::fmt::Display for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Sender {
    fn from(s: &str) -> Self {
        match s {
            NETWORK_SENDER => Sender::Network,
            MINT_SENDER => Sender::Mint,
            other => Sender::Address(other.to_string()),
        }
    }
}

impl Serialize for Sender {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Sender {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s.is_empty() {
            return Err(D::Error::custom("empty sender"));
        }
        Ok(Sender::from(s.as_str()))
    }
}

/// Description of a new token carried by a mint transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintSpec {
    /// Token name: 1 to 19 uppercase ASCII letters.
    pub token: String,
    /// Amount credited to the minter once the mint commits.
    pub airdrop: u64,
    /// Per-block mining reward; the token is minable iff this is positive.
    #[serde(rename = "miningReward", skip_serializing_if = "Option::is_none")]
    pub mining_reward: Option<u64>,
}

/// A transfer of points or tokens, or a mint of a new token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: Sender,
    pub receiver: String,
    /// Positive amount in the smallest unit.
    pub amount: u64,
    /// DER hex over SHA-256 of the signing preimage, or a reserved literal.
    pub signature: String,
    pub nonce: u64,
    /// Milliseconds since epoch.
    pub timestamp: u64,
    /// Token ticker; absent means the native coin.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// The receiver cannot spend until an applied block's timestamp reaches
    /// this value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unlock: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mint: Option<MintSpec>,
}

/// Serialize-only shadow of [`Transaction`] with the signature blanked.
/// Field order must match `Transaction` exactly.
#[derive(Serialize)]
struct SignableTx<'a> {
    sender: &'a Sender,
    receiver: &'a str,
    amount: u64,
    signature: &'a str,
    nonce: u64,
    timestamp: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    unlock: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mint: Option<&'a MintSpec>,
}

impl Transaction {
    /// The canonical JSON bytes of this transaction with `signature` blanked.
    pub fn signing_bytes(&self) -> Vec<u8> {
        let signable = SignableTx {
            sender: &self.sender,
            receiver: &self.receiver,
            amount: self.amount,
            signature: "",
            nonce: self.nonce,
            timestamp: self.timestamp,
            token: self.token.as_deref(),
            unlock: self.unlock,
            mint: self.mint.as_ref(),
        };
        serde_json::to_vec(&signable).expect("transaction serialization cannot fail")
    }

    /// SHA-256 of the signing preimage.
    pub fn signing_digest(&self) -> [u8; 32] {
        sha256(&self.signing_bytes())
    }

    /// Verify the signature of an address-sender transaction against its
    /// `sender` public key.
    pub fn verify_signature(&self) -> Result<()> {
        let address = self
            .sender
            .address()
            .ok_or_else(|| Error::invalid_tx("reserved sender has no signature to verify"))?;
        verify_der_hex(&self.signing_digest(), &self.signature, address)
    }

    /// Sign this transaction with the given key, setting `sender` and
    /// `signature`.
    pub fn sign(&mut self, key: &KeyPair) {
        self.sender = Sender::Address(key.public_hex().to_string());
        self.signature = key.sign(&self.signing_digest());
    }

    /// Identity tuple used to match mempool entries against block contents.
    pub fn identity(&self) -> (&str, u64, u64, &str, &str, Option<&str>) {
        (
            &self.signature,
            self.amount,
            self.nonce,
            self.sender.as_str(),
            &self.receiver,
            self.token.as_deref(),
        )
    }

    /// Whether this transaction matches another by identity tuple.
    pub fn same_identity(&self, other: &Transaction) -> bool {
        self.identity() == other.identity()
    }

    /// Build the airdrop transaction synthesized when a mint is admitted.
    pub fn airdrop_for(mint_tx: &Transaction, timestamp: u64) -> Option<Transaction> {
        let mint = mint_tx.mint.as_ref()?;
        let minter = mint_tx.sender.address()?;
        if mint.airdrop == 0 {
            return None;
        }
        Some(Transaction {
            sender: Sender::Mint,
            receiver: minter.to_string(),
            amount: mint.airdrop,
            signature: MINT_SENDER.to_string(),
            nonce: 0,
            timestamp,
            token: Some(mint.token.clone()),
            unlock: None,
            mint: None,
        })
    }
}
