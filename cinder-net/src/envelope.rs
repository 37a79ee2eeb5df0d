//! Gossip wire format.
//!
//! One JSON document per WebSocket text frame:
//! `{"event":"tx"|"block"|"push","data":...}`.

use serde::{Deserialize, Serialize};

use cinder_core::{Block, Transaction};

/// A gossip message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum Envelope {
    /// A transaction offered for the mempool.
    Tx(Transaction),
    /// A freshly mined block.
    Block(Block),
    /// A sub-chain proposing a short reorg, at most 15 blocks.
    Push(Vec<Block>),
}

impl Envelope {
    /// The event discriminator as it appears on the wire.
    pub fn event(&self) -> &'static str {
        match self {
            Envelope::Tx(_) => "tx",
            Envelope::Block(_) => "block",
            Envelope::Push(_) => "push",
        }
    }

    /// Serialize to the wire form.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("envelope serialization cannot fail")
    }

    /// Parse from the wire form.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_core::genesis;

    #[test]
    fn test_envelope_shape() {
        let env = Envelope::Block(genesis());
        let json = env.to_json();
        assert!(json.starts_with("{\"event\":\"block\",\"data\":"));
        assert_eq!(env.event(), "block");

        let back = Envelope::from_json(&json).unwrap();
        match back {
            Envelope::Block(b) => assert_eq!(b.hash, genesis().hash),
            other => panic!("wrong envelope: {}", other.event()),
        }
    }

    #[test]
    fn test_push_roundtrip() {
        let env = Envelope::Push(vec![genesis()]);
        let back = Envelope::from_json(&env.to_json()).unwrap();
        assert!(matches!(back, Envelope::Push(blocks) if blocks.len() == 1));
    }

    #[test]
    fn test_unknown_event_rejected() {
        assert!(Envelope::from_json("{\"event\":\"gossip\",\"data\":{}}").is_err());
        assert!(Envelope::from_json("not json").is_err());
    }
}
