//! Gossip and synchronization for Cinder.
//!
//! Each node runs one inbound WebSocket listener and one outbound client per
//! configured peer. Messages are JSON envelopes `{event, data}` with
//! `event ∈ {tx, block, push}`. A height watchdog against an HTTP seed peer
//! drives pull-sync (peer ahead) and sub-chain push (peer behind).
//!
//! - [`envelope`] - the wire format
//! - [`hub`] - socket registry and broadcast fan-out
//! - [`handler`] - envelope dispatch, duplicate suppression, ingest gating
//! - [`peer`] - outbound connections: keep-alive, reconnect, silencing
//! - [`server`] - the inbound listener
//! - [`sync`] - watchdog, pull-sync, push, and seed bootstrap

pub mod envelope;
pub mod handler;
pub mod hub;
pub mod peer;
pub mod server;
pub mod sync;

pub use envelope::Envelope;
pub use handler::NodeHandle;
pub use hub::GossipHub;
pub use peer::{run_peer, PeerStatus};
pub use server::run_server;
pub use sync::{bootstrap_from_seed, run_watchdog, WATCHDOG_SECS};
