//! HTTP read API for Cinder.
//!
//! Serves the query surface consumed by miners and explorers: chain height,
//! blocks, mempool, difficulty, fee and reward schedules, balances, the
//! token registry, and history/search scans. All endpoints are read-only;
//! writes reach the node exclusively through gossip.

mod rest;
mod server;

pub use rest::{router, ApiError};
pub use server::{serve, ApiState};
