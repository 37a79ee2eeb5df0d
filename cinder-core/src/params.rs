//! Chain parameters and schedules.
//!
//! The constants here are protocol-fixed: changing any of them forks the
//! network. Amounts are expressed in points, the smallest unit of the native
//! coin.

use primitive_types::U256;

/// Points per coin.
pub const COIN: u64 = 1_000_000;

/// Nominal inter-block interval in milliseconds. Live blocks older than this
/// are rejected on ingest.
pub const BLOCK_TIME_MS: u64 = 60_000;

/// Tolerated clock drift for block timestamps, in milliseconds.
pub const FUTURE_DRIFT_MS: u64 = 10_000;

/// Difficulty window and maximum reorg depth, in blocks.
pub const TAIL: usize = 100;

/// The genesis-era difficulty target, big-endian hex. Targets never rise
/// above this bound.
pub const STARTING_DIFF: &str = "7fffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff";

/// Fixed recipient of dev fees and mint fees.
pub const DEV_WALLET: &str = "028f6b2fb2a9e171d3c39b5e5b0f3e64247acba7cd4b4e7f0a9f5d2c81e6a4d905";

/// Initial block reward in points. Halves every [`HALVING_INTERVAL`] blocks.
pub const INITIAL_REWARD: u64 = 50 * COIN;

/// Reward is halved after `n` blocks.
pub const HALVING_INTERVAL: u64 = 500_000;

/// Only `n` halvings happen, after which the reward stays constant.
pub const MAX_HALVINGS: u64 = 20;

/// Base mint fee in points; the fee grows linearly with the number of tokens
/// already minted.
pub const MINT_FEE_BASE: u64 = 100 * COIN;

/// The native ticker is reserved and can never be minted as a token.
pub const RESERVED_TOKEN: &str = "FLSS";

/// Maximum length of a sub-chain push.
pub const MAX_PUSH_LEN: usize = 15;

/// Maximum blocks per bulk-sync HTTP request.
pub const SYNC_BATCH: u64 = 500;

/// Retained window of spent transaction signatures.
pub const SIG_CACHE_LIMIT: usize = 10_000;

/// The prev_hash carried by the genesis block.
pub const GENESIS_PREV_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// Full block reward in points at a height.
pub fn reward(height: u64) -> u64 {
    let halvings = (height / HALVING_INTERVAL).min(MAX_HALVINGS);
    INITIAL_REWARD >> halvings
}

/// Dev cut of a block reward (one tenth, integer floor).
pub fn dev_cut(reward: u64) -> u64 {
    reward / 10
}

/// Miner share of a block reward (the remainder after the dev cut).
pub fn miner_share(reward: u64) -> u64 {
    reward - dev_cut(reward)
}

/// Fee in points for minting a new token. Grows with the number of tokens
/// already minted so that the namespace is increasingly expensive to squat.
pub fn mint_fee(_height: u64, minted_count: usize) -> u64 {
    MINT_FEE_BASE * (minted_count as u64 + 1)
}

/// The genesis-era target as an integer.
pub fn starting_target() -> U256 {
    U256::from_str_radix(STARTING_DIFF, 16).expect("STARTING_DIFF is valid hex")
}

/// Canonical hex form of a target, 64 lowercase digits.
pub fn target_hex(target: &U256) -> String {
    format!("{target:064x}")
}

/// Derive the current target from the timestamps of the tail window.
///
/// The target scales with the ratio of the observed timestamp span to the
/// expected span (`BLOCK_TIME_MS * (len - 1)`), clamped to a quarter/quadruple
/// of the expected span per window, and never rises above the starting
/// target. Fewer than two tail blocks yield the starting target.
pub fn target_for_tail(timestamps: &[u64]) -> U256 {
    let start = starting_target();
    if timestamps.len() < 2 {
        return start;
    }

    let first = timestamps[0];
    let last = timestamps[timestamps.len() - 1];
    let expected = BLOCK_TIME_MS * (timestamps.len() as u64 - 1);
    let span = last.saturating_sub(first).clamp(expected / 4, expected * 4);

    let per_ms = start / U256::from(expected);
    let scaled = per_ms
        .checked_mul(U256::from(span))
        .unwrap_or_else(U256::max_value);
    scaled.min(start)
}

/// Interpret a lowercase-hex block hash as a big-endian integer and compare
/// it against a target.
pub fn hash_meets_target(hash_hex: &str, target: &U256) -> bool {
    match U256::from_str_radix(hash_hex, 16) {
        Ok(value) => value <= *target,
        Err(_) => false,
    }
}

/// Check a token name: 1 to 19 uppercase ASCII letters, and not the reserved
/// native ticker (case-insensitively).
pub fn token_name_valid(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 19
        && name.bytes().all(|b| b.is_ascii_uppercase())
        && !name.eq_ignore_ascii_case(RESERVED_TOKEN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reward_halving() {
        assert_eq!(reward(0), INITIAL_REWARD);
        assert_eq!(reward(HALVING_INTERVAL - 1), INITIAL_REWARD);
        assert_eq!(reward(HALVING_INTERVAL), INITIAL_REWARD / 2);
        assert_eq!(reward(HALVING_INTERVAL * 3), INITIAL_REWARD / 8);
        // Reward stays constant after the final halving.
        assert_eq!(
            reward(HALVING_INTERVAL * (MAX_HALVINGS + 5)),
            INITIAL_REWARD >> MAX_HALVINGS
        );
    }

    #[test]
    fn test_reward_split_conserves() {
        for h in [0, 1, HALVING_INTERVAL, HALVING_INTERVAL * 7] {
            let r = reward(h);
            assert_eq!(dev_cut(r) + miner_share(r), r);
        }
    }

    #[test]
    fn test_mint_fee_grows() {
        assert_eq!(mint_fee(0, 0), MINT_FEE_BASE);
        assert_eq!(mint_fee(0, 1), 2 * MINT_FEE_BASE);
        assert!(mint_fee(10, 5) > mint_fee(10, 4));
    }

    #[test]
    fn test_target_hex_roundtrip() {
        let t = starting_target();
        assert_eq!(target_hex(&t), STARTING_DIFF);
        assert_eq!(U256::from_str_radix(&target_hex(&t), 16).unwrap(), t);
    }

    #[test]
    fn test_target_for_short_tail_is_starting() {
        assert_eq!(target_for_tail(&[]), starting_target());
        assert_eq!(target_for_tail(&[1_000]), starting_target());
    }

    #[test]
    fn test_target_shrinks_when_blocks_are_fast() {
        // Ten blocks spaced at half the nominal interval.
        let timestamps: Vec<u64> = (0..10).map(|i| i * BLOCK_TIME_MS / 2).collect();
        let t = target_for_tail(&timestamps);
        assert!(t < starting_target());
    }

    #[test]
    fn test_target_capped_at_starting() {
        // Blocks far slower than nominal cannot push the target above the cap.
        let timestamps: Vec<u64> = (0..10).map(|i| i * BLOCK_TIME_MS * 10).collect();
        assert_eq!(target_for_tail(&timestamps), starting_target());
    }

    #[test]
    fn test_hash_meets_target() {
        let t = starting_target();
        assert!(hash_meets_target(&"00".repeat(32), &t));
        assert!(hash_meets_target(STARTING_DIFF, &t));
        assert!(!hash_meets_target(&"ff".repeat(32), &t));
        assert!(!hash_meets_target("zz", &t));
    }

    #[test]
    fn test_token_names() {
        assert!(token_name_valid("FOO"));
        assert!(token_name_valid("A"));
        assert!(token_name_valid(&"Z".repeat(19)));
        assert!(!token_name_valid(""));
        assert!(!token_name_valid(&"Z".repeat(20)));
        assert!(!token_name_valid("foo"));
        assert!(!token_name_valid("FOO1"));
        assert!(!token_name_valid("FLSS"));
        assert!(!token_name_valid("flss"));
    }
}
