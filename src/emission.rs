//! Block-reward, supply, and fee arithmetic. Pure functions over block
//! height; no I/O, no shared state, trivially thread-safe.

/// Hard cap on total coin supply, in whole coins.
pub const MAX_SUPPLY: u64 = 21_000_000;
/// Base units per coin.
pub const SATS_PER_COIN: u64 = 100_000_000;
/// Block reward at height 0, in satoshis.
pub const INITIAL_REWARD: u64 = 50 * SATS_PER_COIN;
/// Blocks between halvings.
pub const HALVING_INTERVAL: u64 = 210_000;
/// Number of halvings before the reward reaches zero.
pub const MAX_HALVINGS: u64 = 64;
/// Target seconds between blocks.
pub const TARGET_BLOCK_SECONDS: u64 = 600;
/// Blocks between difficulty retargets.
pub const DIFFICULTY_RETARGET_BLOCKS: u64 = 2_016;
/// Genesis bootstrap amount, in satoshis (spec §4.2: height 0 contributes
/// one coin outside the halving schedule).
const GENESIS_BOOTSTRAP: u64 = SATS_PER_COIN;

/// Block subsidy at `height`, per the halving schedule. Zero once
/// `height / HALVING_INTERVAL` reaches `MAX_HALVINGS`.
pub fn reward(height: u64) -> u64 {
    let era = height / HALVING_INTERVAL;
    if era >= MAX_HALVINGS {
        0
    } else {
        INITIAL_REWARD >> era
    }
}

/// Cumulative supply emitted through and including `height`.
///
/// Height 0 (genesis) contributes a one-coin bootstrap outside the halving
/// schedule. For `h >= 1` the sum walks eras from height 1 to `h`, adding
/// `blocks_in_era * reward(era_start)` per era, matching the reference
/// intent: `bootstrap + sum(reward(h_i) for h_i in 1..=h)`.
pub fn total_supply(height: u64) -> u64 {
    if height == 0 {
        return GENESIS_BOOTSTRAP;
    }

    let mut total = GENESIS_BOOTSTRAP;
    let mut h = 1u64;
    while h <= height {
        let era = h / HALVING_INTERVAL;
        let era_start = era * HALVING_INTERVAL;
        let era_end = era_start.saturating_add(HALVING_INTERVAL) - 1;
        let last_in_range = era_end.min(height);
        let blocks_in_era = last_in_range - h + 1;

        let era_reward = reward(h);
        let added = blocks_in_era.saturating_mul(era_reward);
        total = total
            .checked_add(added)
            .expect("total_supply: overflow impossible within MAX_HALVINGS");

        h = last_in_range + 1;
    }

    debug_assert!(total <= MAX_SUPPLY * SATS_PER_COIN);
    total
}

/// Transaction fee, in satoshis, for a given serialized size and priority.
pub fn fee(size_bytes: usize, priority: u64) -> u64 {
    let kib = size_bytes.div_ceil(1024) as u64;
    1_000 + 100 * kib + priority
}

/// Validates a claimed block reward against the schedule.
pub fn validate_reward(height: u64, claimed: u64) -> crate::error::Result<()> {
    let expected = reward(height);
    if claimed == expected {
        Ok(())
    } else {
        Err(crate::error::ShadowyError::Validation {
            validator_name: "RewardSchedule".to_string(),
            cause: format!("height {height}: expected reward {expected}, got {claimed}"),
        })
    }
}

/// Annualized inflation at `height`, as a percentage, looking one year
/// (52 560 blocks) ahead.
pub fn inflation(height: u64) -> f64 {
    const BLOCKS_PER_YEAR: u64 = 52_560;
    let now = total_supply(height);
    let later = total_supply(height + BLOCKS_PER_YEAR);
    if now == 0 {
        return 0.0;
    }
    ((later - now) as f64 / now as f64) * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reward_halves_on_schedule() {
        assert_eq!(reward(0), 50 * SATS_PER_COIN);
        assert_eq!(reward(209_999), 50 * SATS_PER_COIN);
        assert_eq!(reward(210_000), 25 * SATS_PER_COIN);
        // INITIAL_REWARD >> era reaches zero once era > 32 (5e9 >> 32 == 1).
        assert_eq!(reward(210_000 * 32), 1);
        assert_eq!(reward(210_000 * 33), 0);
    }

    #[test]
    fn reward_is_zero_past_max_halvings() {
        assert_eq!(reward(HALVING_INTERVAL * MAX_HALVINGS), 0);
        assert_eq!(reward(HALVING_INTERVAL * MAX_HALVINGS + 1_000_000), 0);
    }

    #[test]
    fn total_supply_matches_concrete_scenarios() {
        assert_eq!(reward(0), 5_000_000_000);
        assert_eq!(total_supply(0), 100_000_000);
        assert_eq!(total_supply(1), 5_100_000_000);
    }

    #[test]
    fn total_supply_never_exceeds_cap() {
        let h = HALVING_INTERVAL * MAX_HALVINGS + 10;
        assert!(total_supply(h) <= MAX_SUPPLY * SATS_PER_COIN);
    }

    #[test]
    fn fee_matches_boundary_cases() {
        assert_eq!(fee(0, 0), 1_000);
        assert_eq!(fee(1024, 0), 1_100);
        assert_eq!(fee(1025, 0), 1_200);
    }

    #[test]
    fn validate_reward_rejects_wrong_claim() {
        assert!(validate_reward(0, reward(0)).is_ok());
        assert!(validate_reward(0, reward(0) + 1).is_err());
    }
}
