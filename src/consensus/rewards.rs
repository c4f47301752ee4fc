//! Block reward calculation
//! 
//! The static schedule is the ceiling for every height. Under the dynamic
//! rewards policy the subsidy of each epoch is re-derived at its boundary
//! from the actual emission versus the governance emission targets, damped so
//! that a single epoch never overcorrects.
//!
//! Everything here is integer arithmetic with truncating division, in the
//! exact order of the consensus formula. Any divergence is a chain split.

use crate::constants::{BASELINE_REWARD, DAYS_PER_YEAR, EMISSION_RATE_DIVISOR, PREMINE_REWARD};
use crate::storage::CursorError;
use crate::Amount;
use thiserror::Error;

/// Reward computation errors
#[derive(Debug, Error)]
pub enum RewardError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(&'static str),
    #[error("Arithmetic overflow computing {0}")]
    Overflow(&'static str),
    #[error(transparent)]
    Cursor(#[from] CursorError),
}

/// Static reward schedule
///
/// Height 1 pays the one-time premine, every later height the baseline.
/// Genesis pays nothing.
pub fn static_block_value(height: u64) -> Amount {
    match height {
        0 => 0,
        1 => PREMINE_REWARD,
        _ => BASELINE_REWARD,
    }
}

/// Every intermediate of one epoch adjustment, kept for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Adjustment {
    pub actual_emission: Amount,
    pub supply_target_emission: Amount,
    pub circulating_target_emission: Amount,
    pub delta: Amount,
    pub ratio: i64,
    pub damped_delta: Amount,
    pub new_subsidy: Amount,
}

/// Damping factor in percent for a deviation ratio in percent
///
/// 0% deviation keeps 10% of the delta, 100% deviation keeps none.
pub fn damping_factor(ratio: i64) -> i64 {
    ratio.saturating_neg() / 10 + 10
}

/// Per-epoch target emission for a supply and an emission rate
fn target_emission(
    supply: Amount,
    rate: i64,
    interval: i64,
    blocks_per_day: i64,
) -> Result<Amount, RewardError> {
    let blocks_per_year = DAYS_PER_YEAR
        .checked_mul(blocks_per_day)
        .ok_or(RewardError::Overflow("blocks per year"))?;

    ((supply / blocks_per_year) / EMISSION_RATE_DIVISOR)
        .checked_mul(rate)
        .and_then(|v| v.checked_mul(interval))
        .ok_or(RewardError::Overflow("target emission"))
}

/// Compute the full adjustment for one epoch
pub fn compute_adjustment(
    base_subsidy: Amount,
    money_supply: Amount,
    circulating_supply: Amount,
    total_emission_rate: i64,
    circulating_emission_rate: i64,
    interval: i64,
    blocks_per_day: i64,
) -> Result<Adjustment, RewardError> {
    if interval <= 0 {
        return Err(RewardError::InvalidParameter("reward adjustment interval is zero"));
    }
    if blocks_per_day <= 0 {
        return Err(RewardError::InvalidParameter("blocks per day is zero"));
    }
    if base_subsidy == 0 {
        return Err(RewardError::InvalidParameter("base subsidy is zero"));
    }

    let actual_emission = base_subsidy
        .checked_mul(interval)
        .ok_or(RewardError::Overflow("actual emission"))?;
    let supply_target_emission =
        target_emission(money_supply, total_emission_rate, interval, blocks_per_day)?;
    let circulating_target_emission =
        target_emission(circulating_supply, circulating_emission_rate, interval, blocks_per_day)?;

    let delta = actual_emission
        .checked_sub(supply_target_emission.max(circulating_target_emission))
        .ok_or(RewardError::Overflow("delta"))?
        / interval;

    let ratio = delta
        .checked_mul(100)
        .ok_or(RewardError::Overflow("ratio"))?
        / base_subsidy;

    let damped_delta = delta
        .checked_mul(damping_factor(ratio))
        .ok_or(RewardError::Overflow("damped delta"))?
        / 100;

    let new_subsidy = base_subsidy
        .checked_sub(damped_delta)
        .ok_or(RewardError::Overflow("new subsidy"))?;

    Ok(Adjustment {
        actual_emission,
        supply_target_emission,
        circulating_target_emission,
        delta,
        ratio,
        damped_delta,
        new_subsidy,
    })
}

/// Compute the new epoch subsidy
///
/// Callers only adopt the result when it is positive.
pub fn compute_new_subsidy(
    base_subsidy: Amount,
    money_supply: Amount,
    circulating_supply: Amount,
    total_emission_rate: i64,
    circulating_emission_rate: i64,
    interval: i64,
    blocks_per_day: i64,
) -> Result<Amount, RewardError> {
    compute_adjustment(
        base_subsidy,
        money_supply,
        circulating_supply,
        total_emission_rate,
        circulating_emission_rate,
        interval,
        blocks_per_day,
    )
    .map(|adjustment| adjustment.new_subsidy)
}
