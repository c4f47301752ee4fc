//! ROHO (RH) Dynamic Rewards Library
//!
//! Computes and durably tracks the per-block subsidy under the dynamic
//! rewards policy: every adjustment interval the subsidy is re-derived from
//! the circulating supply and the governance emission targets, then stored
//! so that every node agrees on the subsidy at every height, across reorgs
//! and restarts.
//!
//! RH is the short form used in addresses, logos, and protocol identifiers.

pub mod consensus;
pub mod crypto;
pub mod storage;
pub mod node;

/// Signed coin amount in base units (8 decimal places)
pub type Amount = i64;

/// Protocol constants - HARD-CODED, NEVER CONFIGURABLE
pub mod constants {
    use crate::Amount;

    /// One RH coin in base units
    pub const COIN: Amount = 100_000_000;

    /// Chain name (short form for addresses/logos)
    pub const CHAIN_NAME: &str = "RH";

    /// One-time issuance paid by block 1
    pub const PREMINE_REWARD: Amount = 600_000_000 * COIN;

    /// Static reward for every block above height 1 (the dynamic ceiling)
    pub const BASELINE_REWARD: Amount = 800 * COIN;

    pub const DAY_IN_SECONDS: u64 = 24 * 60 * 60;
    pub const WEEK_IN_SECONDS: u64 = 7 * DAY_IN_SECONDS;
    pub const MONTH_IN_SECONDS: u64 = 30 * DAY_IN_SECONDS;

    /// Days per year used by the target emission formulas
    pub const DAYS_PER_YEAR: i64 = 365;

    /// Divisor applied to the per-block supply before the emission rate
    pub const EMISSION_RATE_DIVISOR: i64 = 1_000_000;

    /// Fixed-point scale of the UTXO age weight
    pub const SUPPLY_WEIGHT_SCALE: i64 = 100_000_000;

    /// Coins this many months old (or younger) count in full
    pub const FULL_WEIGHT_MONTHS: i64 = 3;

    /// Coins this many months old (or older) do not count at all
    pub const ZERO_WEIGHT_MONTHS: i64 = 12;
}

/// Format an amount the way log lines show money: "800.00", "0.0125"
pub fn format_money(amount: Amount) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.unsigned_abs();
    let coin = constants::COIN.unsigned_abs();

    let mut frac = format!("{:08}", abs % coin);
    while frac.len() > 2 && frac.ends_with('0') {
        frac.pop();
    }

    format!("{}{}.{}", sign, abs / coin, frac)
}
