//! Circulating supply estimation
//!
//! Folds a point-in-time UTXO snapshot into a weighted circulating supply.
//! Burned coins and masternode collateral are left out entirely, and every
//! other coin is weighted by its age: 100% up to 3 months old, 0% from 12
//! months on, linear in between.

use crate::constants::{FULL_WEIGHT_MONTHS, SUPPLY_WEIGHT_SCALE, ZERO_WEIGHT_MONTHS};
use crate::consensus::RewardError;
use crate::crypto::{decode_address, extract_destination, KEY_HASH_LEN};
use crate::storage::{CursorError, UTXOKey, UTXO};
use crate::Amount;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Age weight in percent of a coin `age_blocks` old
///
/// The slope is computed at a fixed-point scale of 10^8 and truncated before
/// it is applied, exactly as the consensus formula does.
pub fn supply_weight(age_blocks: i64, blocks_per_month: i64) -> i64 {
    let full = 100 * SUPPLY_WEIGHT_SCALE as i128;
    let span = ((ZERO_WEIGHT_MONTHS - FULL_WEIGHT_MONTHS) * blocks_per_month.max(1)) as i128;
    let slope = full / span;
    let offset = age_blocks as i128 - (FULL_WEIGHT_MONTHS * blocks_per_month) as i128;

    let weight = (full - slope * offset) / SUPPLY_WEIGHT_SCALE as i128;
    weight.clamp(0, 100) as i64
}

/// Estimate the circulating supply at `height` from a UTXO snapshot cursor
///
/// A cursor error aborts the scan: a partial fold is never a valid input to
/// the adjustment formula.
pub fn estimate_circulating_supply<I>(
    cursor: I,
    height: u64,
    collateral_now: Amount,
    collateral_next_week: Amount,
    burn_addresses: &BTreeMap<String, u64>,
    blocks_per_month: u64,
) -> Result<Amount, RewardError>
where
    I: IntoIterator<Item = Result<(UTXOKey, UTXO), CursorError>>,
{
    // Addresses that do not decode can never equal an encoded destination
    let burned: HashMap<[u8; KEY_HASH_LEN], u64> = burn_addresses
        .iter()
        .filter_map(|(address, start)| decode_address(address).ok().map(|kh| (kh, *start)))
        .collect();

    let blocks_per_month = i64::try_from(blocks_per_month)
        .map_err(|_| RewardError::InvalidParameter("blocks per month out of range"))?;

    let mut circulating: Amount = 0;
    let mut scanned = 0u64;
    let mut skipped_burned = 0u64;
    let mut skipped_collateral = 0u64;

    for item in cursor {
        let (_, coin) = item?;
        scanned += 1;

        let is_burned = extract_destination(&coin.script_pubkey)
            .and_then(|key_hash| burned.get(&key_hash))
            .map_or(false, |start| *start < height);
        if is_burned {
            skipped_burned += 1;
            continue;
        }

        if coin.amount == collateral_now || coin.amount == collateral_next_week {
            skipped_collateral += 1;
            continue;
        }

        let age_blocks = height as i64 - coin.height as i64;
        let weight = supply_weight(age_blocks, blocks_per_month);
        let weighted = coin.amount as i128 * weight as i128 / 100;

        circulating = i64::try_from(weighted)
            .ok()
            .and_then(|w| circulating.checked_add(w))
            .ok_or(RewardError::Overflow("circulating supply"))?;
    }

    debug!(
        height,
        scanned,
        skipped_burned,
        skipped_collateral,
        circulating,
        "circulating supply scan complete"
    );

    Ok(circulating)
}
