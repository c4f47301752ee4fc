//! Property-based tests for the dynamic rewards engine
//!
//! These tests verify invariants hold under random inputs.

use proptest::prelude::*;
use rh_rewards::consensus::{
    compute_adjustment, damping_factor, epoch_height, is_epoch_height, reward_epoch,
    static_block_value, supply_weight, ChainParams,
};
use rh_rewards::constants::COIN;
use rh_rewards::node::{BlockIndex, RewardEngine, StaticSporks};
use rh_rewards::storage::UTXOSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

const MONTH: i64 = 43_200;

// ============================================================================
// PURE FUNCTIONS
// ============================================================================

proptest! {
    /// The epoch start never lies after the height and is its own epoch start
    #[test]
    fn prop_epoch_arithmetic(
        height in 0u64..u64::MAX / 2,
        interval in 1u64..1_000_000u64
    ) {
        let start = epoch_height(height, interval);

        prop_assert!(start <= height);
        prop_assert_eq!(reward_epoch(start, interval), reward_epoch(height, interval));
        prop_assert_eq!(epoch_height(start, interval), start);
        prop_assert!(is_epoch_height(start, interval));
        prop_assert!(height - start < interval);
    }

    /// Damping keeps between 0% and 10% of the delta over the valid ratio range
    #[test]
    fn prop_damping_within_bounds(ratio in 0i64..=100) {
        let factor = damping_factor(ratio);
        prop_assert!((0..=10).contains(&factor));
        prop_assert!(damping_factor(ratio + 1) <= factor);
    }

    /// Over-emission lowers the subsidy by at most a tenth per epoch
    #[test]
    fn prop_single_epoch_cut_is_bounded(
        base in 1i64..=1_000 * COIN,
        money_supply in 0i64..=100_000_000 * COIN,
        circulating_pct in 0i64..=100,
        total_rate in 0i64..=20,
        circulating_rate in 0i64..=20,
        interval in 1i64..=20_000
    ) {
        let circulating = money_supply / 100 * circulating_pct;
        let adjustment = compute_adjustment(
            base, money_supply, circulating, total_rate, circulating_rate, interval, 1440,
        ).unwrap();

        prop_assume!(adjustment.delta >= 0);
        prop_assert!(adjustment.new_subsidy <= base);
        prop_assert!(adjustment.new_subsidy >= base - base / 10);
        prop_assert!(adjustment.new_subsidy > 0);
    }

    /// Older coins never weigh more than younger ones
    #[test]
    fn prop_weight_decreases_with_age(age in 0i64..20 * MONTH, step in 1i64..MONTH) {
        let young = supply_weight(age, MONTH);
        let old = supply_weight(age + step, MONTH);

        prop_assert!((0..=100).contains(&young));
        prop_assert!(old <= young);
    }

    /// Coins up to 3 months count fully, from 12 months not at all
    #[test]
    fn prop_weight_plateaus(young in 0i64..=3 * MONTH, old in 12 * MONTH..100 * MONTH) {
        prop_assert_eq!(supply_weight(young, MONTH), 100);
        prop_assert_eq!(supply_weight(old, MONTH), 0);
    }
}

// ============================================================================
// ENGINE LOOKUPS
// ============================================================================

const INTERVAL: u64 = 100;

fn params() -> ChainParams {
    ChainParams {
        reward_adjustment_interval: INTERVAL,
        dynamic_rewards_height: Some(INTERVAL),
        ..ChainParams::default()
    }
}

/// Engine whose epochs carry the given subsidies, recorded by a syncing node
fn engine_with_records(dir: &TempDir, subsidies: &[i64]) -> RewardEngine {
    let sync = Arc::new(AtomicBool::new(false));
    let engine = RewardEngine::init(
        params(),
        dir.path(),
        false,
        Arc::new(StaticSporks::new()),
        sync.clone(),
    )
    .unwrap();

    for (i, subsidy) in subsidies.iter().enumerate() {
        let height = (i as u64 + 1) * INTERVAL + 1;
        let index = BlockIndex { height, money_supply: 0 };
        engine.on_connect(&index, *subsidy, &UTXOSet::new()).unwrap();
    }

    sync.store(true, Ordering::Release);
    engine
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// The dynamic rate can lower the static schedule but never raise it
    #[test]
    fn prop_block_value_under_static_ceiling(
        subsidies in prop::collection::vec(1i64..=2_000 * COIN, 1..8),
        height in 0u64..1_000
    ) {
        let dir = TempDir::new().unwrap();
        let engine = engine_with_records(&dir, &subsidies);

        prop_assert!(engine.get_block_value(height) <= static_block_value(height));
        engine.shutdown().unwrap();
    }

    /// Boundary blocks pay what the block before them pays
    #[test]
    fn prop_boundary_pays_previous_rate(
        subsidies in prop::collection::vec(1i64..=2_000 * COIN, 1..8),
        height in INTERVAL..1_000
    ) {
        let dir = TempDir::new().unwrap();
        let engine = engine_with_records(&dir, &subsidies);
        let boundary = epoch_height(height, INTERVAL);

        prop_assert_eq!(
            engine.get_block_value(boundary),
            engine.get_block_value(boundary - 1)
        );
        engine.shutdown().unwrap();
    }
}
