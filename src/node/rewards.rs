//! Dynamic rewards engine
//!
//! Hooks the reward policy into block connection and disconnection and
//! answers "what is the subsidy at height H".
//!
//! Connect and disconnect run on the single validation path and are
//! serialized by `connect_lock`. Lookups share the store's read lock and only
//! ever wait for the short write of a record, never for a UTXO scan.

use crate::consensus::{
    compute_adjustment, epoch_height, estimate_circulating_supply, is_epoch_height,
    static_block_value, ChainParams, RewardError,
};
use crate::format_money;
use crate::node::{SporkId, SporkSource, SyncStatus};
use crate::storage::{CoinsView, RewardDB, StoreError};
use crate::Amount;
use parking_lot::{Mutex, RwLock};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Reward engine errors
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Reward(#[from] RewardError),
}

/// Fields of a block index entry the engine reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockIndex {
    pub height: u64,
    /// Total money supply after this block
    pub money_supply: Amount,
}

/// Computes, stores, and serves the dynamic block rewards
pub struct RewardEngine {
    params: ChainParams,
    sporks: Arc<dyn SporkSource>,
    sync: Arc<dyn SyncStatus>,
    store: RwLock<Option<RewardDB>>,
    connect_lock: Mutex<()>,
}

impl RewardEngine {
    /// Location of the reward database inside a node data directory
    pub fn reward_db_path(data_dir: &Path) -> PathBuf {
        data_dir.join("chainstate").join("rewards.db")
    }

    /// Open the reward database and load every record
    ///
    /// A failure here means the reward ledger cannot be trusted and the node
    /// must not start.
    pub fn init(
        params: ChainParams,
        data_dir: &Path,
        reindex: bool,
        sporks: Arc<dyn SporkSource>,
        sync: Arc<dyn SyncStatus>,
    ) -> Result<Self, EngineError> {
        params.validate()?;

        let db = RewardDB::open(
            Self::reward_db_path(data_dir),
            reindex,
            params.reward_adjustment_interval,
        )?;
        info!(records = db.len(), reindex, "Reward engine initialized");

        Ok(Self {
            params,
            sporks,
            sync,
            store: RwLock::new(Some(db)),
            connect_lock: Mutex::new(()),
        })
    }

    /// Flush and close the reward database. Safe to call more than once.
    pub fn shutdown(&self) -> Result<(), EngineError> {
        let _guard = self.connect_lock.lock();
        let db = self.store.write().take();
        if let Some(db) = db {
            db.shutdown()?;
            info!("Reward database closed");
        }
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.store.read().is_some()
    }

    pub fn params(&self) -> &ChainParams {
        &self.params
    }

    /// Snapshot of the stored records in height order
    pub fn records(&self) -> Vec<(u64, Amount)> {
        self.store
            .read()
            .as_ref()
            .map(|db| db.iter().collect())
            .unwrap_or_default()
    }

    /// Record the epoch subsidy when a block is connected
    pub fn on_connect<V>(
        &self,
        index: &BlockIndex,
        base_subsidy: Amount,
        coins: &V,
    ) -> Result<(), EngineError>
    where
        V: CoinsView + ?Sized,
    {
        let _guard = self.connect_lock.lock();
        let height = index.height;

        if !self.params.dynamic_rewards_active(height) {
            return Ok(());
        }

        let interval = self.params.reward_adjustment_interval;
        let synced = self.sync.is_synced();
        let mut new_subsidy: Amount = 0;

        if synced && is_epoch_height(height, interval) {
            new_subsidy = self.compute_epoch_subsidy(index, base_subsidy, coins)?;
            if new_subsidy <= 0 {
                warn!(
                    height,
                    new_subsidy,
                    "Non-positive dynamic reward discarded, keeping the previous value"
                );
            }
        }

        // A syncing node takes the subsidy of the block after the boundary
        let after_boundary = height
            .checked_sub(1)
            .map_or(false, |prev| is_epoch_height(prev, interval));
        if !synced && after_boundary {
            new_subsidy = base_subsidy;
        }

        if new_subsidy > 0 {
            let epoch = epoch_height(height, interval);
            let mut store = self.store.write();
            let db = store.as_mut().ok_or(StoreError::Closed)?;

            if let Err(err) = db.put(epoch, new_subsidy) {
                error!(
                    epoch_height = epoch,
                    amount = %format_money(new_subsidy),
                    error = %err,
                    "Failed to store dynamic reward"
                );
                return Err(err.into());
            }
            debug!(epoch_height = epoch, amount = %format_money(new_subsidy), "Stored dynamic reward");
        }

        Ok(())
    }

    /// Drop the epoch record when its boundary block is disconnected
    pub fn on_disconnect(&self, index: &BlockIndex) -> Result<(), EngineError> {
        let _guard = self.connect_lock.lock();
        let height = index.height;

        if !self.params.dynamic_rewards_active(height)
            || !is_epoch_height(height, self.params.reward_adjustment_interval)
        {
            return Ok(());
        }

        let mut store = self.store.write();
        let db = store.as_mut().ok_or(StoreError::Closed)?;

        match db.remove(height) {
            Ok(Some(amount)) => {
                debug!(epoch_height = height, amount = %format_money(amount), "Removed dynamic reward");
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(err) => {
                error!(epoch_height = height, error = %err, "Failed to remove dynamic reward");
                Err(err.into())
            }
        }
    }

    /// Subsidy paid by the block at `height`
    ///
    /// Never fails: without a usable record the static schedule applies.
    pub fn get_block_value(&self, height: u64) -> Amount {
        let interval = self.params.reward_adjustment_interval;
        let synced = self.sync.is_synced();
        let mut height = height;

        loop {
            let value = static_block_value(height);

            if !synced || !self.params.dynamic_rewards_active(height) {
                return value;
            }

            // A boundary block still pays the previous epoch's rate
            if is_epoch_height(height, interval) {
                match height.checked_sub(1) {
                    Some(prev) => {
                        height = prev;
                        continue;
                    }
                    None => return value,
                }
            }

            let record = self
                .store
                .read()
                .as_ref()
                .and_then(|db| db.lookup(epoch_height(height, interval)));

            return match record {
                Some(reward) => value.min(reward),
                None => value,
            };
        }
    }

    /// Run the supply scan and the adjustment formula for a boundary block
    fn compute_epoch_subsidy<V>(
        &self,
        index: &BlockIndex,
        base_subsidy: Amount,
        coins: &V,
    ) -> Result<Amount, EngineError>
    where
        V: CoinsView + ?Sized,
    {
        let params = &self.params;
        let height = index.height;

        let collateral_now = params.masternode_collateral(height);
        let collateral_next_week =
            params.masternode_collateral(height.saturating_add(params.blocks_per_week()));

        let circulating_supply = estimate_circulating_supply(
            coins.cursor(),
            height,
            collateral_now,
            collateral_next_week,
            &params.burn_addresses,
            params.blocks_per_month(),
        )?;

        let total_spork = SporkId::TotalSupplyTargetEmission;
        let circulating_spork = SporkId::CirculatingSupplyTargetEmission;
        let total_rate = self.sporks.spork_value(total_spork);
        let circulating_rate = self.sporks.spork_value(circulating_spork);

        let interval = i64::try_from(params.reward_adjustment_interval)
            .map_err(|_| RewardError::InvalidParameter("reward adjustment interval out of range"))?;
        let blocks_per_day = i64::try_from(params.blocks_per_day())
            .map_err(|_| RewardError::InvalidParameter("blocks per day out of range"))?;

        let adjustment = compute_adjustment(
            base_subsidy,
            index.money_supply,
            circulating_supply,
            total_rate,
            circulating_rate,
            interval,
            blocks_per_day,
        )?;

        debug!(
            height,
            money_supply = %format_money(index.money_supply),
            circulating_supply = %format_money(circulating_supply),
            interval,
            total_spork = total_spork.id(),
            total_rate,
            circulating_spork = circulating_spork.id(),
            circulating_rate,
            actual_emission = %format_money(adjustment.actual_emission),
            supply_target_emission = %format_money(adjustment.supply_target_emission),
            circulating_target_emission = %format_money(adjustment.circulating_target_emission),
            delta = %format_money(adjustment.delta),
            ratio = adjustment.ratio,
            damped_delta = %format_money(adjustment.damped_delta),
            "Dynamic reward inputs"
        );
        info!(
            height,
            from = %format_money(base_subsidy),
            to = %format_money(adjustment.new_subsidy),
            "Dynamic reward adjustment"
        );

        Ok(adjustment.new_subsidy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::COIN;
    use crate::crypto::{hash_bytes, p2pkh_script};
    use crate::node::StaticSporks;
    use crate::storage::{UTXOSet, UTXO};
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::TempDir;

    fn test_params() -> ChainParams {
        ChainParams {
            target_spacing: 60,
            reward_adjustment_interval: 1000,
            dynamic_rewards_height: Some(1000),
            burn_addresses: Default::default(),
            collateral_schedule: vec![(0, 10_000 * COIN)],
        }
    }

    fn open(dir: &TempDir, synced: bool) -> (RewardEngine, Arc<AtomicBool>) {
        let sync = Arc::new(AtomicBool::new(synced));
        let engine = RewardEngine::init(
            test_params(),
            dir.path(),
            false,
            Arc::new(StaticSporks::new()),
            sync.clone(),
        )
        .unwrap();
        (engine, sync)
    }

    fn coins(circulating: Amount, height: u64) -> UTXOSet {
        let mut set = UTXOSet::new();
        set.add(
            hash_bytes(b"circulating"),
            0,
            UTXO {
                amount: circulating,
                script_pubkey: p2pkh_script(&[1u8; 20]),
                height,
            },
        );
        set
    }

    fn block(height: u64) -> BlockIndex {
        BlockIndex {
            height,
            money_supply: 100_000_000 * COIN,
        }
    }

    #[test]
    fn test_boundary_connect_stores_adjustment() {
        let dir = TempDir::new().unwrap();
        let (engine, _) = open(&dir, true);

        engine
            .on_connect(&block(2000), 800 * COIN, &coins(40_000_000 * COIN, 2000))
            .unwrap();

        assert_eq!(engine.records(), vec![(2000, 79_200_000_952)]);
        assert_eq!(engine.get_block_value(2001), 79_200_000_952);
        assert_eq!(engine.get_block_value(2999), 79_200_000_952);
    }

    #[test]
    fn test_boundary_block_pays_previous_rate() {
        let dir = TempDir::new().unwrap();
        let (engine, _) = open(&dir, true);

        engine
            .on_connect(&block(2000), 800 * COIN, &coins(40_000_000 * COIN, 2000))
            .unwrap();

        assert_eq!(engine.get_block_value(2000), engine.get_block_value(1999));
        assert_eq!(engine.get_block_value(2000), 800 * COIN);
    }

    #[test]
    fn test_non_boundary_connect_is_noop() {
        let dir = TempDir::new().unwrap();
        let (engine, _) = open(&dir, true);

        engine
            .on_connect(&block(2001), 800 * COIN, &coins(40_000_000 * COIN, 2000))
            .unwrap();
        assert!(engine.records().is_empty());
    }

    #[test]
    fn test_inactive_policy_is_noop() {
        let dir = TempDir::new().unwrap();
        let (engine, _) = open(&dir, true);

        engine
            .on_connect(&block(0), 800 * COIN, &coins(40_000_000 * COIN, 0))
            .unwrap();
        assert!(engine.records().is_empty());
        assert_eq!(engine.get_block_value(500), 800 * COIN);
        assert_eq!(engine.get_block_value(1), 600_000_000 * COIN);
    }

    #[test]
    fn test_syncing_node_adopts_base_subsidy() {
        let dir = TempDir::new().unwrap();
        let (engine, sync) = open(&dir, false);

        // the boundary itself is skipped while syncing
        engine
            .on_connect(&block(3000), 800 * COIN, &coins(40_000_000 * COIN, 3000))
            .unwrap();
        assert!(engine.records().is_empty());

        engine
            .on_connect(&block(3001), 700 * COIN, &UTXOSet::new())
            .unwrap();
        assert_eq!(engine.records(), vec![(3000, 700 * COIN)]);

        // lookups ignore records until synced
        assert_eq!(engine.get_block_value(3500), 800 * COIN);
        sync.store(true, Ordering::Release);
        assert_eq!(engine.get_block_value(3500), 700 * COIN);
    }

    #[test]
    fn test_record_never_exceeds_static_ceiling() {
        let dir = TempDir::new().unwrap();
        let (engine, sync) = open(&dir, false);

        engine
            .on_connect(&block(4001), 900 * COIN, &UTXOSet::new())
            .unwrap();
        sync.store(true, Ordering::Release);
        assert_eq!(engine.get_block_value(4002), 800 * COIN);
    }

    #[test]
    fn test_disconnect_removes_epoch_record() {
        let dir = TempDir::new().unwrap();
        let (engine, _) = open(&dir, true);
        let utxos = coins(40_000_000 * COIN, 2000);

        engine.on_connect(&block(2000), 800 * COIN, &utxos).unwrap();
        engine.on_disconnect(&block(2001)).unwrap();
        assert_eq!(engine.records().len(), 1);

        engine.on_disconnect(&block(2000)).unwrap();
        assert!(engine.records().is_empty());
        assert_eq!(engine.get_block_value(2001), 800 * COIN);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let (engine, _) = open(&dir, true);

        engine.shutdown().unwrap();
        engine.shutdown().unwrap();
        assert!(!engine.is_open());

        assert_eq!(engine.get_block_value(2500), 800 * COIN);
        let err = engine
            .on_connect(&block(2000), 800 * COIN, &coins(40_000_000 * COIN, 2000))
            .unwrap_err();
        assert!(matches!(err, EngineError::Store(StoreError::Closed)));
    }

    #[test]
    fn test_invalid_params_abort_init() {
        for interval in [0, 1] {
            let dir = TempDir::new().unwrap();
            let params = ChainParams {
                reward_adjustment_interval: interval,
                dynamic_rewards_height: Some(0),
                ..test_params()
            };
            let result = RewardEngine::init(
                params,
                dir.path(),
                false,
                Arc::new(StaticSporks::new()),
                Arc::new(AtomicBool::new(true)),
            );
            assert!(matches!(result, Err(EngineError::Reward(RewardError::InvalidParameter(_)))));
        }
    }
}
