//! Governance inputs consumed by the reward engine
//!
//! Spork values are broadcast and agreed on by the network outside of this
//! crate. The engine only ever reads them, once per epoch boundary.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// Governance values read by the reward adjustment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SporkId {
    /// Target yearly emission relative to the total money supply
    TotalSupplyTargetEmission,
    /// Target yearly emission relative to the circulating supply
    CirculatingSupplyTargetEmission,
}

impl SporkId {
    /// Network identifier of the spork
    pub fn id(&self) -> u32 {
        match self {
            SporkId::TotalSupplyTargetEmission => 116,
            SporkId::CirculatingSupplyTargetEmission => 117,
        }
    }

    /// Value in force until the network broadcasts another one
    pub fn default_value(&self) -> i64 {
        match self {
            SporkId::TotalSupplyTargetEmission => 5,
            SporkId::CirculatingSupplyTargetEmission => 8,
        }
    }
}

/// Read-only governance lookup
pub trait SporkSource: Send + Sync {
    fn spork_value(&self, spork: SporkId) -> i64;
}

/// Whether the node has caught up with the network
pub trait SyncStatus: Send + Sync {
    fn is_synced(&self) -> bool;
}

impl SyncStatus for AtomicBool {
    fn is_synced(&self) -> bool {
        self.load(Ordering::Acquire)
    }
}

/// In-memory spork table, falling back to defaults
#[derive(Debug, Default)]
pub struct StaticSporks {
    values: RwLock<HashMap<SporkId, i64>>,
}

impl StaticSporks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a value received from the network
    pub fn set(&self, spork: SporkId, value: i64) {
        self.values.write().insert(spork, value);
    }
}

impl SporkSource for StaticSporks {
    fn spork_value(&self, spork: SporkId) -> i64 {
        self.values
            .read()
            .get(&spork)
            .copied()
            .unwrap_or_else(|| spork.default_value())
    }
}
