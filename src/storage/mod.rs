//! Storage module - UTXO snapshots and the persistent reward store

mod utxo;
pub mod db;

pub use utxo::*;
pub use db::{RewardDB, StoreError};
