//! Reward database persistence layer using Sled
//!
//! Durable `epoch height -> subsidy` records with an in-memory mirror.
//! The whole tree is loaded into the mirror on open; every write is flushed
//! on its own so a crash loses at most the write in flight.
//!
//! Writes go to disk first and reach the mirror only once the flush has
//! succeeded, so a failed write leaves both sides on the previous state.

use crate::format_money;
use crate::Amount;
use serde::{Deserialize, Serialize};
use sled::{Db, Tree};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info};

const REWARDS_TREE: &str = "rewards";
const META_KEY: &str = "meta";

/// Bump when the row layout changes
const SCHEMA_VERSION: u32 = 1;

/// Reward store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to delete existing reward database {path}: {source}")]
    Wipe {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Can't open reward database {path}: {source}")]
    Open { path: PathBuf, source: sled::Error },
    #[error("Reward schema error: {0}")]
    Schema(sled::Error),
    #[error("Reward metadata encoding error: {0}")]
    Encoding(#[from] bincode::Error),
    #[error("Failed to read reward database: {0}")]
    Read(sled::Error),
    #[error("Failed to write reward {amount} for epoch {epoch_height}: {source}")]
    Write {
        epoch_height: u64,
        amount: Amount,
        source: sled::Error,
    },
    #[error("Failed to delete reward for epoch {epoch_height}: {source}")]
    Delete { epoch_height: u64, source: sled::Error },
    #[error("Failed to flush reward database on close: {0}")]
    Close(sled::Error),
    #[error("Corrupt reward record {key}: {reason}")]
    Corrupt { key: String, reason: &'static str },
    #[error("Reward database is closed")]
    Closed,
}

/// Layout metadata, checked on every open
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct StoreMeta {
    version: u32,
    reward_adjustment_interval: u64,
}

/// Persistent reward store plus its in-memory mirror
#[derive(Debug)]
pub struct RewardDB {
    db: Db,
    rewards_tree: Tree,
    cache: BTreeMap<u64, Amount>,
}

impl RewardDB {
    /// Open or create the reward database and load it into memory
    ///
    /// With `reindex` the existing database is deleted first. A missing
    /// database is fine, one that exists but cannot be deleted is not.
    pub fn open<P: AsRef<Path>>(
        path: P,
        reindex: bool,
        reward_adjustment_interval: u64,
    ) -> Result<Self, StoreError> {
        let path = path.as_ref();

        if reindex && path.exists() {
            wipe(path).map_err(|source| StoreError::Wipe {
                path: path.to_path_buf(),
                source,
            })?;
            info!(path = %path.display(), "Deleted existing reward database");
        }

        info!(path = %path.display(), "Opening reward database");
        let db = sled::open(path).map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        ensure_meta(&db, reward_adjustment_interval)?;
        let rewards_tree = db.open_tree(REWARDS_TREE).map_err(StoreError::Schema)?;

        let mut store = Self {
            db,
            rewards_tree,
            cache: BTreeMap::new(),
        };
        store.load()?;

        for (epoch_height, amount) in &store.cache {
            info!(epoch_height, amount = %format_money(*amount), "Loaded dynamic reward");
        }

        Ok(store)
    }

    /// Load every persisted record into the mirror
    fn load(&mut self) -> Result<(), StoreError> {
        let mut cache = BTreeMap::new();

        for item in self.rewards_tree.iter() {
            let (key, value) = item.map_err(StoreError::Read)?;
            let (epoch_height, amount) = decode_record(&key, &value)?;
            cache.insert(epoch_height, amount);
        }

        self.cache = cache;
        Ok(())
    }

    /// Insert or replace the record of an epoch
    pub fn put(&mut self, epoch_height: u64, amount: Amount) -> Result<(), StoreError> {
        self.commit(epoch_height, Some(amount), |db| db.flush())
            .map_err(|source| StoreError::Write {
                epoch_height,
                amount,
                source,
            })?;

        self.cache.insert(epoch_height, amount);
        Ok(())
    }

    /// Delete the record of an epoch, returning it if there was one
    pub fn remove(&mut self, epoch_height: u64) -> Result<Option<Amount>, StoreError> {
        self.commit(epoch_height, None, |db| db.flush())
            .map_err(|source| StoreError::Delete {
                epoch_height,
                source,
            })?;

        Ok(self.cache.remove(&epoch_height))
    }

    /// Set (`Some`) or clear (`None`) one row and make it durable
    ///
    /// If `flush` fails the row is put back to its previous value before the
    /// error is returned.
    fn commit<F>(&self, epoch_height: u64, amount: Option<Amount>, flush: F) -> sled::Result<()>
    where
        F: FnOnce(&Db) -> sled::Result<usize>,
    {
        let key = epoch_height.to_be_bytes();
        let previous = match amount {
            Some(amount) => self
                .rewards_tree
                .insert(key, amount.to_be_bytes().to_vec())?,
            None => self.rewards_tree.remove(key)?,
        };

        if let Err(err) = flush(&self.db) {
            let restored = match previous {
                Some(old) => self.rewards_tree.insert(key, old).map(|_| ()),
                None => self.rewards_tree.remove(key).map(|_| ()),
            };
            if let Err(rollback) = restored {
                error!(epoch_height, %rollback, "Failed to roll back reward record");
            }
            return Err(err);
        }

        Ok(())
    }

    /// Mirror lookup, never touches disk
    pub fn lookup(&self, epoch_height: u64) -> Option<Amount> {
        self.cache.get(&epoch_height).copied()
    }

    /// All records in height order
    pub fn iter(&self) -> impl Iterator<Item = (u64, Amount)> + '_ {
        self.cache.iter().map(|(h, a)| (*h, *a))
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Flush and close. Dropping the handle closes it as well.
    pub fn shutdown(self) -> Result<(), StoreError> {
        self.db.flush().map_err(StoreError::Close)?;
        Ok(())
    }
}

fn wipe(path: &Path) -> std::io::Result<()> {
    if path.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    }
}

/// Create the metadata row on first open, verify it afterwards
fn ensure_meta(db: &Db, reward_adjustment_interval: u64) -> Result<(), StoreError> {
    let expected = StoreMeta {
        version: SCHEMA_VERSION,
        reward_adjustment_interval,
    };

    match db.get(META_KEY).map_err(StoreError::Schema)? {
        Some(bytes) => {
            let found: StoreMeta =
                bincode::deserialize(&bytes).map_err(|_| StoreError::Corrupt {
                    key: META_KEY.to_string(),
                    reason: "undecodable metadata",
                })?;
            if found.version != expected.version {
                return Err(StoreError::Corrupt {
                    key: META_KEY.to_string(),
                    reason: "unknown schema version",
                });
            }
            if found.reward_adjustment_interval != expected.reward_adjustment_interval {
                return Err(StoreError::Corrupt {
                    key: META_KEY.to_string(),
                    reason: "reward adjustment interval changed",
                });
            }
        }
        None => {
            db.insert(META_KEY, bincode::serialize(&expected)?)
                .map_err(StoreError::Schema)?;
            db.flush().map_err(StoreError::Schema)?;
        }
    }

    Ok(())
}

fn decode_record(key: &[u8], value: &[u8]) -> Result<(u64, Amount), StoreError> {
    let corrupt = |reason| StoreError::Corrupt {
        key: hex::encode(key),
        reason,
    };

    let key: [u8; 8] = key.try_into().map_err(|_| corrupt("bad height length"))?;
    let value: [u8; 8] = value.try_into().map_err(|_| corrupt("bad amount length"))?;

    let amount = Amount::from_be_bytes(value);
    if amount <= 0 {
        return Err(corrupt("non-positive amount"));
    }

    Ok((u64::from_be_bytes(key), amount))
}
