//! UTXO snapshot access
//!
//! The reward engine never owns the UTXO set. It only walks a forward-only
//! cursor over it, once per epoch boundary. `UTXOSet` is the in-memory
//! implementation used by light deployments and tests.

use std::collections::BTreeMap;
use crate::crypto::Hash;
use crate::Amount;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Key for UTXO lookup: (tx_hash, output_index)
pub type UTXOKey = (Hash, u32);

/// One step of a UTXO cursor
pub type CursorItem = Result<(UTXOKey, UTXO), CursorError>;

/// Cursor errors
#[derive(Debug, Error)]
pub enum CursorError {
    #[error("UTXO cursor read failed: {0}")]
    Read(String),
}

/// UTXO set update errors
#[derive(Debug, Error)]
pub enum UTXOError {
    #[error("Spent output {0}:{1} is not in the set")]
    MissingOutput(Hash, u32),
}

/// Outputs removed by `UTXOSet::apply`, needed to revert it
pub type SpentOutputs = Vec<(UTXOKey, UTXO)>;

/// Unspent Transaction Output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UTXO {
    /// Amount in base units
    pub amount: Amount,
    /// Locking script of the output
    pub script_pubkey: Vec<u8>,
    /// Height at which this UTXO was created
    pub height: u64,
}

/// Read-only view of a UTXO set that can be scanned front to back
pub trait CoinsView {
    /// Lazy, finite, forward-only walk over every unspent output
    fn cursor(&self) -> Box<dyn Iterator<Item = CursorItem> + '_>;
}

/// Set of all unspent transaction outputs
#[derive(Debug, Default, Clone)]
pub struct UTXOSet {
    /// Map from (tx_hash, output_index) to UTXO
    utxos: BTreeMap<UTXOKey, UTXO>,
}

impl UTXOSet {
    pub fn new() -> Self {
        Self {
            utxos: BTreeMap::new(),
        }
    }

    /// Get a UTXO if it exists
    pub fn get(&self, tx_hash: &Hash, output_index: u32) -> Option<&UTXO> {
        self.utxos.get(&(*tx_hash, output_index))
    }

    /// Add a UTXO
    pub fn add(&mut self, tx_hash: Hash, output_index: u32, utxo: UTXO) {
        self.utxos.insert((tx_hash, output_index), utxo);
    }

    /// Remove a UTXO (when spent)
    pub fn remove(&mut self, tx_hash: &Hash, output_index: u32) -> Option<UTXO> {
        self.utxos.remove(&(*tx_hash, output_index))
    }

    /// Apply a block: spend `spent`, then add `created`
    ///
    /// Either every spent output is present and the whole update happens, or
    /// the set is left untouched. Returns the spent outputs for `revert`.
    pub fn apply(
        &mut self,
        spent: &[UTXOKey],
        created: &[(UTXOKey, UTXO)],
    ) -> Result<SpentOutputs, UTXOError> {
        if let Some((tx_hash, index)) = spent.iter().find(|key| !self.utxos.contains_key(*key)) {
            return Err(UTXOError::MissingOutput(*tx_hash, *index));
        }

        let mut undo = Vec::with_capacity(spent.len());
        for (tx_hash, index) in spent {
            if let Some(utxo) = self.remove(tx_hash, *index) {
                undo.push(((*tx_hash, *index), utxo));
            }
        }
        for ((tx_hash, index), utxo) in created {
            self.add(*tx_hash, *index, utxo.clone());
        }

        Ok(undo)
    }

    /// Undo `apply`: drop the outputs it created and restore the ones it spent
    pub fn revert(&mut self, created: &[(UTXOKey, UTXO)], undo: SpentOutputs) {
        for ((tx_hash, index), _) in created {
            self.remove(tx_hash, *index);
        }
        for ((tx_hash, index), utxo) in undo {
            self.add(tx_hash, index, utxo);
        }
    }

    /// Get total number of UTXOs
    pub fn len(&self) -> usize {
        self.utxos.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.utxos.is_empty()
    }
}

impl CoinsView for UTXOSet {
    fn cursor(&self) -> Box<dyn Iterator<Item = CursorItem> + '_> {
        Box::new(self.utxos.iter().map(|(key, utxo)| Ok((*key, utxo.clone()))))
    }
}
