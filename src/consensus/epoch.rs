//! Reward epoch arithmetic
//! 
//! An epoch is a run of `interval` heights sharing one subsidy. Its first
//! height is the boundary where the subsidy is recomputed.

/// Epoch index of `height`
pub fn reward_epoch(height: u64, interval: u64) -> u64 {
    height / interval
}

/// First height of the epoch containing `height`
pub fn epoch_height(height: u64, interval: u64) -> u64 {
    reward_epoch(height, interval) * interval
}

/// Check if `height` is an epoch boundary
pub fn is_epoch_height(height: u64, interval: u64) -> bool {
    epoch_height(height, interval) == height
}
