//! Consensus module - Chain parameters, epochs, rewards, and supply estimation

mod params;
mod epoch;
mod rewards;
mod supply;

pub use params::*;
pub use epoch::*;
pub use rewards::*;
pub use supply::*;
