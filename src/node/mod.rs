//! Node integration - governance inputs and the reward engine

mod governance;
mod rewards;

pub use governance::*;
pub use rewards::*;
