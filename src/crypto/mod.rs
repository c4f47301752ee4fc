//! Cryptography module - BLAKE3 hashing and address encoding

mod hash;
mod address;

pub use hash::*;
pub use address::*;
