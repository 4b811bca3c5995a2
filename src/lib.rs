pub mod storage;
pub mod memorial;
pub mod stats;
pub mod config;
pub mod errors;

pub use storage::*;
