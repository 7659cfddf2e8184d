//! Data storage and persistence
//!
//! Each chain lives in its own sled database (`ChainStore`). A separate
//! registry database records every chain's parent, fork base and head. The
//! memory pool is in-memory only.

pub mod chain_store;
pub mod chainstate;
pub mod memory_pool;

pub use chain_store::{ChainHead, ChainStore};
pub use chainstate::{ChainMeta, ChainStateRegistry};
pub use memory_pool::MemoryPool;
