//! Configuration management
//!
//! Node settings come from an optional TOML file, then environment
//! overrides. The loaded `Config` is handed to the node context; nothing
//! reads configuration through a global.

pub mod settings;

pub use settings::{
    Config, ConsensusConfig, GenesisAllocation, MinterConfig, NetworkConfig, StorageConfig,
    DEFAULT_PORT,
};
