use crate::core::Address;
use crate::error::{NodeError, Result};
use num_bigint::BigUint;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 12200;

const NODE_HOST_KEY: &str = "NODE_HOST";
const NODE_PORT_KEY: &str = "NODE_PORT";
const NODE_PEERS_KEY: &str = "NODE_PEERS";
const NODE_DATA_DIR_KEY: &str = "NODE_DATA_DIR";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub network: NetworkConfig,
    pub storage: StorageConfig,
    pub minter: MinterConfig,
    pub consensus: ConsensusConfig,
    pub genesis: Vec<GenesisAllocation>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub host: String,
    pub port: u16,
    /// `host[:port]` strings; the port defaults to 12200
    pub peers: Vec<String>,
    pub max_connections: usize,
    pub request_timeout_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            peers: Vec::new(),
            max_connections: 16,
            request_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            data_dir: PathBuf::from("./data"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MinterConfig {
    pub active: bool,
    /// Hex PKCS#8 ECDSA P-256 document
    pub private_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConsensusConfig {
    pub slot_duration_ms: u64,
    pub genesis_time_ms: u64,
    /// Minter addresses in round-robin order
    pub minters: Vec<String>,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        ConsensusConfig {
            slot_duration_ms: 5_000,
            genesis_time_ms: 0,
            minters: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenesisAllocation {
    pub address: String,
    /// Decimal string, smallest unit
    pub balance: String,
}

impl Config {
    /// Reads `path` if given, otherwise starts from defaults, then applies
    /// the environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let mut config = match path {
            Some(path) => {
                let text = fs::read_to_string(path).map_err(|e| {
                    NodeError::Config(format!("Cannot read {}: {e}", path.display()))
                })?;
                Config::from_toml(&text)?
            }
            None => Config::default(),
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Config> {
        Ok(toml::from_str(text)?)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(host) = env::var(NODE_HOST_KEY) {
            self.network.host = host;
        }
        if let Ok(port) = env::var(NODE_PORT_KEY) {
            self.network.port = port
                .parse()
                .map_err(|e| NodeError::Config(format!("{NODE_PORT_KEY}={port}: {e}")))?;
        }
        if let Ok(peers) = env::var(NODE_PEERS_KEY) {
            self.network.peers = peers
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect();
        }
        if let Ok(dir) = env::var(NODE_DATA_DIR_KEY) {
            self.storage.data_dir = PathBuf::from(dir);
        }
        Ok(())
    }

    pub fn get_listen_addr(&self) -> String {
        format!("{}:{}", self.network.host, self.network.port)
    }

    /// Where the chain stores live.
    pub fn get_chain_dir(&self) -> PathBuf {
        self.storage.data_dir.join("blockchain_data")
    }

    pub fn get_request_timeout(&self) -> Duration {
        Duration::from_millis(self.network.request_timeout_ms)
    }

    pub fn get_minters(&self) -> Result<Vec<Address>> {
        self.consensus
            .minters
            .iter()
            .map(|m| {
                m.parse::<Address>()
                    .map_err(|e| NodeError::Config(format!("Minter {m}: {e}")))
            })
            .collect()
    }

    pub fn get_genesis_allocations(&self) -> Result<Vec<(Address, BigUint)>> {
        self.genesis
            .iter()
            .map(|g| {
                let address = g
                    .address
                    .parse::<Address>()
                    .map_err(|e| NodeError::Config(format!("Genesis address {}: {e}", g.address)))?;
                let balance = g.balance.parse::<BigUint>().map_err(|e| {
                    NodeError::Config(format!("Genesis balance {}: {e}", g.balance))
                })?;
                Ok((address, balance))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() -> Result<()> {
        let config = Config::from_toml("")?;
        assert_eq!(config.network.port, DEFAULT_PORT);
        assert_eq!(config.network.max_connections, 16);
        assert_eq!(config.get_request_timeout(), Duration::from_millis(5_000));
        assert!(!config.minter.active);
        assert_eq!(
            config.get_chain_dir(),
            PathBuf::from("./data").join("blockchain_data")
        );
        Ok(())
    }

    #[test]
    fn test_full_file() -> Result<()> {
        let owner = Address::from_public_key(b"owner");
        let text = format!(
            r#"
            [network]
            port = 12201
            peers = ["10.0.0.2", "10.0.0.3:12300"]

            [minter]
            active = true

            [consensus]
            slot_duration_ms = 1000
            minters = ["{owner}"]

            [[genesis]]
            address = "{owner}"
            balance = "340282366920938463463374607431768211456"
            "#
        );
        let config = Config::from_toml(&text)?;
        assert_eq!(config.network.port, 12201);
        assert_eq!(config.network.host, "0.0.0.0");
        assert_eq!(config.network.peers.len(), 2);
        assert!(config.minter.active);
        assert_eq!(config.get_minters()?, vec![owner]);

        let allocations = config.get_genesis_allocations()?;
        assert_eq!(allocations[0].0, owner);
        assert_eq!(allocations[0].1, BigUint::from(u128::MAX) + 1u32);
        Ok(())
    }

    #[test]
    fn test_bad_values_are_config_errors() {
        assert!(matches!(
            Config::from_toml("[network]\nport = \"high\""),
            Err(NodeError::Config(_))
        ));

        let mut config = Config::default();
        config.genesis.push(GenesisAllocation {
            address: "nowhere".to_string(),
            balance: "1".to_string(),
        });
        assert!(matches!(
            config.get_genesis_allocations(),
            Err(NodeError::Config(_))
        ));
    }
}
