//! # Meridian Node
//!
//! A peer-to-peer ledger node. Blocks are produced in fixed time slots by a
//! scheduled minter, carry signed account-style transfers, and travel
//! between peers as length-prefixed binary frames.
//!
//! ## Layout
//! - `binary/`: arbitrary and fixed width unsigned values
//! - `encoding/`: schema-driven object codec
//! - `core/`: addresses, transactions, blocks, wallets and the chain state machine
//! - `storage/`: sled-backed chain stores, the chain registry and the memory pool
//! - `verification/`: transaction and block checks with numeric status codes
//! - `consensus/`: slot schedule and block producer
//! - `network/`: frames, messages, connections and the handshake
//! - `node/`: the per-node context, minting loop and startup
//! - `config/`, `wallet/`, `utils/`, `cli/`: settings, keys, crypto helpers and arguments
//!
//! Forks live in their own stores until they outgrow main, at which point
//! their state replaces main's.

pub mod binary;
pub mod cli;
pub mod config;
pub mod consensus;
pub mod core;
pub mod encoding;
pub mod error;
pub mod network;
pub mod node;
pub mod storage;
pub mod utils;
pub mod verification;
pub mod wallet;

#[cfg(test)]
pub mod testnet;

pub use binary::{FixedUint, Hash, Signature, Uint};
pub use cli::{Command, Opt};
pub use config::Config;
pub use consensus::{BlockProducer, Minter, RoundRobinSchedule, Slot, SlotSchedule};
pub use core::{Address, Attestation, Block, Blockchain, Transaction, Wallet, MAIN_CHAIN};
pub use error::{NodeError, Result};
pub use network::{Connection, ConnectionRegistry, Message, MessageType, PeerAddress, Server};
pub use node::{start_node, Admission, NodeContext};
pub use storage::{ChainHead, ChainMeta, MemoryPool};
pub use verification::{verify_block, verify_transaction, BlockValidationResult, VCode};
pub use wallet::Credentials;
