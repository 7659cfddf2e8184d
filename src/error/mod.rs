//! Error handling for the node
//!
//! Codec and verification code report structured results of their own; this
//! module covers everything that can fail at the storage, network and
//! bootstrap level.

use crate::binary::BinaryError;
use crate::encoding::CodecError;
use std::fmt;

/// Result type alias for node operations
pub type Result<T> = std::result::Result<T, NodeError>;

/// Error types for node operations
#[derive(Debug, Clone)]
pub enum NodeError {
    /// Database-related errors
    Database(String),
    /// File I/O errors
    Io(String),
    /// Object encoding/decoding errors
    Codec(CodecError),
    /// Binary value construction errors
    Binary(BinaryError),
    /// Cryptographic operation errors
    Crypto(String),
    /// Network communication errors
    Network(String),
    /// Peer broke the wire protocol (bad handshake, oversized frame, ...)
    Protocol(String),
    /// Configuration errors
    Config(String),
    /// Block could not be built or applied
    InvalidBlock(String),
    /// Transaction could not be built
    InvalidTransaction(String),
    /// A chain stopped accepting blocks after a failed commit
    ChainHalted(String),
    /// State that can only be reached through a bug elsewhere
    Invariant(String),
}

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeError::Database(msg) => write!(f, "Database error: {msg}"),
            NodeError::Io(msg) => write!(f, "I/O error: {msg}"),
            NodeError::Codec(err) => write!(f, "Codec error: {err}"),
            NodeError::Binary(err) => write!(f, "Binary value error: {err}"),
            NodeError::Crypto(msg) => write!(f, "Cryptographic error: {msg}"),
            NodeError::Network(msg) => write!(f, "Network error: {msg}"),
            NodeError::Protocol(msg) => write!(f, "Protocol violation: {msg}"),
            NodeError::Config(msg) => write!(f, "Configuration error: {msg}"),
            NodeError::InvalidBlock(msg) => write!(f, "Invalid block: {msg}"),
            NodeError::InvalidTransaction(msg) => write!(f, "Invalid transaction: {msg}"),
            NodeError::ChainHalted(chain) => {
                write!(f, "Chain {chain} is halted after a failed commit")
            }
            NodeError::Invariant(msg) => write!(f, "Internal invariant violated: {msg}"),
        }
    }
}

impl std::error::Error for NodeError {}

impl From<std::io::Error> for NodeError {
    fn from(err: std::io::Error) -> Self {
        NodeError::Io(err.to_string())
    }
}

impl From<sled::Error> for NodeError {
    fn from(err: sled::Error) -> Self {
        NodeError::Database(err.to_string())
    }
}

impl From<sled::transaction::TransactionError<NodeError>> for NodeError {
    fn from(err: sled::transaction::TransactionError<NodeError>) -> Self {
        match err {
            sled::transaction::TransactionError::Abort(inner) => inner,
            sled::transaction::TransactionError::Storage(e) => NodeError::Database(e.to_string()),
        }
    }
}

impl From<CodecError> for NodeError {
    fn from(err: CodecError) -> Self {
        NodeError::Codec(err)
    }
}

impl From<BinaryError> for NodeError {
    fn from(err: BinaryError) -> Self {
        NodeError::Binary(err)
    }
}

impl From<toml::de::Error> for NodeError {
    fn from(err: toml::de::Error) -> Self {
        NodeError::Config(err.to_string())
    }
}
