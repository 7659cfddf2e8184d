//! Key management
//!
//! Local signing credentials for transactions and minted blocks.

pub mod credentials;

pub use credentials::Credentials;
