//! Node runtime
//!
//! The node context owns the chains, the memory pool and the connection
//! registry. This module wires it to the listener, the configured peers and
//! the minting loop.

pub mod context;
pub mod minting;

pub use context::{Admission, NodeContext};
pub use minting::{mint_once, run_minting_loop};

use crate::config::Config;
use crate::consensus::{BlockProducer, Minter};
use crate::error::{NodeError, Result};
use crate::network::Server;
use crate::wallet::Credentials;
use log::info;
use std::sync::Arc;

/// Opens storage, starts minting if configured, then serves peers until the
/// listener fails.
pub async fn start_node(config: Config) -> Result<()> {
    let minter = if config.minter.active {
        let key = config.minter.private_key.as_deref().ok_or_else(|| {
            NodeError::Config("minter.active is set without minter.private_key".to_string())
        })?;
        Some(Credentials::from_hex(key)?)
    } else {
        None
    };

    let ctx = NodeContext::open(config)?;
    let head = ctx.get_main_head().await?;
    info!("Main chain at height {} ({})", head.index, head.hash);

    let server = Server::new(Arc::clone(&ctx));
    let listener = server.bind().await?;

    if let Some(credentials) = minter {
        let address = credentials.get_address();
        let producer: Arc<dyn BlockProducer> = Arc::new(Minter::new(credentials));
        tokio::spawn(run_minting_loop(Arc::clone(&ctx), producer, address));
    }

    tokio::select! {
        result = server.run(listener) => result,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Shutting down, closing {} connections", ctx.connections().len());
            ctx.connections().close_all();
            Ok(())
        }
    }
}
