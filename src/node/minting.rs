// Minting runs once per slot. Candidate assembly is handed to the blocking
// pool so a slow producer never stalls the connections; everything else
// happens under the same chain lock as blocks from peers.

use crate::consensus::BlockProducer;
use crate::core::{Address, Block, MAIN_CHAIN};
use crate::error::{NodeError, Result};
use crate::network::Message;
use crate::node::NodeContext;
use crate::verification::{filter_valid_transactions, verify_minted_block, ChainTarget};
use log::{info, warn};
use std::sync::Arc;

pub async fn run_minting_loop(
    ctx: Arc<NodeContext>,
    producer: Arc<dyn BlockProducer>,
    minter: Address,
) {
    info!("Minting as {minter}");
    let mut ticker = tokio::time::interval(ctx.schedule().slot_duration());
    loop {
        ticker.tick().await;
        if let Err(e) = mint_once(&ctx, &producer, minter).await {
            warn!("Minting failed: {e}");
        }
    }
}

/// Mints for the current slot if it is ours and still open. Returns the
/// block once it is applied and broadcast.
pub async fn mint_once(
    ctx: &Arc<NodeContext>,
    producer: &Arc<dyn BlockProducer>,
    minter: Address,
) -> Result<Option<Block>> {
    let slot = ctx.schedule().current_slot();
    if slot.minter != minter || slot.block.is_some() {
        return Ok(None);
    }

    let (previous, snapshot) = {
        let blockchain = ctx.blockchain().read().await;
        let previous = blockchain.get_main_tip()?;
        let mut wallets = blockchain.wallet_view(&ChainTarget::extend(MAIN_CHAIN))?;
        let snapshot = filter_valid_transactions(ctx.mempool().get_all(), &mut wallets);
        (previous, snapshot)
    };

    let producer = Arc::clone(producer);
    let block = tokio::task::spawn_blocking(move || {
        producer.produce_candidate_block(snapshot, &previous, &slot)
    })
    .await
    .map_err(|e| NodeError::Invariant(format!("Block producer task failed: {e}")))??;

    let status = verify_minted_block(Some(&block), ctx.schedule());
    if !status.is_success() {
        warn!("Discarding minted block {}: {status}", block.get_index());
        return Ok(None);
    }
    if !ctx.receive_block(&block).await?.is_success() {
        return Ok(None);
    }

    let peers = ctx
        .connections()
        .broadcast(&Message::NewBlock(block.clone()), None);
    info!(
        "Minted block {} for slot {} and sent it to {peers} peers",
        block.get_index(),
        block.get_slot_index()
    );
    Ok(Some(block))
}
