use crate::core::MAX_BLOCKS_PER_REQUEST;
use crate::error::Result;
use crate::network::connection::Connection;
use crate::network::message::Message;
use crate::node::NodeContext;
use log::{debug, info, warn};
use std::sync::Arc;

/// Pulls main-chain blocks past our head from `conn` until the peer has
/// nothing more, a block is rejected or a request times out. Returns how
/// many blocks were applied.
pub async fn sync_with(ctx: &Arc<NodeContext>, conn: &Arc<Connection>) -> Result<usize> {
    let timeout = ctx.config().get_request_timeout();
    let mut imported = 0;

    loop {
        let start = ctx.get_main_head().await?.index + 1;
        let reply = conn
            .request(
                |request_id| Message::GetBlocks {
                    request_id,
                    start,
                    count: MAX_BLOCKS_PER_REQUEST as u64,
                },
                timeout,
            )
            .await?;

        let blocks = match reply {
            Some(Message::Blocks { blocks, .. }) => blocks,
            Some(other) => {
                warn!("Unexpected {:?} in reply to GET_BLOCKS", other.message_type());
                break;
            }
            None => {
                debug!("GET_BLOCKS to {} timed out", conn.get_peer());
                break;
            }
        };
        if blocks.is_empty() {
            break;
        }
        for block in &blocks {
            let status = ctx.receive_block(block).await?;
            if !status.is_success() {
                warn!(
                    "Stopping sync with {}: block {} rejected with {status}",
                    conn.get_peer(),
                    block.get_index()
                );
                return Ok(imported);
            }
            imported += 1;
        }
    }

    if imported > 0 {
        info!("Synced {imported} blocks from {}", conn.get_peer());
    }
    Ok(imported)
}
