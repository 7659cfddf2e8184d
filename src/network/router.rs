// One handler per message type. Frames from a connection go through here
// one at a time; a handler error only drops that message unless it is a
// protocol violation, which has already closed the connection.

use crate::binary::Hash;
use crate::error::{NodeError, Result};
use crate::network::connection::Connection;
use crate::network::message::{
    fit_blocks_to_frame, Message, MessageKind, PROTOCOL_VERSION, STATUS_REQUEST_ID,
};
use crate::node::{Admission, NodeContext};
use log::{debug, info, warn};
use std::sync::Arc;

pub async fn dispatch(
    ctx: &Arc<NodeContext>,
    conn: &Arc<Connection>,
    message: Message,
) -> Result<()> {
    let message_type = message.message_type();
    if !conn.is_ready() && !matches!(message, Message::Status { .. }) {
        debug!(
            "Dropping {message_type:?} from {}: handshake not finished",
            conn.get_peer()
        );
        return Ok(());
    }

    if message_type.kind() == MessageKind::Response {
        return handle_response(conn, message);
    }

    match message {
        Message::Status { version, port } => handle_status(ctx, conn, version, port, message),
        Message::ChallengeRequest { request_id } => handle_challenge_request(conn, request_id),
        Message::NewTransaction(tx) => {
            match ctx.receive_transaction(tx.clone()).await {
                Admission::Accepted => {
                    ctx.connections()
                        .broadcast(&Message::NewTransaction(tx), Some(conn.get_id()));
                }
                Admission::Duplicate => {}
                Admission::Rejected(code) => {
                    warn!("Transaction {} from {} rejected: {code}", tx.get_txid(), conn.get_peer());
                }
            }
            Ok(())
        }
        Message::NewBlock(block) => {
            if ctx.receive_block(&block).await?.is_success() {
                ctx.connections()
                    .broadcast(&Message::NewBlock(block), Some(conn.get_id()));
            }
            Ok(())
        }
        Message::GetChainstate { request_id } => {
            // no chainstate summary is served; the requester times out
            debug!("Ignoring chainstate request {request_id} from {}", conn.get_peer());
            Ok(())
        }
        Message::GetBlocks {
            request_id,
            start,
            count,
        } => {
            let count = usize::try_from(count).unwrap_or(usize::MAX);
            let blocks = ctx.blockchain().read().await.blocks_range(start, count)?;
            let blocks = fit_blocks_to_frame(blocks)?;
            debug!("Serving {} blocks from {start} to {}", blocks.len(), conn.get_peer());
            conn.send(&Message::Blocks { request_id, blocks })
        }
        Message::Challenge { .. } | Message::Blocks { .. } => handle_response(conn, message),
    }
}

fn handle_status(
    ctx: &Arc<NodeContext>,
    conn: &Arc<Connection>,
    version: u64,
    port: u16,
    message: Message,
) -> Result<()> {
    if version != PROTOCOL_VERSION {
        warn!(
            "Peer {} speaks protocol {version}, closing",
            conn.get_peer()
        );
        conn.close();
        return Err(NodeError::Protocol(format!(
            "Unsupported protocol version {version}"
        )));
    }
    if conn.is_ready() {
        debug!("Ignoring repeated STATUS from {}", conn.get_peer());
        return Ok(());
    }

    conn.set_remote_port(port);
    conn.send_status(ctx.get_local_port())?;
    conn.mark_ready();
    conn.requests().resolve(STATUS_REQUEST_ID, message);
    info!("Connection to {} is ready (peer listens on {port})", conn.get_peer());
    Ok(())
}

fn handle_challenge_request(conn: &Arc<Connection>, request_id: u32) -> Result<()> {
    let challenge = Hash::random();
    conn.set_challenge(challenge);
    conn.send(&Message::Challenge {
        request_id,
        challenge,
    })
}

fn handle_response(conn: &Arc<Connection>, message: Message) -> Result<()> {
    let Some(request_id) = message.request_id() else {
        return Ok(());
    };
    if !conn.requests().resolve(request_id, message) {
        debug!(
            "Response {request_id} from {} matches no pending request",
            conn.get_peer()
        );
    }
    Ok(())
}
