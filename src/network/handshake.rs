use crate::error::{NodeError, Result};
use crate::network::connection::Connection;
use crate::network::message::{Message, STATUS_REQUEST_ID};
use crate::network::sync::sync_with;
use crate::node::NodeContext;
use log::{info, warn};
use std::sync::Arc;
use tokio::sync::oneshot;

/// STATUS exchange, then a challenge round, then catching up on blocks.
/// Any failure before sync closes the connection.
///
/// `status` is the receiver registered under the reserved STATUS id before
/// the connection's reader started.
pub async fn run_handshake(
    ctx: Arc<NodeContext>,
    conn: Arc<Connection>,
    status: oneshot::Receiver<Option<Message>>,
) -> Result<()> {
    let timeout = ctx.config().get_request_timeout();

    if conn.is_outgoing() {
        conn.send_status(ctx.get_local_port())?;
    }
    let answer = conn
        .requests()
        .wait(STATUS_REQUEST_ID, status, timeout)
        .await;
    if answer.is_none() || !conn.is_ready() {
        warn!("No valid STATUS from {}, closing", conn.get_peer());
        conn.close();
        return Err(NodeError::Protocol("Handshake timed out".to_string()));
    }

    let answer = conn
        .request(|request_id| Message::ChallengeRequest { request_id }, timeout)
        .await?;
    match answer {
        Some(Message::Challenge { challenge, .. }) => {
            conn.set_remote_id(challenge);
            info!("Peer {} answered its challenge", conn.get_peer());
        }
        _ => {
            warn!("Peer {} failed its challenge, closing", conn.get_peer());
            conn.close();
            return Err(NodeError::Protocol("Challenge failed".to_string()));
        }
    }

    sync_with(&ctx, &conn).await?;
    Ok(())
}
