use crate::error::{NodeError, Result};
use crate::network::connection::Connection;
use crate::network::frame::FrameDecoder;
use crate::network::handshake::run_handshake;
use crate::network::message::{Message, STATUS_REQUEST_ID};
use crate::network::peers::PeerAddress;
use crate::network::router;
use crate::node::NodeContext;
use bytes::Bytes;
use log::{debug, error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};

const READ_BUFFER_SIZE: usize = 8 * 1024;

/// Accepts peers on the configured address and dials the configured peers.
pub struct Server {
    ctx: Arc<NodeContext>,
}

impl Server {
    pub fn new(ctx: Arc<NodeContext>) -> Self {
        Self { ctx }
    }

    pub async fn bind(&self) -> Result<TcpListener> {
        let addr = self.ctx.config().get_listen_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| NodeError::Network(format!("Failed to bind to {addr}: {e}")))?;
        let local = listener.local_addr()?;
        self.ctx.set_local_port(local.port());
        info!("Server listening on {local}");
        Ok(listener)
    }

    pub async fn run(&self, listener: TcpListener) -> Result<()> {
        for peer in &self.ctx.config().network.peers {
            match peer.parse::<PeerAddress>() {
                Ok(peer) => {
                    let ctx = Arc::clone(&self.ctx);
                    tokio::spawn(async move {
                        if let Err(e) = connect(ctx, &peer).await {
                            warn!("Failed to connect to peer {peer}: {e}");
                        }
                    });
                }
                Err(e) => warn!("Skipping peer {peer}: {e}"),
            }
        }

        loop {
            let (stream, peer_addr) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("Error accepting connection: {e}");
                    continue;
                }
            };
            if !self.ctx.connections().has_capacity() {
                warn!("Rejecting connection from {peer_addr}: connection limit reached");
                continue;
            }
            if let Err(e) = spawn_connection(Arc::clone(&self.ctx), stream, peer_addr, false) {
                warn!("Dropping connection from {peer_addr}: {e}");
            }
        }
    }
}

/// Dials `peer` and starts the handshake.
pub async fn connect(ctx: Arc<NodeContext>, peer: &PeerAddress) -> Result<Arc<Connection>> {
    if !ctx.connections().has_capacity() {
        return Err(NodeError::Network(format!(
            "Not dialing {peer}: connection limit reached"
        )));
    }
    let addr = peer.resolve().await?;
    let stream = TcpStream::connect(addr)
        .await
        .map_err(|e| NodeError::Network(format!("Failed to connect to {peer}: {e}")))?;
    spawn_connection(ctx, stream, addr, true)
}

/// Registers a connection over `stream` and starts its writer, reader and
/// handshake tasks. The STATUS id is registered before the reader runs.
pub fn spawn_connection<S>(
    ctx: Arc<NodeContext>,
    stream: S,
    peer: SocketAddr,
    outgoing: bool,
) -> Result<Arc<Connection>>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (conn, outbox, closed) = Connection::new(peer, outgoing);
    let conn = Arc::new(conn);
    let status = conn.requests().register_reserved(STATUS_REQUEST_ID);
    ctx.connections().add(Arc::clone(&conn))?;

    let (reader, writer) = tokio::io::split(stream);
    tokio::spawn(write_loop(writer, outbox, closed.clone()));

    {
        let ctx = Arc::clone(&ctx);
        let conn = Arc::clone(&conn);
        tokio::spawn(async move {
            if let Err(e) = read_loop(&ctx, &conn, reader, closed).await {
                warn!("Connection to {} failed: {e}", conn.get_peer());
            }
            conn.close();
            ctx.connections().remove(&conn.get_id());
        });
    }

    {
        let conn = Arc::clone(&conn);
        tokio::spawn(async move {
            if let Err(e) = run_handshake(ctx, Arc::clone(&conn), status).await {
                debug!("Handshake with {} ended: {e}", conn.get_peer());
            }
        });
    }

    Ok(conn)
}

async fn write_loop<W>(
    mut writer: W,
    mut outbox: mpsc::Receiver<Bytes>,
    mut closed: watch::Receiver<bool>,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        tokio::select! {
            frame = outbox.recv() => {
                let Some(frame) = frame else { break };
                if let Err(e) = writer.write_all(&frame).await {
                    warn!("Write failed: {e}");
                    break;
                }
            }
            _ = closed.changed() => break,
        }
    }
    let _ = writer.shutdown().await;
}

async fn read_loop<R>(
    ctx: &Arc<NodeContext>,
    conn: &Arc<Connection>,
    mut reader: R,
    mut closed: watch::Receiver<bool>,
) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut decoder = FrameDecoder::new();
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let read = tokio::select! {
            read = reader.read(&mut buffer) => read?,
            _ = closed.changed() => return Ok(()),
        };
        if read == 0 {
            debug!("{} closed the stream", conn.get_peer());
            return Ok(());
        }
        decoder.extend(&buffer[..read]);

        while let Some(frame) = decoder.next_frame()? {
            match Message::from_frame(&frame) {
                Ok(Some(message)) => {
                    debug!("<- {} {:?}", conn.get_peer(), message.message_type());
                    if let Err(e) = router::dispatch(ctx, conn, message).await {
                        warn!("Dropped message from {}: {e}", conn.get_peer());
                    }
                }
                Ok(None) => warn!(
                    "Dropping frame with unknown type {:#06x} from {}",
                    frame.type_code,
                    conn.get_peer()
                ),
                Err(e) => warn!("Dropping malformed frame from {}: {e}", conn.get_peer()),
            }
            if conn.is_closed() {
                return Ok(());
            }
        }
    }
}
