use crate::binary::Hash;
use crate::error::{NodeError, Result};
use crate::network::message::{Message, PROTOCOL_VERSION};
use crate::network::requests::PendingRequests;
use bytes::Bytes;
use log::{debug, info, warn};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

/// Frames queued for a peer's writer before the peer counts as too slow.
pub const OUTBOX_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Waiting for the peer's STATUS
    Connecting,
    Ready,
    Closed,
}

/// One peer link. The registry owns it; handlers and tasks share it through
/// an `Arc` and refer back to the registry only by `id`.
pub struct Connection {
    id: Uuid,
    peer: SocketAddr,
    outgoing: bool,
    state: Mutex<ConnectionState>,
    status_sent: AtomicBool,
    remote_port: Mutex<Option<u16>>,
    // random value this node handed out when challenged
    challenge: Mutex<Option<Hash>>,
    // random value the peer answered our challenge with
    remote_id: Mutex<Option<Hash>>,
    requests: PendingRequests,
    outbox: mpsc::Sender<Bytes>,
    closed: watch::Sender<bool>,
}

impl Connection {
    /// Creates the connection together with the receiving ends of its
    /// outbox and close signal.
    pub fn new(
        peer: SocketAddr,
        outgoing: bool,
    ) -> (Connection, mpsc::Receiver<Bytes>, watch::Receiver<bool>) {
        Connection::with_outbox_capacity(peer, outgoing, OUTBOX_CAPACITY)
    }

    pub fn with_outbox_capacity(
        peer: SocketAddr,
        outgoing: bool,
        capacity: usize,
    ) -> (Connection, mpsc::Receiver<Bytes>, watch::Receiver<bool>) {
        let (outbox, outbox_rx) = mpsc::channel(capacity.max(1));
        let (closed, closed_rx) = watch::channel(false);
        let connection = Connection {
            id: Uuid::new_v4(),
            peer,
            outgoing,
            state: Mutex::new(ConnectionState::Connecting),
            status_sent: AtomicBool::new(false),
            remote_port: Mutex::new(None),
            challenge: Mutex::new(None),
            remote_id: Mutex::new(None),
            requests: PendingRequests::new(),
            outbox,
            closed,
        };
        (connection, outbox_rx, closed_rx)
    }

    pub fn get_id(&self) -> Uuid {
        self.id
    }

    pub fn get_peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn is_outgoing(&self) -> bool {
        self.outgoing
    }

    pub fn get_state(&self) -> ConnectionState {
        self.state
            .lock()
            .map_or(ConnectionState::Closed, |state| *state)
    }

    pub fn is_ready(&self) -> bool {
        self.get_state() == ConnectionState::Ready
    }

    pub fn is_closed(&self) -> bool {
        self.get_state() == ConnectionState::Closed
    }

    /// Connecting -> Ready. False from any other state.
    pub fn mark_ready(&self) -> bool {
        match self.state.lock() {
            Ok(mut state) if *state == ConnectionState::Connecting => {
                *state = ConnectionState::Ready;
                true
            }
            _ => false,
        }
    }

    pub fn requests(&self) -> &PendingRequests {
        &self.requests
    }

    pub fn get_remote_port(&self) -> Option<u16> {
        self.remote_port.lock().ok().and_then(|port| *port)
    }

    pub fn set_remote_port(&self, port: u16) {
        if let Ok(mut remote_port) = self.remote_port.lock() {
            *remote_port = Some(port);
        }
    }

    pub fn get_challenge(&self) -> Option<Hash> {
        self.challenge.lock().ok().and_then(|c| *c)
    }

    pub fn set_challenge(&self, value: Hash) {
        if let Ok(mut challenge) = self.challenge.lock() {
            *challenge = Some(value);
        }
    }

    pub fn get_remote_id(&self) -> Option<Hash> {
        self.remote_id.lock().ok().and_then(|id| *id)
    }

    pub fn set_remote_id(&self, value: Hash) {
        if let Ok(mut remote_id) = self.remote_id.lock() {
            *remote_id = Some(value);
        }
    }

    /// The peer answered our challenge.
    pub fn is_verified(&self) -> bool {
        self.get_remote_id().is_some()
    }

    pub fn send_frame(&self, frame: Bytes) -> Result<()> {
        if self.is_closed() {
            return Err(NodeError::Network(format!("Connection {} is closed", self.id)));
        }
        match self.outbox.try_send(frame) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                warn!(
                    "Outbox for {} is full ({} frames queued), closing",
                    self.peer,
                    self.outbox.max_capacity()
                );
                self.close();
                Err(NodeError::Network(format!("Peer {} is not reading", self.peer)))
            }
            Err(TrySendError::Closed(_)) => {
                Err(NodeError::Network(format!("Writer for {} has stopped", self.id)))
            }
        }
    }

    pub fn send(&self, message: &Message) -> Result<()> {
        debug!("-> {} {:?}", self.peer, message.message_type());
        self.send_frame(message.to_frame()?)
    }

    /// Sends this node's STATUS once per connection.
    pub fn send_status(&self, port: u16) -> Result<()> {
        if self.status_sent.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.send(&Message::Status {
            version: PROTOCOL_VERSION,
            port,
        })
    }

    /// Sends the request built for a fresh id and waits for its response.
    /// `None` on timeout or close.
    pub async fn request<F>(&self, build: F, timeout: Duration) -> Result<Option<Message>>
    where
        F: FnOnce(u32) -> Message,
    {
        let (id, receiver) = self.requests.register();
        if let Err(e) = self.send(&build(id)) {
            self.requests.time_out(id);
            self.requests.forget(id);
            return Err(e);
        }
        Ok(self.requests.wait(id, receiver, timeout).await)
    }

    /// Idempotent. Wakes every pending request with "no result" and stops
    /// the reader and writer.
    pub fn close(&self) -> bool {
        match self.state.lock() {
            Ok(mut state) => {
                if *state == ConnectionState::Closed {
                    return false;
                }
                *state = ConnectionState::Closed;
            }
            Err(_) => return false,
        }
        let cancelled = self.requests.cancel_all();
        self.closed.send_replace(true);
        info!(
            "Connection {} to {} closed ({cancelled} requests cancelled)",
            self.id, self.peer
        );
        true
    }
}
