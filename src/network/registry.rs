use crate::error::{NodeError, Result};
use crate::network::connection::Connection;
use crate::network::message::Message;
use log::{info, warn};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// Every live connection, keyed by id, with a connection limit.
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<Uuid, Arc<Connection>>>,
    max_connections: usize,
}

impl ConnectionRegistry {
    pub fn new(max_connections: usize) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            max_connections,
        }
    }

    /// Check if we should accept more connections
    pub fn has_capacity(&self) -> bool {
        self.len() < self.max_connections
    }

    pub fn add(&self, connection: Arc<Connection>) -> Result<()> {
        let mut connections = self
            .connections
            .write()
            .map_err(|e| NodeError::Network(format!("Failed to acquire connection lock: {e}")))?;
        if connections.len() >= self.max_connections {
            return Err(NodeError::Network(format!(
                "Connection limit of {} reached",
                self.max_connections
            )));
        }
        info!(
            "Connected to peer {} ({})",
            connection.get_peer(),
            if connection.is_outgoing() { "outgoing" } else { "incoming" }
        );
        connections.insert(connection.get_id(), connection);
        Ok(())
    }

    pub fn remove(&self, id: &Uuid) -> Option<Arc<Connection>> {
        match self.connections.write() {
            Ok(mut connections) => connections.remove(id),
            Err(_) => {
                log::error!("Failed to acquire write lock on connections");
                None
            }
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<Arc<Connection>> {
        self.connections
            .read()
            .ok()
            .and_then(|connections| connections.get(id).cloned())
    }

    pub fn len(&self) -> usize {
        self.connections.read().map_or(0, |c| c.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get_all(&self) -> Vec<Arc<Connection>> {
        self.connections
            .read()
            .map(|connections| connections.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Sends `message` to every ready connection except `except`. Returns
    /// how many peers it went to.
    pub fn broadcast(&self, message: &Message, except: Option<Uuid>) -> usize {
        let frame = match message.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Cannot broadcast {:?}: {e}", message.message_type());
                return 0;
            }
        };
        let mut sent = 0;
        for connection in self.get_all() {
            if Some(connection.get_id()) == except || !connection.is_ready() {
                continue;
            }
            match connection.send_frame(frame.clone()) {
                Ok(()) => sent += 1,
                Err(e) => warn!("Broadcast to {} failed: {e}", connection.get_peer()),
            }
        }
        sent
    }

    pub fn close_all(&self) {
        for connection in self.get_all() {
            connection.close();
        }
    }
}
