// Per-connection table of outstanding requests. Each id moves from Pending
// to exactly one of Resolved or TimedOut; both transitions wake the waiter
// and neither can happen twice.

use crate::network::message::{Message, STATUS_REQUEST_ID};
use log::{debug, error};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Pending,
    Resolved,
    TimedOut,
}

struct Entry {
    state: RequestState,
    waiter: Option<oneshot::Sender<Option<Message>>>,
}

pub struct PendingRequests {
    next_id: AtomicU32,
    entries: Mutex<HashMap<u32, Entry>>,
}

impl Default for PendingRequests {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingRequests {
    pub fn new() -> PendingRequests {
        PendingRequests {
            next_id: AtomicU32::new(rand::random()),
            entries: Mutex::new(HashMap::new()),
        }
    }

    // Every critical section leaves the table whole, so a poisoned lock is
    // logged and the table used as is.
    fn lock(&self) -> MutexGuard<'_, HashMap<u32, Entry>> {
        match self.entries.lock() {
            Ok(entries) => entries,
            Err(poisoned) => {
                error!("Request table lock was poisoned");
                poisoned.into_inner()
            }
        }
    }

    /// Allocates a fresh id that collides with nothing in the table.
    pub fn register(&self) -> (u32, oneshot::Receiver<Option<Message>>) {
        let (sender, receiver) = oneshot::channel();
        let mut entries = self.lock();
        let id = loop {
            let candidate = self.next_id.fetch_add(1, Ordering::Relaxed);
            if candidate != STATUS_REQUEST_ID && !entries.contains_key(&candidate) {
                break candidate;
            }
        };
        entries.insert(
            id,
            Entry {
                state: RequestState::Pending,
                waiter: Some(sender),
            },
        );
        (id, receiver)
    }

    /// Registers a well-known id, replacing whatever was recorded under it.
    pub fn register_reserved(&self, id: u32) -> oneshot::Receiver<Option<Message>> {
        let (sender, receiver) = oneshot::channel();
        self.lock().insert(
            id,
            Entry {
                state: RequestState::Pending,
                waiter: Some(sender),
            },
        );
        receiver
    }

    fn finish(&self, id: u32, state: RequestState, result: Option<Message>) -> bool {
        let waiter = match self.lock().get_mut(&id) {
            Some(entry) if entry.state == RequestState::Pending => {
                entry.state = state;
                entry.waiter.take()
            }
            _ => return false,
        };
        if let Some(waiter) = waiter {
            // the waiter may already be gone; the state change still stands
            let _ = waiter.send(result);
        }
        true
    }

    /// Delivers a response. False if `id` is unknown or already settled.
    pub fn resolve(&self, id: u32, message: Message) -> bool {
        let resolved = self.finish(id, RequestState::Resolved, Some(message));
        if !resolved {
            debug!("Dropping response for request {id}: not pending");
        }
        resolved
    }

    pub fn time_out(&self, id: u32) -> bool {
        self.finish(id, RequestState::TimedOut, None)
    }

    pub fn state(&self, id: u32) -> Option<RequestState> {
        self.lock().get(&id).map(|e| e.state)
    }

    /// Drops a settled entry from the table.
    pub fn forget(&self, id: u32) {
        let mut entries = self.lock();
        if entries.get(&id).map_or(false, |e| e.state != RequestState::Pending) {
            entries.remove(&id);
        }
    }

    pub fn pending_count(&self) -> usize {
        self.lock()
            .values()
            .filter(|e| e.state == RequestState::Pending)
            .count()
    }

    /// Times out every pending request. Used when the connection closes.
    pub fn cancel_all(&self) -> usize {
        let ids: Vec<u32> = self
            .lock()
            .iter()
            .filter(|(_, e)| e.state == RequestState::Pending)
            .map(|(id, _)| *id)
            .collect();
        ids.into_iter().filter(|id| self.time_out(*id)).count()
    }

    /// Waits for `id` to settle, timing it out after `timeout`.
    pub async fn wait(
        &self,
        id: u32,
        receiver: oneshot::Receiver<Option<Message>>,
        timeout: Duration,
    ) -> Option<Message> {
        let result = match tokio::time::timeout(timeout, receiver).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => None,
            Err(_) => {
                self.time_out(id);
                None
            }
        };
        self.forget(id);
        result
    }
}
