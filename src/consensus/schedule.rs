use crate::binary::Hash;
use crate::core::Address;
use crate::utils::current_timestamp;
use log::{error, warn};
use std::collections::BTreeMap;
use std::sync::RwLock;
use std::time::Duration;

// filled slots older than this are forgotten
const FILLED_HISTORY: u64 = 64;

/// One consensus slot and the minter assigned to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub index: u64,
    pub minter: Address,
    /// Hash of the block that filled this slot, if any
    pub block: Option<Hash>,
}

pub trait SlotSchedule: Send + Sync {
    fn current_slot(&self) -> Slot;

    /// Minter assigned to slot `index`.
    fn minter_for(&self, index: u64) -> Address;

    /// Records that `hash` filled slot `index`. Slots after the current one
    /// are ignored.
    fn mark_filled(&self, index: u64, hash: Hash);

    fn slot_duration(&self) -> Duration;
}

/// Fixed-length slots counted from the genesis time, minters taking turns
/// in configuration order.
pub struct RoundRobinSchedule {
    genesis_time_ms: u64,
    slot_duration_ms: u64,
    minters: Vec<Address>,
    filled: RwLock<BTreeMap<u64, Hash>>,
}

impl RoundRobinSchedule {
    pub fn new(genesis_time_ms: u64, slot_duration_ms: u64, minters: Vec<Address>) -> Self {
        RoundRobinSchedule {
            genesis_time_ms,
            slot_duration_ms: slot_duration_ms.max(1),
            minters,
            filled: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn slot_index_at(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.genesis_time_ms) / self.slot_duration_ms
    }

    pub fn slot_at(&self, now_ms: u64) -> Slot {
        let index = self.slot_index_at(now_ms);
        let block = match self.filled.read() {
            Ok(filled) => filled.get(&index).copied(),
            Err(_) => {
                error!("Failed to acquire read lock on slot schedule");
                None
            }
        };
        Slot {
            index,
            minter: self.minter_for(index),
            block,
        }
    }

    /// `mark_filled` as seen at `now_ms`. History is kept relative to the
    /// slot current at that time, never to the incoming index.
    pub fn mark_filled_at(&self, index: u64, hash: Hash, now_ms: u64) {
        let current = self.slot_index_at(now_ms);
        if index > current {
            warn!("Ignoring fill of future slot {index} (current {current})");
            return;
        }
        let keep_from = current.saturating_sub(FILLED_HISTORY);
        if index < keep_from {
            return;
        }
        match self.filled.write() {
            Ok(mut filled) => {
                filled.insert(index, hash);
                *filled = filled.split_off(&keep_from);
            }
            Err(_) => error!("Failed to acquire write lock on slot schedule"),
        }
    }

    fn now_ms(&self) -> u64 {
        current_timestamp().unwrap_or_else(|e| {
            error!("Clock unavailable: {e}");
            self.genesis_time_ms
        })
    }
}

impl SlotSchedule for RoundRobinSchedule {
    fn current_slot(&self) -> Slot {
        self.slot_at(self.now_ms())
    }

    fn minter_for(&self, index: u64) -> Address {
        if self.minters.is_empty() {
            return Address::default();
        }
        self.minters[(index % self.minters.len() as u64) as usize]
    }

    fn mark_filled(&self, index: u64, hash: Hash) {
        self.mark_filled_at(index, hash, self.now_ms());
    }

    fn slot_duration(&self) -> Duration {
        Duration::from_millis(self.slot_duration_ms)
    }
}
