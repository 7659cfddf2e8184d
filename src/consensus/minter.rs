use crate::consensus::Slot;
use crate::core::{Block, Transaction};
use crate::error::Result;
use crate::utils::current_timestamp;
use crate::wallet::Credentials;
use log::info;

// keeps candidate blocks well below the frame limit
pub const MAX_BLOCK_TRANSACTIONS: usize = 1_000;

/// Turns pending transactions into a candidate block for a slot.
///
/// Implementations may do real work (proof search, reward computation), so
/// the node calls them off the async runtime.
pub trait BlockProducer: Send + Sync {
    fn produce_candidate_block(
        &self,
        mempool_snapshot: Vec<Transaction>,
        previous: &Block,
        slot: &Slot,
    ) -> Result<Block>;
}

/// Default producer: packs the given transactions into the next block and
/// hashes it.
pub struct Minter {
    credentials: Credentials,
}

impl Minter {
    pub fn new(credentials: Credentials) -> Minter {
        Minter { credentials }
    }
}

impl BlockProducer for Minter {
    fn produce_candidate_block(
        &self,
        mut mempool_snapshot: Vec<Transaction>,
        previous: &Block,
        slot: &Slot,
    ) -> Result<Block> {
        mempool_snapshot.truncate(MAX_BLOCK_TRANSACTIONS);
        let timestamp = current_timestamp()?.max(previous.get_timestamp());

        let block = Block::new(
            previous.get_index() + 1,
            slot.index,
            *previous.get_hash(),
            timestamp,
            self.credentials.get_address(),
            Vec::new(),
            mempool_snapshot,
        )?;
        info!(
            "Produced candidate block {} for slot {} with {} transactions",
            block.get_index(),
            slot.index,
            block.get_transactions().len()
        );
        Ok(block)
    }
}
