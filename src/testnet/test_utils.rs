//! Test utilities for chain and verification tests

use crate::consensus::{Slot, SlotSchedule};
use crate::core::{Address, Block, Blockchain, Transaction, MAIN_CHAIN};
use crate::error::{NodeError, Result};
use crate::storage::MemoryPool;
use crate::verification::VCode;
use crate::wallet::Credentials;
use num_bigint::BigUint;
use std::sync::RwLock;
use std::time::Duration;
use tempfile::TempDir;

/// Genesis balance of every funded sender
pub const FUNDED_BALANCE: u64 = 100;

/// A fresh chain in a temporary directory where each of `senders` holds
/// `FUNDED_BALANCE`.
pub fn funded_blockchain(senders: &[&Credentials]) -> Result<(TempDir, Blockchain)> {
    let dir = TempDir::new()?;
    let genesis: Vec<(Address, BigUint)> = senders
        .iter()
        .map(|c| (c.get_address(), BigUint::from(FUNDED_BALANCE)))
        .collect();
    let blockchain = Blockchain::open(dir.path().join("blockchain_data"), &genesis, 0)?;
    Ok((dir, blockchain))
}

pub fn signed_transfer(
    sender: &Credentials,
    recipient: Address,
    amount: u64,
    nonce: u64,
) -> Result<Transaction> {
    Transaction::new_signed(sender, recipient, BigUint::from(amount), nonce, Vec::new())
}

/// Next block on `chain`'s head, not verified or applied.
pub fn candidate_on(
    blockchain: &Blockchain,
    chain: &str,
    transactions: Vec<Transaction>,
) -> Result<Block> {
    let head = blockchain.get_head(chain)?;
    let previous = blockchain
        .get_block(chain, head.index)?
        .ok_or_else(|| NodeError::Invariant(format!("{chain} lost its head block")))?;
    Block::new(
        head.index + 1,
        previous.get_slot_index() + 1,
        head.hash,
        previous.get_timestamp() + 1,
        Address::default(),
        Vec::new(),
        transactions,
    )
}

pub fn candidate_on_main(blockchain: &Blockchain, transactions: Vec<Transaction>) -> Result<Block> {
    candidate_on(blockchain, MAIN_CHAIN, transactions)
}

/// Builds, verifies and applies the next main block.
pub fn extend_main(blockchain: &mut Blockchain, transactions: Vec<Transaction>) -> Result<Block> {
    let block = candidate_on_main(blockchain, transactions)?;
    match blockchain.submit_block(&block, &MemoryPool::new())? {
        VCode::Success => Ok(block),
        code => Err(NodeError::InvalidBlock(format!("extend_main: {code}"))),
    }
}

/// A schedule frozen at one slot.
pub struct StaticSchedule {
    slot: RwLock<Slot>,
}

impl StaticSchedule {
    pub fn new(slot: Slot) -> StaticSchedule {
        StaticSchedule {
            slot: RwLock::new(slot),
        }
    }
}

impl SlotSchedule for StaticSchedule {
    fn current_slot(&self) -> Slot {
        match self.slot.read() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn minter_for(&self, _index: u64) -> Address {
        self.current_slot().minter
    }

    fn mark_filled(&self, index: u64, hash: crate::binary::Hash) {
        if let Ok(mut slot) = self.slot.write() {
            if slot.index == index {
                slot.block = Some(hash);
            }
        }
    }

    fn slot_duration(&self) -> Duration {
        Duration::from_millis(50)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extend_main_advances_head() -> Result<()> {
        let (_dir, mut blockchain) = funded_blockchain(&[])?;
        let block = extend_main(&mut blockchain, Vec::new())?;
        assert_eq!(blockchain.get_main_head()?.index, 1);
        assert_eq!(blockchain.get_main_head()?.hash, *block.get_hash());
        Ok(())
    }
}
