//! Verification engine
//!
//! Pure checks of transactions and blocks against chain state. Nothing here
//! mutates storage and nothing returns an error: every outcome is a `VCode`.

pub mod codes;
pub mod overlay;

pub use codes::VCode;
pub use overlay::WalletOverlay;

use crate::consensus::SlotSchedule;
use crate::core::{Block, Blockchain, Transaction};
use crate::encoding::Encodable;
use log::{debug, error};

/// Where a verified block goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainTarget {
    /// Chain the block is appended to, possibly a fork yet to be created
    pub target_chain: String,
    /// Chain the block builds on; equal to `target_chain` for extensions
    pub parent_chain: String,
    /// Index of the last block shared with the parent, for new forks
    pub fork_base: Option<u64>,
}

impl ChainTarget {
    pub fn extend(chain: &str) -> ChainTarget {
        ChainTarget {
            target_chain: chain.to_string(),
            parent_chain: chain.to_string(),
            fork_base: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockValidationResult {
    Valid(ChainTarget),
    Invalid(VCode),
}

impl BlockValidationResult {
    pub fn status(&self) -> VCode {
        match self {
            BlockValidationResult::Valid(_) => VCode::Success,
            BlockValidationResult::Invalid(code) => *code,
        }
    }
}

/// Checks, in order: presence, txid, signature, sender nonce, sender funds.
pub fn verify_transaction(tx: Option<&Transaction>, wallets: &WalletOverlay<'_>) -> VCode {
    let Some(tx) = tx else {
        return VCode::Null;
    };

    match tx.calculate_hash() {
        Ok(hash) if &hash == tx.get_txid() => {}
        _ => return VCode::HashMismatch,
    }

    if !tx.verify_signature() {
        return VCode::BadSignature;
    }

    let sender = match wallets.get(tx.get_sender_address()) {
        Ok(wallet) => wallet,
        Err(e) => {
            error!("Cannot read wallet {}: {e}", tx.get_sender_address());
            return VCode::InternalError;
        }
    };

    if sender.get_nonce() != tx.get_nonce() {
        return VCode::BadNonce;
    }
    if sender.get_balance() < tx.get_amount() {
        return VCode::InsufficientFunds;
    }

    VCode::Success
}

/// Checks every transaction of a block in block order, applying each one to
/// `wallets` before checking the next.
fn verify_block_transactions(block: &Block, wallets: &mut WalletOverlay<'_>) -> VCode {
    for tx in block.get_transactions() {
        let status = verify_transaction(Some(tx), wallets);
        if !status.is_success() {
            debug!(
                "Transaction {} in block {} rejected: {status}",
                tx.get_txid(),
                block.get_index()
            );
            return VCode::BlockBadTx;
        }
        if let Err(e) = wallets.apply(tx) {
            error!("Verified transaction {} failed to apply: {e}", tx.get_txid());
            return VCode::BlockBadTx;
        }
    }
    VCode::Success
}

/// Presence, chain placement, hash, then every transaction against the
/// target chain's wallets.
pub fn verify_block(block: Option<&Block>, blockchain: &Blockchain) -> BlockValidationResult {
    let Some(block) = block else {
        return BlockValidationResult::Invalid(VCode::Null);
    };

    let target = match blockchain.match_chainstate(block) {
        Ok(target) => target,
        Err(code) => return BlockValidationResult::Invalid(code),
    };

    match block.calculate_hash() {
        Ok(hash) if &hash == block.get_hash() => {}
        _ => return BlockValidationResult::Invalid(VCode::HashMismatch),
    }

    let mut wallets = match blockchain.wallet_view(&target) {
        Ok(wallets) => wallets,
        Err(e) => {
            error!("Cannot build wallet view for {}: {e}", target.target_chain);
            return BlockValidationResult::Invalid(VCode::InternalError);
        }
    };
    let status = verify_block_transactions(block, &mut wallets);
    if !status.is_success() {
        return BlockValidationResult::Invalid(status);
    }

    BlockValidationResult::Valid(target)
}

/// Guards a locally minted block against stale slots and double proposals.
pub fn verify_minted_block(block: Option<&Block>, schedule: &dyn SlotSchedule) -> VCode {
    let Some(block) = block else {
        return VCode::Null;
    };

    let slot = schedule.current_slot();
    if block.get_slot_index() != slot.index {
        return VCode::WrongSlot;
    }
    if block.get_minter() != &slot.minter {
        return VCode::NotMinter;
    }
    if slot.block.is_some() {
        return VCode::SlotFilled;
    }
    VCode::Success
}

/// Keeps the transactions that are valid in sequence, in the given order.
pub fn filter_valid_transactions(
    candidates: Vec<Transaction>,
    wallets: &mut WalletOverlay<'_>,
) -> Vec<Transaction> {
    let mut accepted = Vec::new();
    for tx in candidates {
        if verify_transaction(Some(&tx), wallets).is_success() && wallets.apply(&tx).is_ok() {
            accepted.push(tx);
        }
    }
    accepted
}
