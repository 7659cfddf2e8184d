use crate::core::{Address, Transaction, Wallet};
use crate::error::{NodeError, Result};
use crate::storage::ChainStore;
use std::collections::BTreeMap;

/// Uncommitted wallet changes layered over one chain's wallet store.
///
/// Used to check a block's transactions in order, to compute the wallets a
/// block touches before committing them, and to rewind a parent chain to a
/// fork point.
pub struct WalletOverlay<'a> {
    store: &'a ChainStore,
    changes: BTreeMap<Address, Wallet>,
}

impl<'a> WalletOverlay<'a> {
    pub fn new(store: &'a ChainStore) -> WalletOverlay<'a> {
        WalletOverlay {
            store,
            changes: BTreeMap::new(),
        }
    }

    pub fn get(&self, address: &Address) -> Result<Wallet> {
        match self.changes.get(address) {
            Some(wallet) => Ok(wallet.clone()),
            None => self.store.get_wallet(address),
        }
    }

    fn put(&mut self, wallet: Wallet) {
        self.changes.insert(*wallet.get_owner(), wallet);
    }

    /// Debit and nonce increment for the sender, credit for the recipient.
    pub fn apply(&mut self, tx: &Transaction) -> Result<()> {
        let mut sender = self.get(tx.get_sender_address())?;
        sender.sub_balance(tx.get_amount())?;
        sender.increment_nonce();
        self.put(sender);

        let mut recipient = self.get(tx.get_recipient_address())?;
        recipient.add_balance(tx.get_amount());
        self.put(recipient);
        Ok(())
    }

    /// Exact inverse of `apply`.
    pub fn revert(&mut self, tx: &Transaction) -> Result<()> {
        let mut recipient = self.get(tx.get_recipient_address())?;
        recipient.sub_balance(tx.get_amount()).map_err(|_| {
            NodeError::Invariant(format!(
                "Cannot revert {}: recipient balance too low",
                tx.get_txid()
            ))
        })?;
        self.put(recipient);

        let mut sender = self.get(tx.get_sender_address())?;
        sender.add_balance(tx.get_amount());
        sender.decrement_nonce()?;
        self.put(sender);
        Ok(())
    }

    /// Wallets changed so far.
    pub fn changed(&self) -> Vec<Wallet> {
        self.changes.values().cloned().collect()
    }

    /// The complete wallet set as it would read after committing.
    pub fn full_set(&self) -> Result<Vec<Wallet>> {
        let mut all: BTreeMap<Address, Wallet> = self
            .store
            .get_all_wallets()?
            .into_iter()
            .map(|w| (*w.get_owner(), w))
            .collect();
        for (address, wallet) in &self.changes {
            all.insert(*address, wallet.clone());
        }
        Ok(all.into_values().collect())
    }
}
