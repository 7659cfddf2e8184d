use crate::binary::Hash;
use crate::core::Transaction;
use std::collections::HashMap;
use std::sync::RwLock;

/// Transactions waiting for a block. ( K -> txid, V => Transaction )
pub struct MemoryPool {
    inner: RwLock<HashMap<Hash, Transaction>>,
}

impl Default for MemoryPool {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPool {
    pub fn new() -> MemoryPool {
        MemoryPool {
            inner: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, txid: &Hash) -> Option<Transaction> {
        match self.inner.read() {
            Ok(pool) => pool.get(txid).cloned(),
            Err(_) => {
                log::error!("Failed to acquire read lock on memory pool");
                None
            }
        }
    }

    /// Returns false if the transaction was already pooled.
    pub fn add(&self, tx: Transaction) -> bool {
        match self.inner.write() {
            Ok(mut pool) => pool.insert(*tx.get_txid(), tx).is_none(),
            Err(_) => {
                log::error!("Failed to acquire write lock on memory pool");
                false
            }
        }
    }

    pub fn contains(&self, txid: &Hash) -> bool {
        match self.inner.read() {
            Ok(pool) => pool.contains_key(txid),
            Err(_) => {
                log::error!("Failed to acquire read lock on memory pool");
                false
            }
        }
    }

    pub fn remove(&self, txid: &Hash) {
        match self.inner.write() {
            Ok(mut pool) => {
                pool.remove(txid);
            }
            Err(_) => {
                log::error!("Failed to acquire write lock on memory pool");
            }
        }
    }

    /// Drops every transaction of an applied block.
    pub fn remove_all(&self, transactions: &[Transaction]) {
        match self.inner.write() {
            Ok(mut pool) => {
                for tx in transactions {
                    pool.remove(tx.get_txid());
                }
            }
            Err(_) => {
                log::error!("Failed to acquire write lock on memory pool");
            }
        }
    }

    pub fn len(&self) -> usize {
        match self.inner.read() {
            Ok(pool) => pool.len(),
            Err(_) => {
                log::error!("Failed to acquire read lock on memory pool");
                0
            }
        }
    }

    /// Snapshot ordered by sender, then nonce, so that each sender's
    /// transactions read in the order they have to be applied.
    pub fn get_all(&self) -> Vec<Transaction> {
        match self.inner.read() {
            Ok(pool) => {
                let mut txs: Vec<Transaction> = pool.values().cloned().collect();
                txs.sort_by(|a, b| {
                    a.get_sender_address()
                        .cmp(b.get_sender_address())
                        .then(a.get_nonce().cmp(&b.get_nonce()))
                        .then(a.get_txid().cmp(b.get_txid()))
                });
                txs
            }
            Err(_) => {
                log::error!("Failed to acquire read lock on memory pool");
                Vec::new()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        match self.inner.read() {
            Ok(pool) => pool.is_empty(),
            Err(_) => {
                log::error!("Failed to acquire read lock on memory pool");
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Address;
    use crate::error::Result;
    use crate::wallet::Credentials;
    use num_bigint::BigUint;

    fn tx(credentials: &Credentials, nonce: u64) -> Result<Transaction> {
        Transaction::new_signed(
            credentials,
            Address::from_public_key(b"recipient"),
            BigUint::from(1u32),
            nonce,
            Vec::new(),
        )
    }

    #[test]
    fn test_add_is_idempotent() -> Result<()> {
        let pool = MemoryPool::new();
        let credentials = Credentials::generate()?;
        let first = tx(&credentials, 0)?;

        assert!(pool.add(first.clone()));
        assert!(!pool.add(first.clone()));
        assert_eq!(pool.len(), 1);
        assert!(pool.contains(first.get_txid()));
        Ok(())
    }

    #[test]
    fn test_snapshot_orders_nonces_per_sender() -> Result<()> {
        let pool = MemoryPool::new();
        let credentials = Credentials::generate()?;
        for nonce in [2, 0, 1] {
            pool.add(tx(&credentials, nonce)?);
        }

        let nonces: Vec<u64> = pool.get_all().iter().map(Transaction::get_nonce).collect();
        assert_eq!(nonces, vec![0, 1, 2]);
        Ok(())
    }

    #[test]
    fn test_remove_all() -> Result<()> {
        let pool = MemoryPool::new();
        let credentials = Credentials::generate()?;
        let applied = vec![tx(&credentials, 0)?, tx(&credentials, 1)?];
        let pending = tx(&credentials, 2)?;
        for t in applied.iter().chain(std::iter::once(&pending)) {
            pool.add(t.clone());
        }

        pool.remove_all(&applied);
        assert_eq!(pool.len(), 1);
        assert!(pool.get(pending.get_txid()).is_some());
        Ok(())
    }
}
