use crate::binary::Hash;
use crate::core::{Address, Block, Wallet};
use crate::encoding::Encodable;
use crate::error::{NodeError, Result};
use log::{debug, error};
use sled::transaction::TransactionError;
use sled::{Db, Transactional, Tree};
use std::path::{Path, PathBuf};

const BLOCKS_TREE: &str = "blocks";
const WALLETS_TREE: &str = "wallets";
const META_TREE: &str = "meta";
const HEAD_KEY: &str = "head";

/// Index and hash of the last block on a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainHead {
    pub index: u64,
    pub hash: Hash,
}

impl ChainHead {
    pub fn new(index: u64, hash: Hash) -> ChainHead {
        ChainHead { index, hash }
    }

    pub fn of(block: &Block) -> ChainHead {
        ChainHead::new(block.get_index(), *block.get_hash())
    }

    fn to_bytes(self) -> Vec<u8> {
        let mut bytes = self.index.to_be_bytes().to_vec();
        bytes.extend_from_slice(self.hash.get_raw());
        bytes
    }

    fn from_bytes(bytes: &[u8]) -> Result<ChainHead> {
        if bytes.len() != 40 {
            return Err(NodeError::Database(format!(
                "Head record has {} bytes, expected 40",
                bytes.len()
            )));
        }
        let mut index = [0u8; 8];
        index.copy_from_slice(&bytes[..8]);
        Ok(ChainHead {
            index: u64::from_be_bytes(index),
            hash: Hash::from_raw(&bytes[8..])?,
        })
    }
}

fn block_key(index: u64) -> [u8; 8] {
    index.to_be_bytes()
}

/// One chain's persistent state: blocks by index, wallets by address, and
/// the head pointer. Every write that touches more than one tree goes
/// through a single multi-tree transaction.
pub struct ChainStore {
    db: Db,
    path: PathBuf,
    blocks: Tree,
    wallets: Tree,
    meta: Tree,
}

impl ChainStore {
    pub fn open(path: impl AsRef<Path>) -> Result<ChainStore> {
        let path = path.as_ref().to_path_buf();
        let db = sled::open(&path)
            .map_err(|e| NodeError::Database(format!("Failed to open {}: {e}", path.display())))?;
        let blocks = db.open_tree(BLOCKS_TREE)?;
        let wallets = db.open_tree(WALLETS_TREE)?;
        let meta = db.open_tree(META_TREE)?;
        Ok(ChainStore {
            db,
            path,
            blocks,
            wallets,
            meta,
        })
    }

    pub fn get_path(&self) -> &Path {
        &self.path
    }

    pub fn get_head(&self) -> Result<Option<ChainHead>> {
        match self.meta.get(HEAD_KEY)? {
            Some(bytes) => Ok(Some(ChainHead::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn get_block(&self, index: u64) -> Result<Option<Block>> {
        match self.blocks.get(block_key(index))? {
            Some(bytes) => Ok(Some(Block::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Up to `count` consecutive blocks starting at `start`.
    pub fn get_blocks(&self, start: u64, count: usize) -> Result<Vec<Block>> {
        let mut blocks = Vec::new();
        for item in self.blocks.range(block_key(start)..).take(count) {
            let (_, bytes) = item?;
            blocks.push(Block::decode(&bytes)?);
        }
        Ok(blocks)
    }

    /// Absent wallets read as empty.
    pub fn get_wallet(&self, address: &Address) -> Result<Wallet> {
        match self.wallets.get(address.get_raw())? {
            Some(bytes) => Ok(Wallet::decode(*address, &bytes)?),
            None => Ok(Wallet::empty(*address)),
        }
    }

    pub fn get_all_wallets(&self) -> Result<Vec<Wallet>> {
        let mut wallets = Vec::new();
        for item in self.wallets.iter() {
            let (key, bytes) = item?;
            let owner = Address::from_raw(&key)?;
            wallets.push(Wallet::decode(owner, &bytes)?);
        }
        Ok(wallets)
    }

    pub fn put_wallets(&self, wallets: &[Wallet]) -> Result<()> {
        let mut batch = sled::Batch::default();
        for wallet in wallets {
            batch.insert(wallet.get_owner().get_raw(), wallet.encode()?);
        }
        self.wallets.apply_batch(batch)?;
        Ok(())
    }

    /// Appends `block`, writes the wallets it touched and advances the head,
    /// all or nothing.
    pub fn commit_block(&self, block: &Block, touched: &[Wallet]) -> Result<ChainHead> {
        let head = ChainHead::of(block);
        let block_bytes = block.encode()?;
        let wallet_bytes = encode_wallets(touched)?;
        let head_bytes = head.to_bytes();

        (&self.blocks, &self.wallets, &self.meta)
            .transaction(|(blocks, wallets, meta)| {
                blocks.insert(&block_key(head.index)[..], block_bytes.as_slice())?;
                for (key, value) in &wallet_bytes {
                    wallets.insert(key.as_slice(), value.as_slice())?;
                }
                meta.insert(HEAD_KEY, head_bytes.as_slice())?;
                Ok(())
            })
            .map_err(storage_error)?;

        debug!("Committed block {} to {}", head.index, self.path.display());
        Ok(head)
    }

    /// Rewrites this store so that blocks `0..=base` stay, every later block
    /// comes from `blocks`, and the wallet set equals `wallets` exactly.
    pub fn replace_state(&self, base: u64, blocks: &[Block], wallets: &[Wallet]) -> Result<()> {
        let head = match blocks.last() {
            Some(block) => ChainHead::of(block),
            None => {
                let base_block = self.get_block(base)?.ok_or_else(|| {
                    NodeError::Invariant(format!("Base block {base} is missing"))
                })?;
                ChainHead::of(&base_block)
            }
        };

        let stale_blocks = self
            .blocks
            .range(block_key(base + 1)..)
            .keys()
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let stale_wallets = self
            .wallets
            .iter()
            .keys()
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let new_blocks = blocks
            .iter()
            .map(|b| Ok((block_key(b.get_index()), b.encode()?)))
            .collect::<Result<Vec<_>>>()?;
        let new_wallets = encode_wallets(wallets)?;
        let head_bytes = head.to_bytes();

        (&self.blocks, &self.wallets, &self.meta)
            .transaction(|(tx_blocks, tx_wallets, meta)| {
                for key in &stale_blocks {
                    tx_blocks.remove(key.clone())?;
                }
                for (key, value) in &new_blocks {
                    tx_blocks.insert(&key[..], value.as_slice())?;
                }
                for key in &stale_wallets {
                    tx_wallets.remove(key.clone())?;
                }
                for (key, value) in &new_wallets {
                    tx_wallets.insert(key.as_slice(), value.as_slice())?;
                }
                meta.insert(HEAD_KEY, head_bytes.as_slice())?;
                Ok(())
            })
            .map_err(storage_error)?;
        Ok(())
    }

    /// Seeds an empty store with `parent`'s blocks `0..=base` and the given
    /// wallet set. Copies go through the database, never through its files.
    pub fn seed_from(
        &self,
        parent: &ChainStore,
        base: u64,
        wallets: &[Wallet],
    ) -> Result<ChainHead> {
        let mut head = None;
        let mut batch = sled::Batch::default();
        for item in parent.blocks.range(..=block_key(base)) {
            let (key, bytes) = item?;
            head = Some(ChainHead::of(&Block::decode(&bytes)?));
            batch.insert(key, bytes);
        }
        let head = head
            .filter(|h| h.index == base)
            .ok_or_else(|| NodeError::Invariant(format!("Parent has no block {base}")))?;
        self.blocks.apply_batch(batch)?;
        self.put_wallets(wallets)?;
        self.meta.insert(HEAD_KEY, head.to_bytes())?;
        self.flush()?;
        Ok(head)
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

fn encode_wallets(wallets: &[Wallet]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
    wallets
        .iter()
        .map(|w| Ok((w.get_owner().get_raw().to_vec(), w.encode()?)))
        .collect()
}

fn storage_error(err: TransactionError<NodeError>) -> NodeError {
    let err = NodeError::from(err);
    error!("Chain store transaction failed: {err}");
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigUint;
    use tempfile::TempDir;

    fn open_temp() -> Result<(TempDir, ChainStore)> {
        let dir = TempDir::new()?;
        let store = ChainStore::open(dir.path().join("main"))?;
        Ok((dir, store))
    }

    fn child_block(parent: &Block) -> Result<Block> {
        Block::new(
            parent.get_index() + 1,
            parent.get_slot_index() + 1,
            *parent.get_hash(),
            parent.get_timestamp() + 1,
            Address::default(),
            Vec::new(),
            Vec::new(),
        )
    }

    #[test]
    fn test_absent_wallet_reads_empty() -> Result<()> {
        let (_dir, store) = open_temp()?;
        let address = Address::from_public_key(b"nobody");
        assert_eq!(store.get_wallet(&address)?, Wallet::empty(address));
        assert!(store.get_head()?.is_none());
        Ok(())
    }

    #[test]
    fn test_commit_block_updates_everything() -> Result<()> {
        let (_dir, store) = open_temp()?;
        let genesis = Block::genesis(0)?;
        let owner = Address::from_public_key(b"owner");
        let wallet = Wallet::new(owner, BigUint::from(5u32), 1);

        let head = store.commit_block(&genesis, &[wallet.clone()])?;
        assert_eq!(head, ChainHead::of(&genesis));
        assert_eq!(store.get_head()?, Some(head));
        assert_eq!(store.get_block(0)?, Some(genesis));
        assert_eq!(store.get_wallet(&owner)?, wallet);
        Ok(())
    }

    #[test]
    fn test_get_blocks_range() -> Result<()> {
        let (_dir, store) = open_temp()?;
        let mut block = Block::genesis(0)?;
        store.commit_block(&block, &[])?;
        for _ in 0..4 {
            block = child_block(&block)?;
            store.commit_block(&block, &[])?;
        }

        let range = store.get_blocks(2, 2)?;
        assert_eq!(
            range.iter().map(Block::get_index).collect::<Vec<_>>(),
            vec![2, 3]
        );
        assert!(store.get_blocks(10, 5)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_seed_and_replace() -> Result<()> {
        let dir = TempDir::new()?;
        let main = ChainStore::open(dir.path().join("main"))?;
        let genesis = Block::genesis(0)?;
        let first = child_block(&genesis)?;
        let second = child_block(&first)?;
        main.commit_block(&genesis, &[])?;
        main.commit_block(&first, &[])?;
        main.commit_block(&second, &[])?;

        let owner = Address::from_public_key(b"owner");
        let fork = ChainStore::open(dir.path().join("fork"))?;
        let seeded = fork.seed_from(&main, 1, &[Wallet::new(owner, BigUint::from(9u32), 0)])?;
        assert_eq!(seeded, ChainHead::of(&first));
        assert!(fork.get_block(2)?.is_none());

        main.replace_state(
            0,
            &[first.clone()],
            &[Wallet::new(owner, BigUint::from(3u32), 0)],
        )?;
        assert_eq!(main.get_head()?, Some(ChainHead::of(&first)));
        assert!(main.get_block(2)?.is_none());
        assert_eq!(main.get_all_wallets()?.len(), 1);
        assert_eq!(main.get_wallet(&owner)?.get_balance(), &BigUint::from(3u32));
        Ok(())
    }
}
