// The blockchain keeps one sled store per chain: main plus any forks that
// branched off within the last MAX_FORK_DEPTH blocks. Verification decides
// where a block goes, this module moves it there and keeps the chainstate
// registry in step with every head change.

use crate::core::{Address, Block, Transaction, Wallet};
use crate::error::{NodeError, Result};
use crate::storage::{ChainHead, ChainMeta, ChainStateRegistry, ChainStore, MemoryPool};
use crate::verification::{verify_block, BlockValidationResult, ChainTarget, VCode, WalletOverlay};
use log::{debug, error, info, warn};
use num_bigint::BigUint;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

pub const MAIN_CHAIN: &str = "main";

// how far below a chain head a new fork may branch, and how far a fork may
// fall behind main before it is pruned
pub const MAX_FORK_DEPTH: u64 = 16;

pub const MAX_BLOCKS_PER_REQUEST: usize = 512;

const FORKS_DIR: &str = "forks";
const CHAINSTATE_DIR: &str = "chainstate";

struct Chain {
    store: ChainStore,
    meta: ChainMeta,
    halted: bool,
}

pub struct Blockchain {
    root: PathBuf,
    registry: ChainStateRegistry,
    chains: HashMap<String, Chain>,
}

impl Blockchain {
    /// Opens every chain under `root`. A fresh directory gets the genesis
    /// allocations and the genesis block on main.
    pub fn open(
        root: impl AsRef<Path>,
        genesis: &[(Address, BigUint)],
        genesis_time_ms: u64,
    ) -> Result<Blockchain> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        let registry = ChainStateRegistry::open(root.join(CHAINSTATE_DIR))?;

        let main_store = ChainStore::open(root.join(MAIN_CHAIN))?;
        let main_head = match main_store.get_head()? {
            Some(head) => head,
            None => {
                let allocations = genesis
                    .iter()
                    .map(|(address, balance)| Wallet::new(*address, balance.clone(), 0))
                    .collect::<Vec<_>>();
                main_store.put_wallets(&allocations)?;
                let block = Block::genesis(genesis_time_ms)?;
                let head = main_store.commit_block(&block, &[])?;
                main_store.flush()?;
                info!(
                    "Created genesis block {} with {} allocations",
                    block.get_hash(),
                    allocations.len()
                );
                head
            }
        };
        let genesis_block = main_store.get_block(0)?.ok_or_else(|| {
            error!("Main chain has a head but no genesis block");
            NodeError::Invariant("Missing genesis block".to_string())
        })?;
        let main_meta = ChainMeta {
            name: MAIN_CHAIN.to_string(),
            parent: MAIN_CHAIN.to_string(),
            base: ChainHead::of(&genesis_block),
            head: main_head,
        };
        registry.put(&main_meta)?;

        let mut chains = HashMap::new();
        chains.insert(
            MAIN_CHAIN.to_string(),
            Chain {
                store: main_store,
                meta: main_meta,
                halted: false,
            },
        );

        for mut meta in registry.list()? {
            if meta.name == MAIN_CHAIN {
                continue;
            }
            let path = root.join(FORKS_DIR).join(&meta.name);
            if !path.exists() {
                warn!("Fork {} has no store on disk, forgetting it", meta.name);
                registry.remove(&meta.name)?;
                continue;
            }
            let store = ChainStore::open(&path)?;
            match store.get_head()? {
                Some(head) => {
                    if head != meta.head {
                        warn!("Registry head of {} was stale, using the store's", meta.name);
                        meta.head = head;
                        registry.put(&meta)?;
                    }
                }
                None => {
                    warn!("Fork {} store is empty, forgetting it", meta.name);
                    registry.remove(&meta.name)?;
                    continue;
                }
            }
            info!("Reopened fork {} at height {}", meta.name, meta.head.index);
            chains.insert(
                meta.name.clone(),
                Chain {
                    store,
                    meta,
                    halted: false,
                },
            );
        }
        remove_orphaned_forks(&root.join(FORKS_DIR), &chains)?;

        Ok(Blockchain {
            root,
            registry,
            chains,
        })
    }

    pub fn get_root(&self) -> &Path {
        &self.root
    }

    fn chain(&self, name: &str) -> Result<&Chain> {
        self.chains.get(name).ok_or_else(|| {
            error!("Chain {name} is not registered");
            NodeError::Invariant(format!("Unknown chain {name}"))
        })
    }

    fn chain_mut(&mut self, name: &str) -> Result<&mut Chain> {
        self.chains.get_mut(name).ok_or_else(|| {
            error!("Chain {name} is not registered");
            NodeError::Invariant(format!("Unknown chain {name}"))
        })
    }

    /// Chain names with main first, forks in name order.
    pub fn chain_names(&self) -> Vec<String> {
        let mut forks: Vec<String> = self
            .chains
            .keys()
            .filter(|name| name.as_str() != MAIN_CHAIN)
            .cloned()
            .collect();
        forks.sort();
        let mut names = vec![MAIN_CHAIN.to_string()];
        names.extend(forks);
        names
    }

    pub fn get_chain_meta(&self, name: &str) -> Option<&ChainMeta> {
        self.chains.get(name).map(|chain| &chain.meta)
    }

    pub fn get_head(&self, name: &str) -> Result<ChainHead> {
        Ok(self.chain(name)?.meta.head)
    }

    pub fn get_main_head(&self) -> Result<ChainHead> {
        self.get_head(MAIN_CHAIN)
    }

    pub fn is_halted(&self, name: &str) -> bool {
        self.chains.get(name).map_or(false, |chain| chain.halted)
    }

    pub fn get_block(&self, name: &str, index: u64) -> Result<Option<Block>> {
        self.chain(name)?.store.get_block(index)
    }

    /// The block at main's head.
    pub fn get_main_tip(&self) -> Result<Block> {
        let head = self.get_main_head()?;
        self.get_block(MAIN_CHAIN, head.index)?.ok_or_else(|| {
            error!("Main head {} points at a missing block", head.index);
            NodeError::Invariant(format!("Missing main block {}", head.index))
        })
    }

    pub fn get_wallet(&self, name: &str, address: &Address) -> Result<Wallet> {
        self.chain(name)?.store.get_wallet(address)
    }

    pub fn get_wallets(&self, name: &str) -> Result<Vec<Wallet>> {
        self.chain(name)?.store.get_all_wallets()
    }

    /// Up to `count` main-chain blocks from `start`, capped per request.
    pub fn blocks_range(&self, start: u64, count: usize) -> Result<Vec<Block>> {
        self.chain(MAIN_CHAIN)?
            .store
            .get_blocks(start, count.min(MAX_BLOCKS_PER_REQUEST))
    }

    /// Works out which chain `block` belongs to, without looking at its
    /// hash or transactions.
    pub fn match_chainstate(&self, block: &Block) -> std::result::Result<ChainTarget, VCode> {
        let names = self.chain_names();
        let index = block.get_index();
        let previous = block.get_previous_hash();

        let internal = |e: NodeError| {
            error!("Chainstate lookup failed: {e}");
            VCode::InternalError
        };

        for name in &names {
            let chain = self.chain(name).map_err(internal)?;
            if index <= chain.meta.head.index {
                if let Some(stored) = chain.store.get_block(index).map_err(internal)? {
                    if stored.get_hash() == block.get_hash() {
                        return Err(VCode::BlockKnown);
                    }
                }
            }
        }

        // main always holds a genesis block once opened
        if index == 0 {
            return Err(VCode::ChainstateMismatch);
        }

        for name in &names {
            let head = self.chain(name).map_err(internal)?.meta.head;
            if index == head.index + 1 && previous == &head.hash {
                return Ok(ChainTarget::extend(name));
            }
        }

        let base = index - 1;
        for name in &names {
            let chain = self.chain(name).map_err(internal)?;
            let head = chain.meta.head.index;
            if index > head || head - base > MAX_FORK_DEPTH {
                continue;
            }
            // below a fork's base the ancestor chain holds the same block
            if name != MAIN_CHAIN && base <= chain.meta.base.index {
                continue;
            }
            match chain.store.get_block(base).map_err(internal)? {
                Some(parent) if parent.get_hash() == previous => {
                    return Ok(ChainTarget {
                        target_chain: fork_name(block),
                        parent_chain: name.clone(),
                        fork_base: Some(base),
                    });
                }
                _ => {}
            }
        }

        Err(VCode::ChainstateMismatch)
    }

    /// Wallets of the chain a block lands on. For a fork that does not
    /// exist yet this is the parent's wallet set rewound to the fork base.
    pub fn wallet_view(&self, target: &ChainTarget) -> Result<WalletOverlay<'_>> {
        let Some(base) = target.fork_base else {
            return Ok(WalletOverlay::new(&self.chain(&target.target_chain)?.store));
        };

        let parent = self.chain(&target.parent_chain)?;
        let mut overlay = WalletOverlay::new(&parent.store);
        for index in (base + 1..=parent.meta.head.index).rev() {
            let block = parent.store.get_block(index)?.ok_or_else(|| {
                error!("{} is missing block {index}", target.parent_chain);
                NodeError::Invariant(format!("Missing block {index} on {}", target.parent_chain))
            })?;
            for tx in block.get_transactions().iter().rev() {
                overlay.revert(tx)?;
            }
        }
        Ok(overlay)
    }

    /// Verifies `block` and, when valid, executes it.
    pub fn submit_block(&mut self, block: &Block, mempool: &MemoryPool) -> Result<VCode> {
        match verify_block(Some(block), self) {
            BlockValidationResult::Valid(target) => {
                self.execute_block(block, &target, mempool)?;
                Ok(VCode::Success)
            }
            BlockValidationResult::Invalid(code) => Ok(code),
        }
    }

    /// Applies a verified block to its target chain, then runs fork choice.
    pub fn execute_block(
        &mut self,
        block: &Block,
        target: &ChainTarget,
        mempool: &MemoryPool,
    ) -> Result<ChainHead> {
        if let Some(base) = target.fork_base {
            self.create_fork(&target.target_chain, &target.parent_chain, base)?;
        }

        if self.is_halted(&target.target_chain) {
            return Err(NodeError::ChainHalted(target.target_chain.clone()));
        }
        let chain = self.chain(&target.target_chain)?;
        let committed = apply_and_commit(&chain.store, block);

        let chain = self.chain_mut(&target.target_chain)?;
        let head = match committed {
            Ok(head) => head,
            Err(e) => {
                error!(
                    "Failed to commit block {} to {}, halting the chain: {e}",
                    block.get_index(),
                    target.target_chain
                );
                chain.halted = true;
                return Err(e);
            }
        };
        chain.meta.head = head;
        let meta = chain.meta.clone();
        self.registry.put(&meta)?;
        info!(
            "Block {} accepted on {} ({} transactions)",
            head.index,
            target.target_chain,
            block.get_transactions().len()
        );

        if target.target_chain == MAIN_CHAIN {
            mempool.remove_all(block.get_transactions());
            self.evict_stale(mempool)?;
        } else if head.index > self.get_main_head()?.index {
            self.promote(&target.target_chain, mempool)?;
            self.evict_stale(mempool)?;
        }
        self.prune_forks()?;
        Ok(head)
    }

    // Materialises fork `name` as a copy of `parent` up to `base`, with the
    // parent's wallets rewound to that block.
    fn create_fork(&mut self, name: &str, parent: &str, base: u64) -> Result<()> {
        let path = self.root.join(FORKS_DIR).join(name);
        if path.exists() {
            warn!("Removing leftover store for fork {name}");
            fs::remove_dir_all(&path)?;
        }

        let wallets = self
            .wallet_view(&ChainTarget {
                target_chain: name.to_string(),
                parent_chain: parent.to_string(),
                fork_base: Some(base),
            })?
            .full_set()?;
        let store = ChainStore::open(&path)?;
        let base_head = store.seed_from(&self.chain(parent)?.store, base, &wallets)?;

        let meta = ChainMeta {
            name: name.to_string(),
            parent: parent.to_string(),
            base: base_head,
            head: base_head,
        };
        self.registry.put(&meta)?;
        info!("Created fork {name} off {parent} at block {base}");
        self.chains.insert(
            name.to_string(),
            Chain {
                store,
                meta,
                halted: false,
            },
        );
        Ok(())
    }

    // The fork outgrew main: main takes over its blocks and wallets.
    fn promote(&mut self, name: &str, mempool: &MemoryPool) -> Result<()> {
        let fork = self.chain(name)?;
        let main = self.chain(MAIN_CHAIN)?;

        let mut divergence = fork.meta.base.index.min(main.meta.head.index);
        loop {
            let ours = main.store.get_block(divergence)?;
            let theirs = fork.store.get_block(divergence)?;
            match (ours, theirs) {
                (Some(a), Some(b)) if a.get_hash() == b.get_hash() => break,
                _ if divergence == 0 => {
                    error!("Fork {name} shares no block with main");
                    return Err(NodeError::Invariant(format!(
                        "Fork {name} does not share genesis with main"
                    )));
                }
                _ => divergence -= 1,
            }
        }

        let fork_head = fork.meta.head;
        let fork_blocks = fork
            .store
            .get_blocks(divergence + 1, (fork_head.index - divergence) as usize)?;
        let displaced = main.store.get_blocks(
            divergence + 1,
            (main.meta.head.index - divergence) as usize,
        )?;
        let wallets = fork.store.get_all_wallets()?;

        if let Err(e) = main.store.replace_state(divergence, &fork_blocks, &wallets) {
            error!("Failed to promote fork {name}, halting main: {e}");
            self.chain_mut(MAIN_CHAIN)?.halted = true;
            return Err(e);
        }

        let included: Vec<Transaction> = fork_blocks
            .iter()
            .flat_map(|b| b.get_transactions().iter().cloned())
            .collect();
        let included_ids: HashSet<_> = included.iter().map(|tx| *tx.get_txid()).collect();
        mempool.remove_all(&included);
        let mut returned = 0;
        for tx in displaced.iter().flat_map(|b| b.get_transactions()) {
            if !included_ids.contains(tx.get_txid()) && mempool.add(tx.clone()) {
                returned += 1;
            }
        }

        let main = self.chain_mut(MAIN_CHAIN)?;
        main.meta.head = fork_head;
        let main_meta = main.meta.clone();
        self.registry.put(&main_meta)?;
        info!(
            "Fork {name} promoted to main at height {} (diverged after {divergence}, {returned} transactions back in the pool)",
            fork_head.index
        );

        self.drop_chain(name)
    }

    // Drops pooled transactions whose nonce main has already used, whether
    // by that transaction or by another one from the same sender.
    fn evict_stale(&self, mempool: &MemoryPool) -> Result<()> {
        let store = &self.chain(MAIN_CHAIN)?.store;
        let mut nonces: HashMap<Address, u64> = HashMap::new();
        let mut stale = Vec::new();
        for tx in mempool.get_all() {
            let sender = *tx.get_sender_address();
            let nonce = match nonces.get(&sender) {
                Some(nonce) => *nonce,
                None => {
                    let nonce = store.get_wallet(&sender)?.get_nonce();
                    nonces.insert(sender, nonce);
                    nonce
                }
            };
            if tx.get_nonce() < nonce {
                stale.push(tx);
            }
        }
        if !stale.is_empty() {
            debug!("Evicting {} stale transactions from the memory pool", stale.len());
            mempool.remove_all(&stale);
        }
        Ok(())
    }

    fn prune_forks(&mut self) -> Result<()> {
        let main_head = self.get_main_head()?.index;
        let stale: Vec<String> = self
            .chains
            .values()
            .filter(|chain| chain.meta.name != MAIN_CHAIN)
            .filter(|chain| main_head > chain.meta.head.index + MAX_FORK_DEPTH)
            .map(|chain| chain.meta.name.clone())
            .collect();
        for name in stale {
            info!("Pruning fork {name}, too far behind main");
            self.drop_chain(&name)?;
        }
        Ok(())
    }

    // Forgets a fork and deletes its store. Forks built on it fall back to
    // main as their parent; their own stores already hold every block.
    fn drop_chain(&mut self, name: &str) -> Result<()> {
        let Some(chain) = self.chains.remove(name) else {
            return Ok(());
        };
        self.registry.remove(name)?;
        let path = chain.store.get_path().to_path_buf();
        drop(chain);
        if path.exists() {
            fs::remove_dir_all(&path)?;
        }

        for child in self.chains.values_mut() {
            if child.meta.parent == name {
                child.meta.parent = MAIN_CHAIN.to_string();
                self.registry.put(&child.meta)?;
            }
        }
        Ok(())
    }
}

// Fork directories nothing in the registry refers to, e.g. left behind by a
// crash between creating a store and recording it.
fn remove_orphaned_forks(forks_dir: &Path, chains: &HashMap<String, Chain>) -> Result<()> {
    if !forks_dir.exists() {
        return Ok(());
    }
    for entry in fs::read_dir(forks_dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if chains.contains_key(&name) {
            continue;
        }
        warn!("Removing fork directory {name}, it has no registry entry");
        let path = entry.path();
        if path.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

fn fork_name(block: &Block) -> String {
    let hex = block.get_hash().to_hex();
    format!("fork-{}", &hex[..16])
}

fn apply_and_commit(store: &ChainStore, block: &Block) -> Result<ChainHead> {
    let mut overlay = WalletOverlay::new(store);
    for tx in block.get_transactions() {
        overlay.apply(tx)?;
    }
    store.commit_block(block, &overlay.changed())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testnet::test_utils::{
        candidate_on, extend_main, funded_blockchain, signed_transfer, FUNDED_BALANCE,
    };
    use crate::wallet::Credentials;

    #[test]
    fn test_genesis_and_allocations() -> Result<()> {
        let sender = Credentials::generate()?;
        let (_dir, blockchain) = funded_blockchain(&[&sender])?;

        assert_eq!(blockchain.get_main_head()?.index, 0);
        assert!(blockchain.get_main_tip()?.is_genesis());
        assert_eq!(
            blockchain
                .get_wallet(MAIN_CHAIN, &sender.get_address())?
                .get_balance(),
            &BigUint::from(FUNDED_BALANCE)
        );
        assert_eq!(blockchain.chain_names(), vec![MAIN_CHAIN.to_string()]);
        Ok(())
    }

    #[test]
    fn test_extension_moves_funds_and_clears_mempool() -> Result<()> {
        let sender = Credentials::generate()?;
        let recipient = Address::from_public_key(b"recipient");
        let (_dir, mut blockchain) = funded_blockchain(&[&sender])?;
        let mempool = MemoryPool::new();

        let tx = signed_transfer(&sender, recipient, 40, 0)?;
        mempool.add(tx.clone());
        let block = candidate_on(&blockchain, MAIN_CHAIN, vec![tx])?;
        assert_eq!(blockchain.submit_block(&block, &mempool)?, VCode::Success);

        let sender_wallet = blockchain.get_wallet(MAIN_CHAIN, &sender.get_address())?;
        assert_eq!(sender_wallet.get_balance(), &BigUint::from(60u32));
        assert_eq!(sender_wallet.get_nonce(), 1);
        assert_eq!(
            blockchain.get_wallet(MAIN_CHAIN, &recipient)?.get_balance(),
            &BigUint::from(40u32)
        );
        assert!(mempool.is_empty());
        assert_eq!(blockchain.get_main_head()?, ChainHead::of(&block));
        Ok(())
    }

    #[test]
    fn test_fork_seeded_from_reverted_parent() -> Result<()> {
        let sender = Credentials::generate()?;
        let recipient = Address::from_public_key(b"recipient");
        let (_dir, mut blockchain) = funded_blockchain(&[&sender])?;

        extend_main(&mut blockchain, vec![signed_transfer(&sender, recipient, 10, 0)?])?;
        let at_fork_point = blockchain.get_wallets(MAIN_CHAIN)?;
        extend_main(&mut blockchain, vec![signed_transfer(&sender, recipient, 20, 1)?])?;
        extend_main(&mut blockchain, vec![signed_transfer(&sender, recipient, 30, 2)?])?;

        // a competing block at height 2 builds on block 1
        let parent = blockchain.get_block(MAIN_CHAIN, 1)?.ok_or_else(|| {
            NodeError::Invariant("missing block 1".to_string())
        })?;
        let competing = Block::new(
            2,
            parent.get_slot_index() + 7,
            *parent.get_hash(),
            parent.get_timestamp() + 1,
            Address::default(),
            Vec::new(),
            Vec::new(),
        )?;
        let target = blockchain
            .match_chainstate(&competing)
            .map_err(|code| NodeError::InvalidBlock(code.to_string()))?;
        assert_eq!(target.parent_chain, MAIN_CHAIN);
        assert_eq!(target.fork_base, Some(1));
        assert!(target.target_chain.starts_with("fork-"));

        blockchain.execute_block(&competing, &target, &MemoryPool::new())?;
        let mut fork_wallets = blockchain.get_wallets(&target.target_chain)?;
        fork_wallets.retain(|w| w.get_balance() != &BigUint::default() || w.get_nonce() != 0);
        assert_eq!(fork_wallets, at_fork_point);

        let meta = blockchain
            .get_chain_meta(&target.target_chain)
            .ok_or_else(|| NodeError::Invariant("fork not registered".to_string()))?;
        assert_eq!(meta.base.index, 1);
        assert_eq!(meta.head, ChainHead::of(&competing));
        assert_eq!(blockchain.get_main_head()?.index, 3);
        Ok(())
    }

    #[test]
    fn test_longer_fork_is_promoted() -> Result<()> {
        let sender = Credentials::generate()?;
        let recipient = Address::from_public_key(b"recipient");
        let (_dir, mut blockchain) = funded_blockchain(&[&sender])?;
        let mempool = MemoryPool::new();

        let displaced_tx = signed_transfer(&sender, recipient, 25, 0)?;
        extend_main(&mut blockchain, vec![displaced_tx.clone()])?;

        // fork off genesis and outgrow main by one block
        let genesis = blockchain.get_block(MAIN_CHAIN, 0)?.ok_or_else(|| {
            NodeError::Invariant("missing genesis".to_string())
        })?;
        let first = Block::new(
            1,
            3,
            *genesis.get_hash(),
            genesis.get_timestamp() + 5,
            Address::default(),
            Vec::new(),
            Vec::new(),
        )?;
        assert_eq!(blockchain.submit_block(&first, &mempool)?, VCode::Success);
        let fork = fork_name(&first);
        assert_eq!(blockchain.chain_names().len(), 2);

        let second = candidate_on(&blockchain, &fork, Vec::new())?;
        assert_eq!(blockchain.submit_block(&second, &mempool)?, VCode::Success);

        assert_eq!(blockchain.chain_names(), vec![MAIN_CHAIN.to_string()]);
        assert_eq!(blockchain.get_main_head()?, ChainHead::of(&second));
        assert_eq!(blockchain.get_block(MAIN_CHAIN, 1)?, Some(first));
        assert_eq!(
            blockchain
                .get_wallet(MAIN_CHAIN, &sender.get_address())?
                .get_balance(),
            &BigUint::from(FUNDED_BALANCE)
        );
        assert!(mempool.contains(displaced_tx.get_txid()));
        assert!(!blockchain.get_root().join(FORKS_DIR).join(&fork).exists());
        Ok(())
    }

    #[test]
    fn test_used_nonce_evicts_pooled_rival() -> Result<()> {
        let sender = Credentials::generate()?;
        let (_dir, mut blockchain) = funded_blockchain(&[&sender])?;
        let mempool = MemoryPool::new();

        let pooled = signed_transfer(&sender, Address::from_public_key(b"first"), 10, 0)?;
        let later = signed_transfer(&sender, Address::from_public_key(b"first"), 10, 1)?;
        mempool.add(pooled.clone());
        mempool.add(later.clone());

        // same sender and nonce, different recipient
        let rival = signed_transfer(&sender, Address::from_public_key(b"second"), 10, 0)?;
        let block = candidate_on(&blockchain, MAIN_CHAIN, vec![rival])?;
        assert_eq!(blockchain.submit_block(&block, &mempool)?, VCode::Success);

        assert!(!mempool.contains(pooled.get_txid()));
        assert!(mempool.contains(later.get_txid()));
        assert_eq!(mempool.len(), 1);
        Ok(())
    }

    #[test]
    fn test_promotion_drops_displaced_transactions_the_fork_spent() -> Result<()> {
        let sender = Credentials::generate()?;
        let (_dir, mut blockchain) = funded_blockchain(&[&sender])?;
        let mempool = MemoryPool::new();

        let displaced = signed_transfer(&sender, Address::from_public_key(b"main"), 5, 0)?;
        extend_main(&mut blockchain, vec![displaced.clone()])?;

        let genesis = blockchain
            .get_block(MAIN_CHAIN, 0)?
            .ok_or_else(|| NodeError::Invariant("missing genesis".to_string()))?;
        let spent_on_fork = signed_transfer(&sender, Address::from_public_key(b"fork"), 5, 0)?;
        let first = Block::new(
            1,
            4,
            *genesis.get_hash(),
            genesis.get_timestamp() + 9,
            Address::default(),
            Vec::new(),
            vec![spent_on_fork],
        )?;
        assert_eq!(blockchain.submit_block(&first, &mempool)?, VCode::Success);
        let second = candidate_on(&blockchain, &fork_name(&first), Vec::new())?;
        assert_eq!(blockchain.submit_block(&second, &mempool)?, VCode::Success);

        assert_eq!(blockchain.get_main_head()?, ChainHead::of(&second));
        assert!(!mempool.contains(displaced.get_txid()));
        assert!(mempool.is_empty());
        Ok(())
    }

    #[test]
    fn test_failed_commit_halts_the_chain() -> Result<()> {
        let sender = Credentials::generate()?;
        let recipient = Address::from_public_key(b"recipient");
        let (_dir, mut blockchain) = funded_blockchain(&[&sender])?;
        let mempool = MemoryPool::new();

        // skips verification, so the overdraft only surfaces while applying
        let overdraft = signed_transfer(&sender, recipient, FUNDED_BALANCE + 1, 0)?;
        let bad = candidate_on(&blockchain, MAIN_CHAIN, vec![overdraft])?;
        assert!(blockchain
            .execute_block(&bad, &ChainTarget::extend(MAIN_CHAIN), &mempool)
            .is_err());
        assert!(blockchain.is_halted(MAIN_CHAIN));
        assert_eq!(blockchain.get_main_head()?.index, 0);

        let good = candidate_on(
            &blockchain,
            MAIN_CHAIN,
            vec![signed_transfer(&sender, recipient, 1, 0)?],
        )?;
        match blockchain.submit_block(&good, &mempool) {
            Err(NodeError::ChainHalted(name)) => assert_eq!(name, MAIN_CHAIN),
            other => panic!("expected a halted chain, got {other:?}"),
        }
        assert_eq!(blockchain.get_main_head()?.index, 0);
        Ok(())
    }

    #[test]
    fn test_fork_too_deep_is_rejected() -> Result<()> {
        let (_dir, mut blockchain) = funded_blockchain(&[])?;
        for _ in 0..(MAX_FORK_DEPTH + 1) {
            extend_main(&mut blockchain, Vec::new())?;
        }
        let genesis = blockchain
            .get_block(MAIN_CHAIN, 0)?
            .ok_or_else(|| NodeError::Invariant("missing genesis".to_string()))?;
        let late = Block::new(
            1,
            99,
            *genesis.get_hash(),
            1,
            Address::default(),
            Vec::new(),
            Vec::new(),
        )?;
        assert_eq!(
            blockchain.match_chainstate(&late),
            Err(VCode::ChainstateMismatch)
        );
        Ok(())
    }

    #[test]
    fn test_forks_survive_reopen() -> Result<()> {
        let (dir, mut blockchain) = funded_blockchain(&[])?;
        extend_main(&mut blockchain, Vec::new())?;
        extend_main(&mut blockchain, Vec::new())?;
        let parent = blockchain
            .get_block(MAIN_CHAIN, 1)?
            .ok_or_else(|| NodeError::Invariant("missing block 1".to_string()))?;
        let competing = Block::new(
            2,
            50,
            *parent.get_hash(),
            parent.get_timestamp() + 1,
            Address::default(),
            Vec::new(),
            Vec::new(),
        )?;
        assert_eq!(
            blockchain.submit_block(&competing, &MemoryPool::new())?,
            VCode::Success
        );
        let names = blockchain.chain_names();
        let root = blockchain.get_root().to_path_buf();
        drop(blockchain);

        let reopened = Blockchain::open(&root, &[], 0)?;
        assert_eq!(reopened.chain_names(), names);
        assert_eq!(reopened.get_head(&names[1])?, ChainHead::of(&competing));
        drop(dir);
        Ok(())
    }

    #[test]
    fn test_reopen_removes_unregistered_fork_dirs() -> Result<()> {
        let (_dir, blockchain) = funded_blockchain(&[])?;
        let root = blockchain.get_root().to_path_buf();
        drop(blockchain);

        let stray = root.join(FORKS_DIR).join("fork-0000000000000000");
        ChainStore::open(&stray)?.flush()?;
        assert!(stray.exists());

        let reopened = Blockchain::open(&root, &[], 0)?;
        assert!(!stray.exists());
        assert_eq!(reopened.chain_names(), vec![MAIN_CHAIN.to_string()]);
        Ok(())
    }

    #[test]
    fn test_blocks_range_is_capped() -> Result<()> {
        let (_dir, mut blockchain) = funded_blockchain(&[])?;
        extend_main(&mut blockchain, Vec::new())?;
        extend_main(&mut blockchain, Vec::new())?;
        let blocks = blockchain.blocks_range(1, usize::MAX)?;
        assert_eq!(
            blocks.iter().map(Block::get_index).collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert!(blockchain.blocks_range(3, 10)?.is_empty());
        Ok(())
    }
}
