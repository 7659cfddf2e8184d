use crate::config::Config;
use crate::consensus::{RoundRobinSchedule, SlotSchedule};
use crate::core::{Block, Blockchain, Transaction, MAIN_CHAIN};
use crate::error::Result;
use crate::network::ConnectionRegistry;
use crate::storage::{ChainHead, MemoryPool};
use crate::verification::{filter_valid_transactions, verify_transaction, ChainTarget, VCode};
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// What became of a transaction handed to the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accepted,
    /// Already pooled, nothing to relay
    Duplicate,
    Rejected(VCode),
}

/// Everything one node instance owns. Connections and tasks hold an `Arc`
/// to it; nothing here is global, so several nodes can share a process.
pub struct NodeContext {
    config: Config,
    blockchain: RwLock<Blockchain>,
    mempool: MemoryPool,
    connections: ConnectionRegistry,
    schedule: Arc<dyn SlotSchedule>,
    local_port: AtomicU16,
}

impl NodeContext {
    pub fn new(config: Config, blockchain: Blockchain, schedule: Arc<dyn SlotSchedule>) -> Self {
        let connections = ConnectionRegistry::new(config.network.max_connections);
        let local_port = AtomicU16::new(config.network.port);
        Self {
            config,
            blockchain: RwLock::new(blockchain),
            mempool: MemoryPool::new(),
            connections,
            schedule,
            local_port,
        }
    }

    /// Opens the chain stores named by `config` and a round-robin schedule
    /// over its minter list.
    pub fn open(config: Config) -> Result<Arc<NodeContext>> {
        let blockchain = Blockchain::open(
            config.get_chain_dir(),
            &config.get_genesis_allocations()?,
            config.consensus.genesis_time_ms,
        )?;
        let schedule = Arc::new(RoundRobinSchedule::new(
            config.consensus.genesis_time_ms,
            config.consensus.slot_duration_ms,
            config.get_minters()?,
        ));
        Ok(Arc::new(NodeContext::new(config, blockchain, schedule)))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn blockchain(&self) -> &RwLock<Blockchain> {
        &self.blockchain
    }

    pub fn mempool(&self) -> &MemoryPool {
        &self.mempool
    }

    pub fn connections(&self) -> &ConnectionRegistry {
        &self.connections
    }

    pub fn schedule(&self) -> &dyn SlotSchedule {
        self.schedule.as_ref()
    }

    /// Port announced in STATUS.
    pub fn get_local_port(&self) -> u16 {
        self.local_port.load(Ordering::Relaxed)
    }

    pub fn set_local_port(&self, port: u16) {
        self.local_port.store(port, Ordering::Relaxed);
    }

    pub async fn get_main_head(&self) -> Result<ChainHead> {
        self.blockchain.read().await.get_main_head()
    }

    /// Checks `tx` against main's wallets with the sender's already pooled
    /// transactions applied, then pools it.
    pub async fn receive_transaction(&self, tx: Transaction) -> Admission {
        if self.mempool.contains(tx.get_txid()) {
            return Admission::Duplicate;
        }

        let status = {
            let blockchain = self.blockchain.read().await;
            match blockchain.wallet_view(&ChainTarget::extend(MAIN_CHAIN)) {
                Ok(mut wallets) => {
                    let pooled = self
                        .mempool
                        .get_all()
                        .into_iter()
                        .filter(|p| p.get_sender_address() == tx.get_sender_address())
                        .collect();
                    filter_valid_transactions(pooled, &mut wallets);
                    verify_transaction(Some(&tx), &wallets)
                }
                Err(e) => {
                    error!("Cannot read main wallets: {e}");
                    VCode::InternalError
                }
            }
        };

        if !status.is_success() {
            debug!("Transaction {} rejected: {status}", tx.get_txid());
            return Admission::Rejected(status);
        }
        let txid = *tx.get_txid();
        if self.mempool.add(tx) {
            info!("Transaction {txid} added to the memory pool");
            Admission::Accepted
        } else {
            Admission::Duplicate
        }
    }

    /// Verifies and executes `block` under the chain write lock. Its slot is
    /// marked filled only when the block ends up at main's head and came
    /// from the minter assigned to that slot.
    pub async fn receive_block(&self, block: &Block) -> Result<VCode> {
        let (status, on_main) = {
            let mut blockchain = self.blockchain.write().await;
            let status = blockchain.submit_block(block, &self.mempool)?;
            let on_main = status.is_success()
                && &blockchain.get_main_head()?.hash == block.get_hash();
            (status, on_main)
        };
        if !status.is_success() {
            warn!("Block {} rejected: {status}", block.get_index());
            return Ok(status);
        }

        let slot = block.get_slot_index();
        if on_main && &self.schedule.minter_for(slot) == block.get_minter() {
            self.schedule.mark_filled(slot, *block.get_hash());
        } else {
            debug!(
                "Block {} does not fill slot {slot}: off main or not from its minter",
                block.get_index()
            );
        }
        Ok(status)
    }
}
