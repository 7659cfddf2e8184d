//! Chain state machine tests through the public API: transfers, replay,
//! fork creation and fork promotion.

use meridian_node::core::{Address, Block, Blockchain, Transaction, MAIN_CHAIN};
use meridian_node::storage::MemoryPool;
use meridian_node::{Credentials, Result, VCode};
use num_bigint::BigUint;
use tempfile::TempDir;

fn open_funded(funded: &[&Credentials]) -> Result<(TempDir, Blockchain)> {
    let dir = TempDir::new()?;
    let genesis: Vec<(Address, BigUint)> = funded
        .iter()
        .map(|c| (c.get_address(), BigUint::from(100u32)))
        .collect();
    let blockchain = Blockchain::open(dir.path().join("blockchain_data"), &genesis, 0)?;
    Ok((dir, blockchain))
}

/// Child of block `parent_index` on `chain`, with `salt` added to the
/// timestamp so siblings hash differently.
fn child_of(
    blockchain: &Blockchain,
    chain: &str,
    parent_index: u64,
    salt: u64,
    transactions: Vec<Transaction>,
) -> Result<Block> {
    let parent = blockchain
        .get_block(chain, parent_index)?
        .expect("parent block exists");
    Block::new(
        parent_index + 1,
        parent.get_slot_index() + 1,
        *parent.get_hash(),
        parent.get_timestamp() + 1 + salt,
        Address::default(),
        Vec::new(),
        transactions,
    )
}

fn transfer(sender: &Credentials, to: Address, amount: u32, nonce: u64) -> Result<Transaction> {
    Transaction::new_signed(sender, to, BigUint::from(amount), nonce, Vec::new())
}

#[test]
fn test_transfer_then_replay() -> Result<()> {
    let alice = Credentials::generate()?;
    let bob = Address::from_public_key(b"bob");
    let (_dir, mut blockchain) = open_funded(&[&alice])?;
    let mempool = MemoryPool::new();

    let tx = transfer(&alice, bob, 40, 0)?;
    mempool.add(tx.clone());
    let block = child_of(&blockchain, MAIN_CHAIN, 0, 0, vec![tx.clone()])?;
    assert_eq!(blockchain.submit_block(&block, &mempool)?, VCode::Success);
    assert!(mempool.is_empty());

    assert_eq!(
        blockchain.get_wallet(MAIN_CHAIN, &alice.get_address())?.get_balance(),
        &BigUint::from(60u32)
    );
    assert_eq!(
        blockchain.get_wallet(MAIN_CHAIN, &bob)?.get_balance(),
        &BigUint::from(40u32)
    );

    // the same transfer in a new block carries a stale nonce
    let replay = child_of(&blockchain, MAIN_CHAIN, 1, 0, vec![tx])?;
    assert_eq!(blockchain.submit_block(&replay, &mempool)?, VCode::BlockBadTx);
    assert_eq!(blockchain.get_main_head()?.index, 1);

    assert_eq!(blockchain.submit_block(&block, &mempool)?, VCode::BlockKnown);
    Ok(())
}

#[test]
fn test_fork_grows_and_replaces_main() -> Result<()> {
    let alice = Credentials::generate()?;
    let bob = Address::from_public_key(b"bob");
    let carol = Address::from_public_key(b"carol");
    let (dir, mut blockchain) = open_funded(&[&alice])?;
    let mempool = MemoryPool::new();

    let pays_bob = transfer(&alice, bob, 10, 0)?;
    let main_one = child_of(&blockchain, MAIN_CHAIN, 0, 0, vec![pays_bob.clone()])?;
    assert_eq!(blockchain.submit_block(&main_one, &mempool)?, VCode::Success);

    // a sibling of block 1 opens a fork from genesis
    let pays_carol = transfer(&alice, carol, 25, 0)?;
    let fork_one = child_of(&blockchain, MAIN_CHAIN, 0, 7, vec![pays_carol])?;
    assert_eq!(blockchain.submit_block(&fork_one, &mempool)?, VCode::Success);
    assert_eq!(blockchain.get_main_head()?.hash, *main_one.get_hash());

    let names = blockchain.chain_names();
    assert_eq!(names.len(), 2);
    let fork = names[1].clone();
    assert!(fork.starts_with("fork-"));
    assert_eq!(
        blockchain.get_wallet(&fork, &alice.get_address())?.get_balance(),
        &BigUint::from(75u32)
    );
    assert_eq!(
        blockchain.get_wallet(&fork, &bob)?.get_balance(),
        &BigUint::from(0u32)
    );

    // one more block makes the fork longer than main
    let fork_two = child_of(&blockchain, &fork, 1, 0, Vec::new())?;
    assert_eq!(blockchain.submit_block(&fork_two, &mempool)?, VCode::Success);

    assert_eq!(blockchain.chain_names(), vec![MAIN_CHAIN.to_string()]);
    assert_eq!(blockchain.get_main_head()?.hash, *fork_two.get_hash());
    assert_eq!(
        blockchain.get_wallet(MAIN_CHAIN, &carol)?.get_balance(),
        &BigUint::from(25u32)
    );
    assert_eq!(
        blockchain.get_wallet(MAIN_CHAIN, &bob)?.get_balance(),
        &BigUint::from(0u32)
    );
    // the displaced transfer reused a nonce the fork spent, so it is not pooled again
    assert!(!mempool.contains(pays_bob.get_txid()));
    assert!(mempool.is_empty());
    assert!(!dir.path().join("blockchain_data").join("forks").join(&fork).exists());
    Ok(())
}

#[test]
fn test_state_survives_reopen() -> Result<()> {
    let alice = Credentials::generate()?;
    let dir = TempDir::new()?;
    let root = dir.path().join("blockchain_data");
    let genesis = vec![(alice.get_address(), BigUint::from(100u32))];

    let head = {
        let mut blockchain = Blockchain::open(&root, &genesis, 0)?;
        let tx = transfer(&alice, Address::default(), 1, 0)?;
        let block = child_of(&blockchain, MAIN_CHAIN, 0, 0, vec![tx])?;
        assert_eq!(
            blockchain.submit_block(&block, &MemoryPool::new())?,
            VCode::Success
        );
        blockchain.get_main_head()?
    };

    let blockchain = Blockchain::open(&root, &genesis, 0)?;
    assert_eq!(blockchain.get_main_head()?, head);
    let wallet = blockchain.get_wallet(MAIN_CHAIN, &alice.get_address())?;
    assert_eq!(wallet.get_balance(), &BigUint::from(99u32));
    assert_eq!(wallet.get_nonce(), 1);
    Ok(())
}
