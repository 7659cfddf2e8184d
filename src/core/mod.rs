//! Core ledger objects and the chain state machine
//!
//! Blocks, transactions, attestations and wallets are defined here together
//! with their wire schemas. `blockchain` ties them to storage and decides
//! which chain a verified block lands on.

pub mod address;
pub mod attestation;
pub mod block;
pub mod blockchain;
pub mod transaction;
pub mod wallet;

pub use address::{Address, ADDRESS_LENGTH};
pub use attestation::Attestation;
pub use block::Block;
pub use blockchain::{Blockchain, MAIN_CHAIN, MAX_BLOCKS_PER_REQUEST, MAX_FORK_DEPTH};
pub use transaction::Transaction;
pub use wallet::Wallet;

use crate::binary::{BinaryError, FixedUint, Uint};
use crate::encoding::{CodecError, Record};
use num_bigint::BigUint;

/// Version byte every object on the wire currently carries
pub const OBJECT_VERSION: u8 = 0x00;

pub(crate) fn version_value() -> crate::encoding::Value {
    crate::encoding::Value::Uint(Uint::from_raw(vec![OBJECT_VERSION]))
}

pub(crate) fn binary_to_codec(key: &str, err: BinaryError) -> CodecError {
    CodecError::Decode(format!("{key}: {err}"))
}

pub(crate) fn take_fixed<const N: usize>(
    record: &mut Record,
    key: &str,
) -> Result<FixedUint<N>, CodecError> {
    let value = record.take_uint(key)?;
    FixedUint::<N>::try_from(&value).map_err(|e| binary_to_codec(key, e))
}

pub(crate) fn take_u64(record: &mut Record, key: &str) -> Result<u64, CodecError> {
    record
        .take_uint(key)?
        .to_u64()
        .map_err(|e| binary_to_codec(key, e))
}

pub(crate) fn take_biguint(record: &mut Record, key: &str) -> Result<BigUint, CodecError> {
    Ok(record.take_uint(key)?.to_biguint())
}
