use crate::binary::Uint;
use crate::core::{take_biguint, take_u64, version_value, Address};
use crate::encoding::{decode, encode, CodecError, Field, FieldKind, Record, Schema, Value};
use crate::error::{NodeError, Result};
use num_bigint::BigUint;

/// Stored value of a wallet; the owner address is the storage key.
pub const WALLET_SCHEMA: &Schema = &[
    Field::new("version", FieldKind::Version),
    Field::new("balance", FieldKind::BigInt),
    Field::new("nonce", FieldKind::BigInt),
];

/// Account state of one address on one chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wallet {
    owner: Address,
    balance: BigUint,
    nonce: u64,
}

impl Wallet {
    pub fn new(owner: Address, balance: BigUint, nonce: u64) -> Wallet {
        Wallet {
            owner,
            balance,
            nonce,
        }
    }

    /// What an address that never received anything looks like.
    pub fn empty(owner: Address) -> Wallet {
        Wallet::new(owner, BigUint::default(), 0)
    }

    pub fn get_owner(&self) -> &Address {
        &self.owner
    }

    pub fn get_balance(&self) -> &BigUint {
        &self.balance
    }

    pub fn get_nonce(&self) -> u64 {
        self.nonce
    }

    pub fn add_balance(&mut self, amount: &BigUint) {
        self.balance += amount;
    }

    pub fn sub_balance(&mut self, amount: &BigUint) -> Result<()> {
        if self.balance < *amount {
            return Err(NodeError::InvalidTransaction(format!(
                "Wallet {} holds {} and cannot pay {amount}",
                self.owner, self.balance
            )));
        }
        self.balance -= amount;
        Ok(())
    }

    pub fn increment_nonce(&mut self) {
        self.nonce += 1;
    }

    /// Only used while reverting blocks onto a fork base.
    pub fn decrement_nonce(&mut self) -> Result<()> {
        self.nonce = self.nonce.checked_sub(1).ok_or_else(|| {
            NodeError::Invariant(format!("Nonce of {} would drop below zero", self.owner))
        })?;
        Ok(())
    }

    pub fn encode(&self) -> std::result::Result<Vec<u8>, CodecError> {
        let record = Record::new()
            .with("version", version_value())
            .with("balance", Value::Uint(Uint::from(&self.balance)))
            .with("nonce", Value::Uint(Uint::from(self.nonce)));
        encode(&record, WALLET_SCHEMA, false)
    }

    pub fn decode(owner: Address, bytes: &[u8]) -> std::result::Result<Wallet, CodecError> {
        let (mut record, consumed) = decode(bytes, WALLET_SCHEMA)?;
        if consumed != bytes.len() {
            return Err(CodecError::Decode(
                "trailing bytes after wallet".to_string(),
            ));
        }
        Ok(Wallet {
            owner,
            balance: take_biguint(&mut record, "balance")?,
            nonce: take_u64(&mut record, "nonce")?,
        })
    }
}
