use crate::binary::{Hash, Uint};
use crate::core::attestation::ATTESTATION_SCHEMA;
use crate::core::transaction::TRANSACTION_SCHEMA;
use crate::core::{
    take_fixed, take_u64, version_value, Address, Attestation, Transaction, ADDRESS_LENGTH,
};
use crate::encoding::{
    CodecError, Encodable, Field, FieldKind, LengthPrefix, Record, Schema, Value,
};
use crate::error::Result;

pub const BLOCK_SCHEMA: &Schema = &[
    Field::new("version", FieldKind::Version),
    Field::new("index", FieldKind::BigInt),
    Field::new("slotIndex", FieldKind::BigInt),
    Field::new("hash", FieldKind::Hash).hash_removed(),
    Field::new("previousHash", FieldKind::Hash),
    Field::new("timestamp", FieldKind::BigInt),
    Field::new("minter", FieldKind::Address),
    Field::new(
        "attestations",
        FieldKind::Array(LengthPrefix::Unlimited, ATTESTATION_SCHEMA),
    ),
    Field::new(
        "transactions",
        FieldKind::Array(LengthPrefix::Unlimited, TRANSACTION_SCHEMA),
    ),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    index: u64,
    slot_index: u64,
    hash: Hash,
    previous_hash: Hash,
    timestamp: u64,
    minter: Address,
    attestations: Vec<Attestation>,
    transactions: Vec<Transaction>,
}

impl Block {
    /// Assembles a block and computes its hash over every other field.
    pub fn new(
        index: u64,
        slot_index: u64,
        previous_hash: Hash,
        timestamp: u64,
        minter: Address,
        attestations: Vec<Attestation>,
        transactions: Vec<Transaction>,
    ) -> Result<Block> {
        let mut block = Block {
            index,
            slot_index,
            hash: Hash::zero(),
            previous_hash,
            timestamp,
            minter,
            attestations,
            transactions,
        };
        block.hash = block.calculate_hash()?;
        Ok(block)
    }

    /// Index 0, no parent, no minter, no transactions. Every node configured
    /// with the same genesis time derives the same genesis hash.
    pub fn genesis(timestamp: u64) -> Result<Block> {
        Block::new(
            0,
            0,
            Hash::zero(),
            timestamp,
            Address::default(),
            Vec::new(),
            Vec::new(),
        )
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0 && self.previous_hash.is_zero()
    }

    pub fn get_index(&self) -> u64 {
        self.index
    }

    pub fn get_slot_index(&self) -> u64 {
        self.slot_index
    }

    pub fn get_hash(&self) -> &Hash {
        &self.hash
    }

    pub fn get_previous_hash(&self) -> &Hash {
        &self.previous_hash
    }

    pub fn get_timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn get_minter(&self) -> &Address {
        &self.minter
    }

    pub fn get_attestations(&self) -> &[Attestation] {
        self.attestations.as_slice()
    }

    pub fn get_transactions(&self) -> &[Transaction] {
        self.transactions.as_slice()
    }
}

impl Encodable for Block {
    const SCHEMA: &'static Schema = BLOCK_SCHEMA;

    fn to_record(&self) -> Record {
        Record::new()
            .with("version", version_value())
            .with("index", Value::Uint(Uint::from(self.index)))
            .with("slotIndex", Value::Uint(Uint::from(self.slot_index)))
            .with("hash", Value::Uint(self.hash.to_uint()))
            .with("previousHash", Value::Uint(self.previous_hash.to_uint()))
            .with("timestamp", Value::Uint(Uint::from(self.timestamp)))
            .with("minter", Value::Uint(self.minter.to_fixed().to_uint()))
            .with(
                "attestations",
                Value::Array(self.attestations.iter().map(Encodable::to_record).collect()),
            )
            .with(
                "transactions",
                Value::Array(self.transactions.iter().map(Encodable::to_record).collect()),
            )
    }

    fn from_record(mut record: Record) -> std::result::Result<Self, CodecError> {
        let attestations = record
            .take_array("attestations")?
            .into_iter()
            .map(Attestation::from_record)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let transactions = record
            .take_array("transactions")?
            .into_iter()
            .map(Transaction::from_record)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Block {
            index: take_u64(&mut record, "index")?,
            slot_index: take_u64(&mut record, "slotIndex")?,
            hash: take_fixed(&mut record, "hash")?,
            previous_hash: take_fixed(&mut record, "previousHash")?,
            timestamp: take_u64(&mut record, "timestamp")?,
            minter: take_fixed::<ADDRESS_LENGTH>(&mut record, "minter")?.into(),
            attestations,
            transactions,
        })
    }
}
