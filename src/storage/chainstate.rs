use crate::binary::Uint;
use crate::core::{take_fixed, take_u64};
use crate::encoding::{
    decode, encode, CodecError, Field, FieldKind, LengthPrefix, Record, Schema, Value,
};
use crate::error::{NodeError, Result};
use crate::storage::ChainHead;
use sled::{Db, Tree};
use std::path::Path;

const CHAINS_TREE: &str = "chains";

const CHAIN_META_SCHEMA: &Schema = &[
    Field::new("parent", FieldKind::Bytes(LengthPrefix::Fixed(1))),
    Field::new("baseIndex", FieldKind::BigInt),
    Field::new("baseHash", FieldKind::Hash),
    Field::new("headIndex", FieldKind::BigInt),
    Field::new("headHash", FieldKind::Hash),
];

/// Registry entry for one chain. For main, `parent` is main itself and
/// `base` is the genesis block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainMeta {
    pub name: String,
    pub parent: String,
    pub base: ChainHead,
    pub head: ChainHead,
}

impl ChainMeta {
    fn encode(&self) -> std::result::Result<Vec<u8>, CodecError> {
        let record = Record::new()
            .with("parent", Value::Raw(self.parent.as_bytes().to_vec()))
            .with("baseIndex", Value::Uint(Uint::from(self.base.index)))
            .with("baseHash", Value::Uint(self.base.hash.to_uint()))
            .with("headIndex", Value::Uint(Uint::from(self.head.index)))
            .with("headHash", Value::Uint(self.head.hash.to_uint()));
        encode(&record, CHAIN_META_SCHEMA, false)
    }

    fn decode(name: String, bytes: &[u8]) -> std::result::Result<ChainMeta, CodecError> {
        let (mut record, _) = decode(bytes, CHAIN_META_SCHEMA)?;
        let parent = String::from_utf8(record.take_raw("parent")?)
            .map_err(|e| CodecError::Decode(format!("parent: {e}")))?;
        Ok(ChainMeta {
            name,
            parent,
            base: ChainHead::new(
                take_u64(&mut record, "baseIndex")?,
                take_fixed(&mut record, "baseHash")?,
            ),
            head: ChainHead::new(
                take_u64(&mut record, "headIndex")?,
                take_fixed(&mut record, "headHash")?,
            ),
        })
    }
}

/// Persistent list of every known chain, read at startup to reopen forks.
pub struct ChainStateRegistry {
    db: Db,
    chains: Tree,
}

impl ChainStateRegistry {
    pub fn open(path: impl AsRef<Path>) -> Result<ChainStateRegistry> {
        let db = sled::open(path.as_ref())?;
        let chains = db.open_tree(CHAINS_TREE)?;
        Ok(ChainStateRegistry { db, chains })
    }

    pub fn get(&self, name: &str) -> Result<Option<ChainMeta>> {
        match self.chains.get(name)? {
            Some(bytes) => Ok(Some(ChainMeta::decode(name.to_string(), &bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put(&self, meta: &ChainMeta) -> Result<()> {
        self.chains.insert(meta.name.as_str(), meta.encode()?)?;
        self.db.flush()?;
        Ok(())
    }

    pub fn remove(&self, name: &str) -> Result<()> {
        self.chains.remove(name)?;
        self.db.flush()?;
        Ok(())
    }

    pub fn list(&self) -> Result<Vec<ChainMeta>> {
        let mut chains = Vec::new();
        for item in self.chains.iter() {
            let (key, bytes) = item?;
            let name = String::from_utf8(key.to_vec())
                .map_err(|e| NodeError::Database(format!("Invalid chain name: {e}")))?;
            chains.push(ChainMeta::decode(name, &bytes)?);
        }
        Ok(chains)
    }
}
