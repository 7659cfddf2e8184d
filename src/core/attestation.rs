use crate::binary::Signature;
use crate::core::{take_fixed, Address, ADDRESS_LENGTH};
use crate::encoding::{CodecError, Encodable, Field, FieldKind, Record, Schema, Value};

pub const ATTESTATION_SCHEMA: &Schema = &[
    Field::new("attester", FieldKind::Address),
    Field::new("vote", FieldKind::Bool),
    Field::new("signature", FieldKind::Signature),
];

/// A validator's vote on a block, carried inside the block that follows it.
/// Only the attester's address travels with it, so nodes store and relay
/// attestations without checking the signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attestation {
    attester: Address,
    vote: bool,
    signature: Signature,
}

impl Attestation {
    pub fn new(attester: Address, vote: bool, signature: Signature) -> Attestation {
        Attestation {
            attester,
            vote,
            signature,
        }
    }

    pub fn get_attester(&self) -> &Address {
        &self.attester
    }

    pub fn get_vote(&self) -> bool {
        self.vote
    }

    pub fn get_signature(&self) -> &Signature {
        &self.signature
    }
}

impl Encodable for Attestation {
    const SCHEMA: &'static Schema = ATTESTATION_SCHEMA;

    fn to_record(&self) -> Record {
        Record::new()
            .with("attester", Value::Uint(self.attester.to_fixed().to_uint()))
            .with("vote", Value::Bool(self.vote))
            .with("signature", Value::Uint(self.signature.to_uint()))
    }

    fn from_record(mut record: Record) -> std::result::Result<Self, CodecError> {
        Ok(Attestation {
            attester: take_fixed::<ADDRESS_LENGTH>(&mut record, "attester")?.into(),
            vote: record.take_bool("vote")?,
            signature: take_fixed(&mut record, "signature")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;

    #[test]
    fn test_attestation_keeps_opaque_signature() -> Result<()> {
        let attester = Address::from_public_key(b"attester");
        let attestation = Attestation::new(attester, false, Signature::random());

        let decoded = Attestation::decode(&attestation.encode()?)?;
        assert_eq!(decoded.get_attester(), &attester);
        assert!(!decoded.get_vote());
        assert_eq!(decoded.get_signature(), attestation.get_signature());
        Ok(())
    }
}
