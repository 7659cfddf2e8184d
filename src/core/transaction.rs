// A transaction moves `amount` from the sender's account to the recipient's.
// Accounts carry a nonce instead of spent outputs, so each sender's
// transactions apply strictly in nonce order.

use crate::binary::{Hash, Signature, Uint};
use crate::core::{take_biguint, take_fixed, take_u64, version_value, Address, ADDRESS_LENGTH};
use crate::encoding::{CodecError, Encodable, Field, FieldKind, LengthPrefix, Record, Schema, Value};
use crate::error::{NodeError, Result};
use crate::utils::{current_timestamp, ecdsa_p256_sha256_sign_verify};
use crate::wallet::Credentials;
use num_bigint::BigUint;

pub const TRANSACTION_SCHEMA: &Schema = &[
    Field::new("version", FieldKind::Version),
    Field::new("txid", FieldKind::Hash).hash_removed(),
    Field::new("senderAddress", FieldKind::Address),
    Field::new("senderPublicKey", FieldKind::Bytes(LengthPrefix::Fixed(1))),
    Field::new("recipientAddress", FieldKind::Address),
    Field::new("amount", FieldKind::BigInt),
    Field::new("nonce", FieldKind::BigInt),
    Field::new("timestamp", FieldKind::BigInt),
    Field::new("message", FieldKind::Bytes(LengthPrefix::Unlimited)),
    Field::new("signature", FieldKind::Signature).hash_removed(),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    txid: Hash,
    sender_address: Address,
    sender_public_key: Vec<u8>,
    recipient_address: Address,
    amount: BigUint,
    nonce: u64,
    timestamp: u64,
    message: Vec<u8>,
    signature: Signature,
}

impl Transaction {
    /// Builds an unsigned transaction and computes its txid. The sender
    /// address is derived from `sender_public_key`.
    pub fn new(
        sender_public_key: Vec<u8>,
        recipient_address: Address,
        amount: BigUint,
        nonce: u64,
        timestamp: u64,
        message: Vec<u8>,
    ) -> Result<Transaction> {
        if sender_public_key.len() > u8::MAX as usize {
            return Err(NodeError::InvalidTransaction(
                "Sender public key is too long".to_string(),
            ));
        }

        let mut tx = Transaction {
            txid: Hash::zero(),
            sender_address: Address::from_public_key(&sender_public_key),
            sender_public_key,
            recipient_address,
            amount,
            nonce,
            timestamp,
            message,
            signature: Signature::zero(),
        };
        tx.txid = tx.calculate_hash()?;
        Ok(tx)
    }

    /// Creates a transaction from the local credentials and signs its txid.
    pub fn new_signed(
        credentials: &Credentials,
        recipient_address: Address,
        amount: BigUint,
        nonce: u64,
        message: Vec<u8>,
    ) -> Result<Transaction> {
        let mut tx = Transaction::new(
            credentials.get_public_key().to_vec(),
            recipient_address,
            amount,
            nonce,
            current_timestamp()?,
            message,
        )?;
        tx.sign(credentials)?;
        Ok(tx)
    }

    pub fn sign(&mut self, credentials: &Credentials) -> Result<()> {
        if credentials.get_address() != self.sender_address {
            return Err(NodeError::InvalidTransaction(format!(
                "Credentials for {} cannot sign for {}",
                credentials.get_address(),
                self.sender_address
            )));
        }
        self.signature = credentials.sign(self.txid.get_raw())?;
        Ok(())
    }

    /// Signature checks out against the embedded public key and that key
    /// belongs to the sender address.
    pub fn verify_signature(&self) -> bool {
        Address::from_public_key(&self.sender_public_key) == self.sender_address
            && ecdsa_p256_sha256_sign_verify(
                &self.sender_public_key,
                self.signature.get_raw(),
                self.txid.get_raw(),
            )
    }

    pub fn get_txid(&self) -> &Hash {
        &self.txid
    }

    pub fn get_sender_address(&self) -> &Address {
        &self.sender_address
    }

    pub fn get_sender_public_key(&self) -> &[u8] {
        self.sender_public_key.as_slice()
    }

    pub fn get_recipient_address(&self) -> &Address {
        &self.recipient_address
    }

    pub fn get_amount(&self) -> &BigUint {
        &self.amount
    }

    pub fn get_nonce(&self) -> u64 {
        self.nonce
    }

    pub fn get_timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn get_message(&self) -> &[u8] {
        self.message.as_slice()
    }

    pub fn get_signature(&self) -> &Signature {
        &self.signature
    }
}

impl Encodable for Transaction {
    const SCHEMA: &'static Schema = TRANSACTION_SCHEMA;

    fn to_record(&self) -> Record {
        Record::new()
            .with("version", version_value())
            .with("txid", Value::Uint(self.txid.to_uint()))
            .with(
                "senderAddress",
                Value::Uint(self.sender_address.to_fixed().to_uint()),
            )
            .with("senderPublicKey", Value::Raw(self.sender_public_key.clone()))
            .with(
                "recipientAddress",
                Value::Uint(self.recipient_address.to_fixed().to_uint()),
            )
            .with("amount", Value::Uint(Uint::from(&self.amount)))
            .with("nonce", Value::Uint(Uint::from(self.nonce)))
            .with("timestamp", Value::Uint(Uint::from(self.timestamp)))
            .with("message", Value::Raw(self.message.clone()))
            .with("signature", Value::Uint(self.signature.to_uint()))
    }

    fn from_record(mut record: Record) -> std::result::Result<Self, CodecError> {
        Ok(Transaction {
            txid: take_fixed(&mut record, "txid")?,
            sender_address: take_fixed::<ADDRESS_LENGTH>(&mut record, "senderAddress")?.into(),
            sender_public_key: record.take_raw("senderPublicKey")?,
            recipient_address: take_fixed::<ADDRESS_LENGTH>(&mut record, "recipientAddress")?.into(),
            amount: take_biguint(&mut record, "amount")?,
            nonce: take_u64(&mut record, "nonce")?,
            timestamp: take_u64(&mut record, "timestamp")?,
            message: record.take_raw("message")?,
            signature: take_fixed(&mut record, "signature")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(credentials: &Credentials) -> Result<Transaction> {
        Transaction::new_signed(
            credentials,
            Address::from_public_key(b"recipient"),
            BigUint::from(40u32),
            0,
            b"rent".to_vec(),
        )
    }

    #[test]
    fn test_round_trip_preserves_every_field() -> Result<()> {
        let credentials = Credentials::generate()?;
        let tx = sample(&credentials)?;

        let decoded = Transaction::decode(&tx.encode()?)?;
        assert_eq!(decoded, tx);
        assert!(decoded.verify_signature());
        Ok(())
    }

    #[test]
    fn test_txid_excludes_txid_and_signature() -> Result<()> {
        let credentials = Credentials::generate()?;
        let tx = sample(&credentials)?;

        let preimage = tx.encode_for_hash()?;
        assert_eq!(tx.encode()?.len() - preimage.len(), 32 + 64);
        assert_eq!(&tx.calculate_hash()?, tx.get_txid());
        Ok(())
    }

    #[test]
    fn test_tampered_amount_changes_hash() -> Result<()> {
        let credentials = Credentials::generate()?;
        let tx = sample(&credentials)?;

        let mut record = tx.to_record();
        record.insert("amount", Value::Uint(Uint::from(41u64)));
        let tampered = Transaction::from_record(record)?;
        assert_ne!(&tampered.calculate_hash()?, tampered.get_txid());
        Ok(())
    }

    #[test]
    fn test_signature_from_foreign_key_fails() -> Result<()> {
        let owner = Credentials::generate()?;
        let intruder = Credentials::generate()?;
        let mut tx = sample(&owner)?;

        assert!(tx.sign(&intruder).is_err());

        let mut record = tx.to_record();
        record.insert(
            "signature",
            Value::Uint(intruder.sign(tx.get_txid().get_raw())?.to_uint()),
        );
        tx = Transaction::from_record(record)?;
        assert!(!tx.verify_signature());
        Ok(())
    }

    #[test]
    fn test_zero_amount_and_empty_message() -> Result<()> {
        let credentials = Credentials::generate()?;
        let tx = Transaction::new(
            credentials.get_public_key().to_vec(),
            Address::default(),
            BigUint::from(0u32),
            7,
            0,
            Vec::new(),
        )?;
        let decoded = Transaction::decode(&tx.encode()?)?;
        assert_eq!(decoded.get_amount(), &BigUint::from(0u32));
        assert_eq!(decoded.get_nonce(), 7);
        assert!(decoded.get_message().is_empty());
        Ok(())
    }

    #[test]
    fn test_truncated_bytes_fail_to_decode() -> Result<()> {
        let credentials = Credentials::generate()?;
        let bytes = sample(&credentials)?.encode()?;
        assert!(Transaction::decode(&bytes[..bytes.len() - 1]).is_err());
        Ok(())
    }
}
