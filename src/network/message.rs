//! Wire messages
//!
//! A closed set of message types, each decoded into its payload before it
//! reaches a handler. Payload layouts are codec schemas like every other
//! object on the wire.

use crate::binary::{Hash, Uint};
use crate::core::block::BLOCK_SCHEMA;
use crate::core::{take_fixed, take_u64, Block, Transaction};
use crate::encoding::{
    decode, encode, CodecError, Encodable, Field, FieldKind, LengthPrefix, Record, Schema, Value,
};
use crate::error::Result;
use crate::network::frame::{encode_frame, RawFrame, MAX_FRAME_SIZE, REQUEST_ID_BYTES};
use bytes::Bytes;

pub const PROTOCOL_VERSION: u64 = 0;

/// Request id reserved for the STATUS exchange.
pub const STATUS_REQUEST_ID: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Fire and forget
    Default,
    /// Receiver answers with a correlated response, or nothing
    Request,
    /// Resolves a pending local request
    Response,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum MessageType {
    Status = 0x0a6e,
    ChallengeRequest = 0x77a8,
    Challenge = 0x77a9,
    NewTransaction = 0x8356,
    NewBlock = 0x2ac8,
    GetChainstate = 0x1f76,
    GetBlocks = 0xe8e9,
    Blocks = 0xe8ea,
}

impl MessageType {
    pub fn from_code(code: u16) -> Option<MessageType> {
        match code {
            0x0a6e => Some(MessageType::Status),
            0x77a8 => Some(MessageType::ChallengeRequest),
            0x77a9 => Some(MessageType::Challenge),
            0x8356 => Some(MessageType::NewTransaction),
            0x2ac8 => Some(MessageType::NewBlock),
            0x1f76 => Some(MessageType::GetChainstate),
            0xe8e9 => Some(MessageType::GetBlocks),
            0xe8ea => Some(MessageType::Blocks),
            _ => None,
        }
    }

    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn kind(self) -> MessageKind {
        match self {
            MessageType::Status | MessageType::NewTransaction | MessageType::NewBlock => {
                MessageKind::Default
            }
            MessageType::ChallengeRequest | MessageType::GetChainstate | MessageType::GetBlocks => {
                MessageKind::Request
            }
            MessageType::Challenge | MessageType::Blocks => MessageKind::Response,
        }
    }

    /// Gossip is relayed to every other open connection.
    pub fn is_gossip(self) -> bool {
        matches!(self, MessageType::NewTransaction | MessageType::NewBlock)
    }
}

const STATUS_SCHEMA: &Schema = &[
    Field::new("version", FieldKind::BigInt),
    Field::new("port", FieldKind::Fixed(2)),
];

const CHALLENGE_SCHEMA: &Schema = &[Field::new("challenge", FieldKind::Hash)];

const GET_BLOCKS_SCHEMA: &Schema = &[
    Field::new("start", FieldKind::BigInt),
    Field::new("count", FieldKind::BigInt),
];

const BLOCKS_SCHEMA: &Schema = &[Field::new(
    "blocks",
    FieldKind::Array(LengthPrefix::Unlimited, BLOCK_SCHEMA),
)];

// type code, request id and room for the block count prefix
const BLOCKS_FRAME_OVERHEAD: usize = 2 + REQUEST_ID_BYTES + 16;

/// Longest leading run of `blocks` that still fits in one BLOCKS frame. The
/// first block is always kept so the requester can make progress.
pub fn fit_blocks_to_frame(blocks: Vec<Block>) -> Result<Vec<Block>> {
    fit_blocks(blocks, MAX_FRAME_SIZE)
}

fn fit_blocks(blocks: Vec<Block>, limit: usize) -> Result<Vec<Block>> {
    let mut size = BLOCKS_FRAME_OVERHEAD;
    let mut fitted = Vec::with_capacity(blocks.len());
    for block in blocks {
        size += block.encode()?.len();
        if size > limit && !fitted.is_empty() {
            break;
        }
        fitted.push(block);
    }
    Ok(fitted)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Status { version: u64, port: u16 },
    ChallengeRequest { request_id: u32 },
    Challenge { request_id: u32, challenge: Hash },
    NewTransaction(Transaction),
    NewBlock(Block),
    GetChainstate { request_id: u32 },
    GetBlocks { request_id: u32, start: u64, count: u64 },
    Blocks { request_id: u32, blocks: Vec<Block> },
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::Status { .. } => MessageType::Status,
            Message::ChallengeRequest { .. } => MessageType::ChallengeRequest,
            Message::Challenge { .. } => MessageType::Challenge,
            Message::NewTransaction(_) => MessageType::NewTransaction,
            Message::NewBlock(_) => MessageType::NewBlock,
            Message::GetChainstate { .. } => MessageType::GetChainstate,
            Message::GetBlocks { .. } => MessageType::GetBlocks,
            Message::Blocks { .. } => MessageType::Blocks,
        }
    }

    pub fn request_id(&self) -> Option<u32> {
        match self {
            Message::ChallengeRequest { request_id }
            | Message::Challenge { request_id, .. }
            | Message::GetChainstate { request_id }
            | Message::GetBlocks { request_id, .. }
            | Message::Blocks { request_id, .. } => Some(*request_id),
            Message::Status { .. } | Message::NewTransaction(_) | Message::NewBlock(_) => None,
        }
    }

    fn encode_payload(&self) -> std::result::Result<Vec<u8>, CodecError> {
        match self {
            Message::Status { version, port } => {
                let port = Uint::from_u64(u64::from(*port), 2)
                    .map_err(|e| CodecError::Encode(format!("port: {e}")))?;
                let record = Record::new()
                    .with("version", Value::Uint(Uint::from(*version)))
                    .with("port", Value::Uint(port));
                encode(&record, STATUS_SCHEMA, false)
            }
            Message::Challenge { challenge, .. } => {
                let record = Record::new().with("challenge", Value::Uint(challenge.to_uint()));
                encode(&record, CHALLENGE_SCHEMA, false)
            }
            Message::NewTransaction(tx) => tx.encode(),
            Message::NewBlock(block) => block.encode(),
            Message::GetBlocks { start, count, .. } => {
                let record = Record::new()
                    .with("start", Value::Uint(Uint::from(*start)))
                    .with("count", Value::Uint(Uint::from(*count)));
                encode(&record, GET_BLOCKS_SCHEMA, false)
            }
            Message::Blocks { blocks, .. } => {
                let record = Record::new().with(
                    "blocks",
                    Value::Array(blocks.iter().map(Encodable::to_record).collect()),
                );
                encode(&record, BLOCKS_SCHEMA, false)
            }
            Message::ChallengeRequest { .. } | Message::GetChainstate { .. } => Ok(Vec::new()),
        }
    }

    /// Complete frame, length prefix included.
    pub fn to_frame(&self) -> Result<Bytes> {
        let payload = self.encode_payload()?;
        encode_frame(self.message_type().code(), self.request_id(), &payload)
    }

    /// Parses a frame body. `Ok(None)` means the type code is not one this
    /// node knows.
    pub fn from_frame(frame: &RawFrame) -> std::result::Result<Option<Message>, CodecError> {
        let Some(message_type) = MessageType::from_code(frame.type_code) else {
            return Ok(None);
        };

        let mut body = &frame.body[..];
        let mut request_id = 0;
        if message_type.kind() != MessageKind::Default {
            if body.len() < REQUEST_ID_BYTES {
                return Err(CodecError::Decode("frame too short for a request id".into()));
            }
            let mut id = [0u8; REQUEST_ID_BYTES];
            id.copy_from_slice(&body[..REQUEST_ID_BYTES]);
            request_id = u32::from_be_bytes(id);
            body = &body[REQUEST_ID_BYTES..];
        }

        let message = match message_type {
            MessageType::Status => {
                let mut record = decode_all(body, STATUS_SCHEMA)?;
                let port = take_fixed::<2>(&mut record, "port")?
                    .to_u64()
                    .map_err(|e| CodecError::Decode(format!("port: {e}")))?;
                Message::Status {
                    version: take_u64(&mut record, "version")?,
                    port: port as u16,
                }
            }
            MessageType::ChallengeRequest => {
                expect_empty(body)?;
                Message::ChallengeRequest { request_id }
            }
            MessageType::Challenge => {
                let mut record = decode_all(body, CHALLENGE_SCHEMA)?;
                Message::Challenge {
                    request_id,
                    challenge: take_fixed(&mut record, "challenge")?,
                }
            }
            MessageType::NewTransaction => Message::NewTransaction(Transaction::decode(body)?),
            MessageType::NewBlock => Message::NewBlock(Block::decode(body)?),
            MessageType::GetChainstate => {
                expect_empty(body)?;
                Message::GetChainstate { request_id }
            }
            MessageType::GetBlocks => {
                let mut record = decode_all(body, GET_BLOCKS_SCHEMA)?;
                Message::GetBlocks {
                    request_id,
                    start: take_u64(&mut record, "start")?,
                    count: take_u64(&mut record, "count")?,
                }
            }
            MessageType::Blocks => {
                let mut record = decode_all(body, BLOCKS_SCHEMA)?;
                let blocks = record
                    .take_array("blocks")?
                    .into_iter()
                    .map(Block::from_record)
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Message::Blocks { request_id, blocks }
            }
        };
        Ok(Some(message))
    }
}

fn decode_all(bytes: &[u8], schema: &Schema) -> std::result::Result<Record, CodecError> {
    let (record, consumed) = decode(bytes, schema)?;
    expect_empty(&bytes[consumed..])?;
    Ok(record)
}

fn expect_empty(bytes: &[u8]) -> std::result::Result<(), CodecError> {
    if bytes.is_empty() {
        Ok(())
    } else {
        Err(CodecError::Decode(format!(
            "{} unexpected trailing bytes",
            bytes.len()
        )))
    }
}
