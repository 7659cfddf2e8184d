//! Peer-to-peer messaging
//!
//! Length-prefixed frames over TCP, a closed set of message types, a
//! STATUS/challenge handshake and request/response correlation per
//! connection. The registry owns every connection; handlers reach it
//! through the node context.

pub mod connection;
pub mod frame;
pub mod handshake;
pub mod message;
pub mod peers;
pub mod registry;
pub mod requests;
pub mod router;
pub mod server;
pub mod sync;

pub use connection::{Connection, ConnectionState};
pub use frame::{encode_frame, FrameDecoder, RawFrame, MAX_FRAME_SIZE};
pub use message::{Message, MessageKind, MessageType, PROTOCOL_VERSION, STATUS_REQUEST_ID};
pub use peers::PeerAddress;
pub use registry::ConnectionRegistry;
pub use requests::{PendingRequests, RequestState};
pub use server::{connect, spawn_connection, Server};
