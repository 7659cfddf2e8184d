//! Utility functions and helpers
//!
//! Hashing, signing and clock helpers shared by the domain objects, the
//! verification engine and the messaging layer.

pub mod crypto;

pub use crypto::{
    current_timestamp, ecdsa_p256_sha256_sign_digest, ecdsa_p256_sha256_sign_verify,
    new_key_pair, public_key_from_pkcs8, ripemd160_digest, sha256_digest,
};
