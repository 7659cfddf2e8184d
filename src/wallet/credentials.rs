use crate::binary::Signature;
use crate::core::Address;
use crate::error::{NodeError, Result};
use crate::utils::{ecdsa_p256_sha256_sign_digest, new_key_pair, public_key_from_pkcs8};
use data_encoding::HEXLOWER_PERMISSIVE;
use std::fmt;
use zeroize::Zeroizing;

/// A P-256 signing key together with its public key and address.
///
/// The PKCS#8 document is wiped from memory when the credentials drop.
#[derive(Clone)]
pub struct Credentials {
    pkcs8: Zeroizing<Vec<u8>>,
    public_key: Vec<u8>,
    address: Address,
}

impl Credentials {
    pub fn generate() -> Result<Credentials> {
        Credentials::from_pkcs8(new_key_pair()?)
    }

    pub fn from_pkcs8(pkcs8: Vec<u8>) -> Result<Credentials> {
        let pkcs8 = Zeroizing::new(pkcs8);
        let public_key = public_key_from_pkcs8(&pkcs8)?;
        let address = Address::from_public_key(&public_key);
        Ok(Credentials {
            pkcs8,
            public_key,
            address,
        })
    }

    /// Parses a hex encoded PKCS#8 document, as stored in the config file.
    pub fn from_hex(hex: &str) -> Result<Credentials> {
        let pkcs8 = HEXLOWER_PERMISSIVE
            .decode(hex.trim().as_bytes())
            .map_err(|e| NodeError::Crypto(format!("Invalid private key hex: {e}")))?;
        Credentials::from_pkcs8(pkcs8)
    }

    pub fn to_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(data_encoding::HEXLOWER.encode(&self.pkcs8))
    }

    pub fn get_address(&self) -> Address {
        self.address
    }

    pub fn get_public_key(&self) -> &[u8] {
        self.public_key.as_slice()
    }

    pub fn sign(&self, message: &[u8]) -> Result<Signature> {
        ecdsa_p256_sha256_sign_digest(&self.pkcs8, message)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}
