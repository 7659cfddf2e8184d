use crate::binary::{BinaryError, FixedUint};
use crate::utils::{ripemd160_digest, sha256_digest};
use std::fmt;
use std::str::FromStr;

pub const ADDRESS_LENGTH: usize = 21;

/// Prefix byte of ordinary account addresses
pub const ACCOUNT_PREFIX: u8 = 0x00;

/// Account address: one prefix byte followed by
/// `RIPEMD160(SHA256(public_key))`.
///
/// Displayed as `lc` plus the hex form with its second character replaced by
/// `x`, so an account address reads `lc0x...`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(FixedUint<ADDRESS_LENGTH>);

impl Address {
    pub fn from_public_key(public_key: &[u8]) -> Address {
        let pub_key_sha256 = sha256_digest(public_key);
        let body = ripemd160_digest(pub_key_sha256.get_raw());

        let mut raw = [0u8; ADDRESS_LENGTH];
        raw[0] = ACCOUNT_PREFIX;
        raw[1..].copy_from_slice(&body);
        Address(FixedUint::from_bytes(raw))
    }

    pub fn from_raw(raw: &[u8]) -> Result<Address, BinaryError> {
        Ok(Address(FixedUint::from_raw(raw)?))
    }

    pub fn get_raw(&self) -> &[u8] {
        self.0.get_raw()
    }

    pub fn get_prefix(&self) -> u8 {
        self.0.get_raw()[0]
    }

    pub fn to_fixed(&self) -> FixedUint<ADDRESS_LENGTH> {
        self.0
    }

    pub fn to_hex(&self) -> String {
        self.0.to_hex()
    }
}

impl From<FixedUint<ADDRESS_LENGTH>> for Address {
    fn from(value: FixedUint<ADDRESS_LENGTH>) -> Self {
        Address(value)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.0.to_hex();
        write!(f, "lc{}x{}", &hex[..1], &hex[2..])
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl FromStr for Address {
    type Err = BinaryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || BinaryError::InvalidHex(format!("not an address: {s}"));
        let body = s.strip_prefix("lc").ok_or_else(invalid)?;
        if body.len() < 2 || !body.is_char_boundary(1) || !body.is_char_boundary(2) {
            return Err(invalid());
        }
        if &body[1..2] != "x" {
            return Err(invalid());
        }
        // the prefix byte's low nibble is rendered as `x`, account addresses only
        let hex = format!("{}0{}", &body[..1], &body[2..]);
        Ok(Address(FixedUint::from_hex(&hex)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_from_public_key() {
        let address = Address::from_public_key(b"some public key");
        assert_eq!(address.get_prefix(), ACCOUNT_PREFIX);
        assert_eq!(address.get_raw().len(), ADDRESS_LENGTH);
        assert_eq!(address, Address::from_public_key(b"some public key"));
        assert_ne!(address, Address::from_public_key(b"other public key"));
    }

    #[test]
    fn test_display_and_parse() {
        let address = Address::from_raw(&[
            0x00, 0xab, 0xcd, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x01,
        ])
        .unwrap();
        let shown = address.to_string();
        assert_eq!(shown, "lc0xabcd000000000000000000000000000000000001");
        assert_eq!(shown.parse::<Address>().unwrap(), address);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("0x1234".parse::<Address>().is_err());
        assert!("lc0y00".parse::<Address>().is_err());
        assert!("lc0x1234".parse::<Address>().is_err());
    }
}
