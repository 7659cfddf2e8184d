use std::fmt;

/// Verification status. `Success` is the only accepting value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum VCode {
    Success = 12000,
    Null = 12501,
    HashMismatch = 12504,
    BadSignature = 12506,
    BadNonce = 12508,
    BlockBadTx = 12520,
    InsufficientFunds = 12524,
    ChainstateMismatch = 12530,
    BlockKnown = 12532,
    NotMinter = 12534,
    SlotFilled = 12535,
    WrongSlot = 12540,
    /// Chain state could not be read while verifying
    InternalError = 12599,
}

impl VCode {
    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn is_success(self) -> bool {
        self == VCode::Success
    }

    fn describe(self) -> &'static str {
        match self {
            VCode::Success => "success",
            VCode::Null => "missing object",
            VCode::HashMismatch => "hash mismatch",
            VCode::BadSignature => "bad signature",
            VCode::BadNonce => "bad nonce",
            VCode::BlockBadTx => "block carries an invalid transaction",
            VCode::InsufficientFunds => "insufficient funds",
            VCode::ChainstateMismatch => "block does not fit any known chain",
            VCode::BlockKnown => "block already known",
            VCode::NotMinter => "minter is not assigned to this slot",
            VCode::SlotFilled => "slot already filled",
            VCode::WrongSlot => "block is not for the current slot",
            VCode::InternalError => "chain state unavailable",
        }
    }
}

impl fmt::Display for VCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code(), self.describe())
    }
}
