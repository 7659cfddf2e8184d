//! Test fixtures shared by the unit tests
//!
//! Throwaway chains in temporary directories, funded senders and a slot
//! schedule that never moves on its own.

pub mod test_utils;

pub use test_utils::*;
