//! Slot schedule and block production
//!
//! Leader election is pluggable: the node only asks a `SlotSchedule` who may
//! mint in the current slot and hands block assembly to a `BlockProducer`.

pub mod minter;
pub mod schedule;

pub use minter::{BlockProducer, Minter};
pub use schedule::{RoundRobinSchedule, Slot, SlotSchedule};
