//! Kernel Record/Replay Primitives - Consolidated Unsafe Code TCB
//!
//! This crate contains ALL unsafe code of the record/replay capture core,
//! consolidated into a single auditable location. The other crates use
//! `#![deny(unsafe_code)]`.
//!
//! Both primitives here are safe to use from interrupt context: neither
//! allocates, neither takes a lock, and the only waiting either one does is
//! the ticket spin in [`TicketSequencer::acquire`].
//!
//! # Module Organization
//!
//! - `arena` - Fixed-capacity, append-only slot arena (atomic claim cursor)
//! - `ticket` - FIFO ticket sequencer handing out one global turn at a time
//! - `sync` - Atomic shim switching between `core` and `loom`
//! - `loom_tests` - Concurrency tests using loom (with `loom` feature)
//!
//! # Verification
//!
//! 1. **Kani proofs** (`cargo kani`): Bounded model checking for the arena
//! 2. **Loom tests** (`cargo test --features loom`): Interleaving exploration
//! 3. **Unit tests**: Traditional testing for basic functionality

#![no_std]

#[cfg(test)]
extern crate std;

mod sync;

pub mod arena;
pub mod ticket;


// Re-export commonly used items
pub use arena::{SlotArena, SlotWriter};
pub use ticket::{NotHolder, Ticket, TicketSequencer};
