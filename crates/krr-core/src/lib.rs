//! Kernel Record/Replay Capture Core
//!
//! Captures every nondeterministic input a multiprocessor kernel observes
//! (syscall and exception entries, external interrupts, random bytes, bytes
//! copied from user memory, hardware seed reads) into a fixed-capacity
//! in-memory event log, so a later replay can reproduce the execution
//! exactly.
//!
//! # Design Principles
//!
//! 1. **No allocation on the capture path**: the log is a pre-reserved array
//!    of slots claimed with one atomic compare-exchange
//! 2. **Callable from any context**: adapters run with local interrupts and
//!    preemption masked and never block except while waiting for a turn
//! 3. **Total order across cores**: syscalls, exceptions and interrupts are
//!    serialized through one FIFO turn; sequenced records land in the log in
//!    sequence order
//! 4. **Best-effort recording, fatal contract violations**: a full log drops
//!    events quietly; an oversized copy request halts
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  host kernel entry paths                    │
//! │   syscall / exception / irq / copy_from_user / rdseed ...   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ on_*()
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         krr-core                            │
//! │                                                             │
//! │   ┌───────────────┐    ┌───────────────┐                    │
//! │   │   Recorder    │───▶│   Sequencer   │  one FIFO turn     │
//! │   │ capture::on_* │    │  Turn guard   │                    │
//! │   └───────────────┘    └───────────────┘                    │
//! │          │                                                  │
//! │          ▼                                                  │
//! │   ┌───────────────┐    ┌───────────────┐                    │
//! │   │  EventLog<N>  │    │  Invariants   │  replay consumer   │
//! │   │ append-only   │◀───│   checker     │  side              │
//! │   └───────────────┘    └───────────────┘                    │
//! └─────────────────────────────────────────────────────────────┘
//!            │                                   │
//!            ▼                                   ▼
//!     krr-primitives                  krr-hal: Platform, ControlPlane
//!  (SlotArena, TicketSequencer)         (masking, core id, gating)
//! ```
//!
//! # Module Organization
//!
//! - `types` - Record format: [`EventRecord`], [`Event`], payload structs
//! - `event_log` - Fixed-capacity append-only [`EventLog`]
//! - `sequencer` - Cross-core [`Sequencer`] and its [`Turn`] guard
//! - `control` - [`ControlFlags`] session lifecycle
//! - `config` - [`RecorderConfig`]
//! - `recorder` - [`Recorder`], owner of the log and the sequencer
//! - `capture` - The `on_*` capture adapters
//! - `error` - [`Capture`] outcomes and [`contract_violation`]
//! - `invariants` - Log invariant assertions for tests and replay tooling

#![no_std]
#![deny(unsafe_code)]
extern crate alloc;

mod capture;
pub mod config;
pub mod control;
pub mod error;
pub mod event_log;
pub mod invariants;
pub mod recorder;
pub mod sequencer;
pub mod types;

// Re-export all public types for convenient access
pub use config::{ContextSet, RecorderConfig};
pub use control::{ControlFlags, LifecycleError, SessionState};
pub use error::{contract_violation, Capture, SkipReason};
pub use event_log::{EventLog, EventSlot};
pub use invariants::{check_log_invariants, InvariantViolation};
pub use recorder::Recorder;
pub use sequencer::{Sequencer, SequencerError, Turn, TurnDenied};
pub use types::{
    ContextKind, CoreId, Event, EventKind, EventRecord, ExceptionEvent, GpRegisters, InlineBytes,
    InterruptEvent, InterruptSource, KernelAddr, RandomEvent, SequenceNumber, SyscallEvent,
    UserAddr, UserCopyEvent, MAX_COPY_BYTES, MAX_RANDOM_BYTES, UNSEQUENCED,
};
