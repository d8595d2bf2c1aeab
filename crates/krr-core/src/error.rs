//! Capture outcomes and fatal contract violations
//!
//! Two channels that never mix:
//!
//! - [`Capture`] / [`SkipReason`]: best-effort results. A skipped capture is
//!   a normal condition; host call sites may ignore it entirely.
//! - [`contract_violation`]: an unrecoverable halt for caller bugs (a copy
//!   request larger than a record can hold). Recording a truncated copy would
//!   make replay diverge silently, so the system stops instead.

use core::fmt;

use crate::sequencer::TurnDenied;
use crate::types::SequenceNumber;

/// Result of one capture adapter call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Capture {
    /// A record was published
    Recorded {
        /// Log slot holding the record
        slot: usize,
        /// Turn sequence number for sequenced kinds that obtained a turn
        seq: Option<SequenceNumber>,
    },
    /// Nothing was published
    Skipped(SkipReason),
}

impl Capture {
    pub fn is_recorded(&self) -> bool {
        matches!(self, Capture::Recorded { .. })
    }

    /// Slot of the published record, if any.
    pub fn slot(&self) -> Option<usize> {
        match self {
            Capture::Recorded { slot, .. } => Some(*slot),
            Capture::Skipped(_) => None,
        }
    }
}

/// Why a capture published nothing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// Log uninitialized or recording disabled
    Gated,
    /// No turn was granted (interrupt path only)
    NoTurn(TurnDenied),
    /// Every log slot is taken
    LogFull,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Gated => write!(f, "recording gated off"),
            SkipReason::NoTurn(denied) => write!(f, "no turn: {}", denied),
            SkipReason::LogFull => write!(f, "event log full"),
        }
    }
}

/// Halt on a caller contract violation.
///
/// Runs before any shared state is touched, so the log holds no partial
/// record when the kernel's panic handler takes over.
#[cold]
#[track_caller]
pub fn contract_violation(what: &str, len: usize, max: usize) -> ! {
    panic!(
        "record/replay contract violation: {} of {} bytes exceeds the {} byte record limit",
        what, len, max
    )
}
