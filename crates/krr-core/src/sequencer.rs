//! Cross-core sequencer
//!
//! Serializes sequenced events (syscalls, exceptions, interrupts) from all
//! cores into one total order. All context kinds share a single FIFO ticket
//! queue: a core takes a ticket, spins until served, records, and releases.
//! Arrival order alone decides who goes first; the context kind only labels
//! the turn and never preempts.
//!
//! Turns are handed out as [`Turn`] guards. Dropping the guard releases the
//! turn, so every exit path of a capture adapter releases exactly once.

use core::fmt;
use core::sync::atomic::{AtomicU8, Ordering};

use krr_hal::CoreId;
use krr_primitives::TicketSequencer;

use crate::config::ContextSet;
use crate::types::{ContextKind, SequenceNumber};

/// Why a turn was not granted. Callers skip sequencing; this is not an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnDenied {
    /// The sequencer is not active for this context kind
    Inactive(ContextKind),
    /// The calling core already holds the turn (nested entry)
    Reentrant(CoreId),
}

impl fmt::Display for TurnDenied {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnDenied::Inactive(kind) => write!(f, "sequencer inactive for {:?}", kind),
            TurnDenied::Reentrant(core) => write!(f, "core {} already holds the turn", core),
        }
    }
}

/// Sequencer misuse
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SequencerError {
    /// `release_turn` called by a core that does not hold the turn
    NotHolder {
        core: CoreId,
        holder: Option<CoreId>,
    },
}

impl fmt::Display for SequencerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SequencerError::NotHolder {
                core,
                holder: Some(holder),
            } => write!(f, "core {} released a turn held by core {}", core, holder),
            SequencerError::NotHolder { core, holder: None } => {
                write!(f, "core {} released a turn nobody holds", core)
            }
        }
    }
}

/// Global turn sequencer.
pub struct Sequencer {
    tickets: TicketSequencer,
    /// Bits of the context kinds currently sequenced
    active: AtomicU8,
}

impl Sequencer {
    /// Create a sequencer active for `contexts`.
    pub const fn new(contexts: ContextSet) -> Self {
        Self {
            tickets: TicketSequencer::new(),
            active: AtomicU8::new(contexts.bits()),
        }
    }

    /// Whether `kind` currently takes part in sequencing.
    pub fn is_active(&self, kind: ContextKind) -> bool {
        ContextSet::from_bits(self.active.load(Ordering::Acquire)).contains(kind)
    }

    /// Start or stop sequencing `kind`. Turns already granted are unaffected.
    pub fn set_active(&self, kind: ContextKind, active: bool) {
        if active {
            self.active.fetch_or(kind.bit(), Ordering::AcqRel);
        } else {
            self.active.fetch_and(!kind.bit(), Ordering::AcqRel);
        }
    }

    /// Wait for the global turn on behalf of `core`.
    ///
    /// Spins until every earlier ticket has been released. On `Err` nothing
    /// is held and the caller must not release.
    pub fn acquire_turn(&self, kind: ContextKind, core: CoreId) -> Result<Turn<'_>, TurnDenied> {
        if !self.is_active(kind) {
            return Err(TurnDenied::Inactive(kind));
        }

        let ticket = self
            .tickets
            .acquire(core)
            .ok_or(TurnDenied::Reentrant(core))?;

        if ticket.spins > 0 {
            log::trace!(
                "core {} waited {} spins for {:?} turn {}",
                core,
                ticket.spins,
                kind,
                ticket.seq
            );
        }

        Ok(Turn {
            sequencer: self,
            core,
            kind,
            seq: ticket.seq,
        })
    }

    /// Release the turn held by `core`.
    ///
    /// Only needed by callers that [`Turn::leak`] their guard; dropping a
    /// [`Turn`] does this automatically.
    pub fn release_turn(&self, core: CoreId) -> Result<(), SequencerError> {
        self.tickets
            .release(core)
            .map_err(|err| SequencerError::NotHolder {
                core,
                holder: err.holder,
            })
    }

    /// Core currently holding the turn.
    pub fn holder(&self) -> Option<CoreId> {
        self.tickets.holder()
    }

    /// Number of turns handed out so far.
    pub fn issued(&self) -> u64 {
        self.tickets.issued()
    }
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new(ContextSet::ALL)
    }
}

/// A held turn. Released on drop.
#[must_use = "dropping a Turn releases it immediately"]
pub struct Turn<'a> {
    sequencer: &'a Sequencer,
    core: CoreId,
    kind: ContextKind,
    seq: SequenceNumber,
}

impl Turn<'_> {
    /// Position of this turn in the global order.
    pub fn seq(&self) -> SequenceNumber {
        self.seq
    }

    pub fn kind(&self) -> ContextKind {
        self.kind
    }

    pub fn core(&self) -> CoreId {
        self.core
    }

    /// Keep the turn held past this guard.
    ///
    /// The holder must later call [`Sequencer::release_turn`] from the same
    /// core, or every other core stalls.
    pub fn leak(self) -> SequenceNumber {
        let seq = self.seq;
        core::mem::forget(self);
        seq
    }
}

impl Drop for Turn<'_> {
    fn drop(&mut self) {
        // The guard exists only while `core` holds the turn.
        let released = self.sequencer.release_turn(self.core);
        debug_assert!(released.is_ok(), "turn guard released a foreign turn");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_released_on_drop() {
        let seq = Sequencer::default();
        {
            let turn = seq.acquire_turn(ContextKind::Syscall, 2).unwrap();
            assert_eq!(turn.seq(), 1);
            assert_eq!(turn.core(), 2);
            assert_eq!(seq.holder(), Some(2));
        }
        assert_eq!(seq.holder(), None);

        let turn = seq.acquire_turn(ContextKind::Interrupt, 0).unwrap();
        assert_eq!(turn.seq(), 2);
        assert_eq!(turn.kind(), ContextKind::Interrupt);
    }

    #[test]
    fn test_inactive_kind_is_denied() {
        let seq = Sequencer::new(ContextSet::NONE.with(ContextKind::Syscall));
        assert_eq!(
            seq.acquire_turn(ContextKind::Interrupt, 0).err(),
            Some(TurnDenied::Inactive(ContextKind::Interrupt))
        );
        assert_eq!(seq.issued(), 0);

        seq.set_active(ContextKind::Interrupt, true);
        assert!(seq.acquire_turn(ContextKind::Interrupt, 0).is_ok());

        seq.set_active(ContextKind::Syscall, false);
        assert!(!seq.is_active(ContextKind::Syscall));
    }

    #[test]
    fn test_nested_acquire_is_denied() {
        let seq = Sequencer::default();
        let outer = seq.acquire_turn(ContextKind::Syscall, 1).unwrap();

        assert_eq!(
            seq.acquire_turn(ContextKind::Interrupt, 1).err(),
            Some(TurnDenied::Reentrant(1))
        );
        drop(outer);
        assert_eq!(seq.holder(), None);
    }

    #[test]
    fn test_leaked_turn_needs_explicit_release() {
        let seq = Sequencer::default();
        let n = seq.acquire_turn(ContextKind::Exception, 3).unwrap().leak();
        assert_eq!(n, 1);
        assert_eq!(seq.holder(), Some(3));

        assert_eq!(
            seq.release_turn(4),
            Err(SequencerError::NotHolder {
                core: 4,
                holder: Some(3)
            })
        );
        seq.release_turn(3).unwrap();
        assert_eq!(
            seq.release_turn(3),
            Err(SequencerError::NotHolder {
                core: 3,
                holder: None
            })
        );
    }
}
