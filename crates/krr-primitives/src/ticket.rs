//! FIFO ticket sequencer
//!
//! Hands out one global turn at a time. A core takes a ticket with a single
//! `fetch_add`, then spins until `now_serving` reaches its ticket. Tickets
//! are served strictly in the order they were taken, so the discipline is
//! starvation-free and the arrival order alone decides ties.
//!
//! # Invariants
//!
//! 1. **Exclusive turn**: at most one core is between `acquire` returning and
//!    the matching `release`
//! 2. **Unique sequence**: every granted [`Ticket`] carries a distinct
//!    sequence number, `ticket + 1`, so sequence numbers start at 1
//! 3. **Real-time order**: if a release completes before another core starts
//!    `acquire`, the later ticket is strictly greater
//!
//! There is no timeout: a holder that never releases stalls every later
//! ticket forever.

use crate::sync::{loom_const_fn, spin_hint, AtomicU64, Ordering};

/// `holder` value while nobody holds the turn. Core `c` is stored as `c + 1`,
/// which is wider than any `u32` core id, so no core can alias it.
const NO_HOLDER: u64 = 0;

fn encode(core: u32) -> u64 {
    u64::from(core) + 1
}

fn decode(holder: u64) -> Option<u32> {
    holder.checked_sub(1).map(|core| core as u32)
}

/// A granted turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ticket {
    /// Global sequence number of this turn (starts at 1)
    pub seq: u64,
    /// Number of spin iterations spent waiting for the turn
    pub spins: u64,
}

/// Release attempted by a core that does not hold the turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NotHolder {
    /// Core that attempted the release
    pub core: u32,
    /// Core actually holding the turn, if any
    pub holder: Option<u32>,
}

/// FIFO ticket sequencer shared by all cores.
pub struct TicketSequencer {
    /// Next ticket to hand out
    next_ticket: AtomicU64,
    /// Ticket currently allowed to hold the turn
    now_serving: AtomicU64,
    /// Encoded core id of the current holder, or `NO_HOLDER`
    holder: AtomicU64,
}

impl TicketSequencer {
    loom_const_fn! {
        /// Create a sequencer with no turn held and no ticket issued.
        pub fn new() -> Self {
            Self {
                next_ticket: AtomicU64::new(0),
                now_serving: AtomicU64::new(0),
                holder: AtomicU64::new(NO_HOLDER),
            }
        }
    }

    /// Wait for and take the turn on behalf of `core`.
    ///
    /// Returns `None` without taking a ticket if `core` already holds the
    /// turn: waiting would never end because the release can only come from
    /// `core` itself.
    pub fn acquire(&self, core: u32) -> Option<Ticket> {
        // Only `core` itself can store its own id, so this read is stable.
        if self.holder.load(Ordering::Acquire) == encode(core) {
            return None;
        }

        let ticket = self.next_ticket.fetch_add(1, Ordering::AcqRel);
        let mut spins = 0u64;
        while self.now_serving.load(Ordering::Acquire) != ticket {
            spins += 1;
            spin_hint();
        }

        self.holder.store(encode(core), Ordering::Release);
        Some(Ticket {
            seq: ticket + 1,
            spins,
        })
    }

    /// Give up the turn held by `core` and admit the next ticket.
    ///
    /// A release from a core that is not the holder changes nothing.
    pub fn release(&self, core: u32) -> Result<(), NotHolder> {
        match self.holder.compare_exchange(
            encode(core),
            NO_HOLDER,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {
                self.now_serving.fetch_add(1, Ordering::Release);
                Ok(())
            }
            Err(actual) => Err(NotHolder {
                core,
                holder: decode(actual),
            }),
        }
    }

    /// Core currently holding the turn.
    pub fn holder(&self) -> Option<u32> {
        decode(self.holder.load(Ordering::Acquire))
    }

    /// Number of tickets handed out so far.
    pub fn issued(&self) -> u64 {
        self.next_ticket.load(Ordering::Acquire)
    }
}

#[cfg(not(feature = "loom"))]
impl Default for TicketSequencer {
    fn default() -> Self {
        Self::new()
    }
}
