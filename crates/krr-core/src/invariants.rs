//! Formal invariants for a captured event log
//!
//! Runtime-checkable properties every log produced by the recorder must
//! satisfy. Used by the integration tests after concurrent scenarios and by
//! replay tooling before trusting an exported snapshot.
//!
//! # Invariants
//!
//! 1. **Slot Order**: records are listed in strictly increasing slot order
//! 2. **Sequence Order**: sequenced records appear in strictly increasing
//!    sequence order when read in slot order
//! 3. **Sequence Uniqueness**: no two records carry the same sequence number
//! 4. **Interrupts Sequenced**: an interrupt record always carries a turn
//! 5. **Payload Bounds**: random records keep `min(requested, MAX)` bytes
//!
//! Copy lengths need no check: `InlineBytes<MAX_COPY_BYTES>` cannot hold
//! more, and deserialization rejects longer input.

use alloc::string::String;
use alloc::vec::Vec;

use crate::types::{Event, EventRecord, SequenceNumber, MAX_RANDOM_BYTES};

/// An invariant violation with details
#[derive(Clone, Debug)]
pub struct InvariantViolation {
    /// Name of the violated invariant
    pub invariant: &'static str,
    /// Description of what went wrong
    pub description: String,
}

/// Check all log invariants over `(slot, record)` pairs in slot order, as
/// produced by [`crate::EventLog::snapshot`].
///
/// Returns a list of violations (empty if all invariants hold).
pub fn check_log_invariants(records: &[(usize, EventRecord)]) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();

    violations.extend(check_slot_order(records));
    violations.extend(check_sequence_order(records));
    violations.extend(check_interrupts_sequenced(records));
    violations.extend(check_payload_bounds(records));

    violations
}

/// Invariant 1: slots strictly increase
fn check_slot_order(records: &[(usize, EventRecord)]) -> Vec<InvariantViolation> {
    records
        .windows(2)
        .filter(|pair| pair[0].0 >= pair[1].0)
        .map(|pair| InvariantViolation {
            invariant: "slot_order",
            description: alloc::format!("slot {} listed after slot {}", pair[1].0, pair[0].0),
        })
        .collect()
}

/// Invariants 2 and 3: sequence numbers strictly increase in slot order
fn check_sequence_order(records: &[(usize, EventRecord)]) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();
    let mut last: Option<(usize, SequenceNumber)> = None;

    for (slot, record) in records {
        let Some(seq) = record.seq() else {
            continue;
        };

        if let Some((last_slot, last_seq)) = last {
            if seq == last_seq {
                violations.push(InvariantViolation {
                    invariant: "sequence_unique",
                    description: alloc::format!(
                        "slots {} and {} both carry sequence number {}",
                        last_slot,
                        slot,
                        seq
                    ),
                });
            } else if seq < last_seq {
                violations.push(InvariantViolation {
                    invariant: "sequence_order",
                    description: alloc::format!(
                        "slot {} has sequence {} but earlier slot {} has {}",
                        slot,
                        seq,
                        last_slot,
                        last_seq
                    ),
                });
            }
        }

        // Keep the high-water mark so one out-of-order record is reported once.
        if last.map_or(true, |(_, last_seq)| seq > last_seq) {
            last = Some((*slot, seq));
        }
    }

    violations
}

/// Invariant 4: interrupts are only recorded with a turn
fn check_interrupts_sequenced(records: &[(usize, EventRecord)]) -> Vec<InvariantViolation> {
    records
        .iter()
        .filter(|(_, record)| matches!(record.event, Event::Interrupt(_)) && record.seq().is_none())
        .map(|(slot, record)| InvariantViolation {
            invariant: "interrupts_sequenced",
            description: alloc::format!(
                "interrupt in slot {} from core {} has no sequence number",
                slot,
                record.origin
            ),
        })
        .collect()
}

/// Invariant 5: payload sizes respect the record limits
fn check_payload_bounds(records: &[(usize, EventRecord)]) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();

    for (slot, record) in records {
        let Event::Random(random) = &record.event else {
            continue;
        };
        let expected = random.requested.min(MAX_RANDOM_BYTES);
        if random.bytes.len() != expected {
            violations.push(InvariantViolation {
                invariant: "payload_bounds",
                description: alloc::format!(
                    "random record in slot {} holds {} bytes for a request of {}",
                    slot,
                    random.bytes.len(),
                    random.requested
                ),
            });
        }
    }

    violations
}
