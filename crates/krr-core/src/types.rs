//! Event record format
//!
//! Every captured event is one [`EventRecord`]: the originating core plus an
//! [`Event`] whose variant *is* the record's kind. Payloads are fixed-size and
//! inline, so a record can be written into a pre-reserved log slot from any
//! execution context without allocating.

use core::fmt;

use serde::de::{self, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub use krr_hal::{CoreId, GpRegisters, KernelAddr, UserAddr};

/// Maximum number of bytes captured by one user-copy record
pub const MAX_COPY_BYTES: usize = 1024;

/// Maximum number of bytes captured by one random-bytes record
pub const MAX_RANDOM_BYTES: usize = 1024;

/// Position of a sequenced event in the global total order.
///
/// Granted sequence numbers start at 1. Zero marks a syscall or exception
/// recorded without a turn.
pub type SequenceNumber = u64;

/// Sequence number stored when no turn was granted
pub const UNSEQUENCED: SequenceNumber = 0;

/// Execution context asking the sequencer for a turn
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ContextKind {
    Syscall = 0,
    Exception = 1,
    Interrupt = 2,
}

impl ContextKind {
    /// All context kinds, in bit order.
    pub const ALL: [ContextKind; 3] = [Self::Syscall, Self::Exception, Self::Interrupt];

    /// Bit of this kind in a [`crate::config::ContextSet`].
    pub const fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

/// Record kind tag
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventKind {
    Syscall = 0,
    Exception = 1,
    Interrupt = 2,
    Random = 3,
    UserCopyIn = 4,
    UserCopyOut = 5,
    StrnlenProbe = 6,
    SeedRead = 7,
    UserGet = 8,
    Release = 9,
}

/// Where an interrupt came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum InterruptSource {
    /// External device interrupt (IRQ)
    External = 3,
}

/// Fixed-capacity inline byte buffer.
///
/// Holds at most `N` bytes; only the first `len()` are meaningful. The unused
/// tail is always zero, so two buffers with equal contents are bit-identical.
#[derive(Clone, Copy)]
pub struct InlineBytes<const N: usize> {
    len: usize,
    data: [u8; N],
}

impl<const N: usize> InlineBytes<N> {
    /// Capacity in bytes
    pub const CAPACITY: usize = N;

    /// Empty buffer
    pub const EMPTY: Self = Self {
        len: 0,
        data: [0; N],
    };

    /// Copy `bytes` in, or `None` if they do not fit.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        if bytes.len() > N {
            return None;
        }
        let mut out = Self::EMPTY;
        out.data[..bytes.len()].copy_from_slice(bytes);
        out.len = bytes.len();
        Some(out)
    }

    /// Copy in as many leading bytes of `bytes` as fit.
    pub fn truncated(bytes: &[u8]) -> Self {
        let len = bytes.len().min(N);
        let mut out = Self::EMPTY;
        out.data[..len].copy_from_slice(&bytes[..len]);
        out.len = len;
        out
    }

    /// Zero-filled buffer of `len` bytes, or `None` if `len > N`.
    pub fn zeroed(len: usize) -> Option<Self> {
        (len <= N).then_some(Self { len, data: [0; N] })
    }

    /// Meaningful bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Meaningful bytes, writable.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<const N: usize> PartialEq for InlineBytes<N> {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<const N: usize> Eq for InlineBytes<N> {}

impl<const N: usize> fmt::Debug for InlineBytes<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InlineBytes")
            .field("len", &self.len)
            .field("data", &self.as_slice())
            .finish()
    }
}

impl<const N: usize> Serialize for InlineBytes<N> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(self.as_slice())
    }
}

impl<'de, const N: usize> Deserialize<'de> for InlineBytes<N> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct BytesVisitor<const N: usize>;

        impl<'de, const N: usize> Visitor<'de> for BytesVisitor<N> {
            type Value = InlineBytes<N>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "at most {} bytes", N)
            }

            fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
                InlineBytes::from_slice(v).ok_or_else(|| E::invalid_length(v.len(), &self))
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut out = InlineBytes::<N>::EMPTY;
                while let Some(byte) = seq.next_element::<u8>()? {
                    if out.len == N {
                        return Err(de::Error::invalid_length(N + 1, &self));
                    }
                    out.data[out.len] = byte;
                    out.len += 1;
                }
                Ok(out)
            }
        }

        deserializer.deserialize_bytes(BytesVisitor::<N>)
    }
}

/// Syscall entry payload
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyscallEvent {
    /// Register snapshot at entry
    pub regs: GpRegisters,
    /// Syscall number (original rax)
    pub nr: u64,
    /// Active address-space root register
    pub address_space_root: u64,
    /// Turn sequence number, [`UNSEQUENCED`] if no turn was granted
    pub seq: SequenceNumber,
}

/// Exception or fault entry payload
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionEvent {
    /// Register snapshot at entry
    pub regs: GpRegisters,
    /// Exception vector
    pub vector: u32,
    /// Hardware error code
    pub error_code: u64,
    /// Faulting address (CR2 for page faults)
    pub fault_addr: u64,
    /// Turn sequence number, [`UNSEQUENCED`] if no turn was granted
    pub seq: SequenceNumber,
}

/// Interrupt entry payload
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterruptEvent {
    pub source: InterruptSource,
    /// Turn sequence number (interrupts are only recorded with a turn)
    pub seq: SequenceNumber,
}

/// Random bytes handed out by the kernel
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomEvent {
    /// Length the caller asked for
    pub requested: usize,
    /// Address of the buffer the bytes were written to (informational)
    pub buf_addr: KernelAddr,
    /// Bytes actually captured (first `MAX_RANDOM_BYTES` at most)
    pub bytes: InlineBytes<MAX_RANDOM_BYTES>,
}

/// Bytes moved between user and kernel memory
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCopyEvent {
    pub src: u64,
    pub dst: u64,
    /// Copied content; its length is the copy length
    pub data: InlineBytes<MAX_COPY_BYTES>,
}

impl UserCopyEvent {
    /// Copy length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Captured nondeterministic event. The variant is the record kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    Syscall(SyscallEvent),
    Exception(ExceptionEvent),
    Interrupt(InterruptEvent),
    Random(RandomEvent),
    UserCopyIn(UserCopyEvent),
    UserCopyOut(UserCopyEvent),
    /// Result of a user string length probe
    StrnlenProbe { value: u64 },
    /// Value returned by a hardware seed read
    SeedRead { value: u64 },
    /// Scalar fetched from user memory
    UserGet { value: u64 },
    /// A core voluntarily gave up recording responsibility
    Release,
}

impl Event {
    /// Kind tag of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Syscall(_) => EventKind::Syscall,
            Event::Exception(_) => EventKind::Exception,
            Event::Interrupt(_) => EventKind::Interrupt,
            Event::Random(_) => EventKind::Random,
            Event::UserCopyIn(_) => EventKind::UserCopyIn,
            Event::UserCopyOut(_) => EventKind::UserCopyOut,
            Event::StrnlenProbe { .. } => EventKind::StrnlenProbe,
            Event::SeedRead { .. } => EventKind::SeedRead,
            Event::UserGet { .. } => EventKind::UserGet,
            Event::Release => EventKind::Release,
        }
    }

    /// Sequence number carried by sequenced kinds.
    ///
    /// `None` for unsequenced kinds and for syscalls or exceptions recorded
    /// without a turn.
    pub fn seq(&self) -> Option<SequenceNumber> {
        let seq = match self {
            Event::Syscall(e) => e.seq,
            Event::Exception(e) => e.seq,
            Event::Interrupt(e) => e.seq,
            _ => return None,
        };
        (seq != UNSEQUENCED).then_some(seq)
    }
}

/// One slot of the event log
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Core that was executing when the event was captured
    pub origin: CoreId,
    pub event: Event,
}

impl EventRecord {
    pub fn kind(&self) -> EventKind {
        self.event.kind()
    }

    pub fn seq(&self) -> Option<SequenceNumber> {
        self.event.seq()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_bytes_bounds() {
        assert_eq!(InlineBytes::<4>::from_slice(b"abcd").unwrap().as_slice(), b"abcd");
        assert!(InlineBytes::<4>::from_slice(b"abcde").is_none());
        assert!(InlineBytes::<4>::zeroed(5).is_none());
        assert_eq!(InlineBytes::<4>::truncated(b"abcdef").as_slice(), b"abcd");
        assert!(InlineBytes::<4>::EMPTY.is_empty());
    }

    #[test]
    fn test_inline_bytes_equality_ignores_capacity_tail() {
        let mut a = InlineBytes::<8>::zeroed(3).unwrap();
        a.as_mut_slice().copy_from_slice(b"xyz");
        assert_eq!(a, InlineBytes::from_slice(b"xyz").unwrap());
    }

    #[test]
    fn test_inline_bytes_rejects_oversized_input() {
        let ok: InlineBytes<3> = serde_json::from_str("[1,2,3]").unwrap();
        assert_eq!(ok.as_slice(), &[1, 2, 3]);

        let too_long: Result<InlineBytes<3>, _> = serde_json::from_str("[1,2,3,4]");
        assert!(too_long.is_err());
    }

    #[test]
    fn test_event_kind_and_seq() {
        let syscall = Event::Syscall(SyscallEvent {
            regs: GpRegisters::default(),
            nr: 1,
            address_space_root: 0,
            seq: UNSEQUENCED,
        });
        assert_eq!(syscall.kind(), EventKind::Syscall);
        assert_eq!(syscall.seq(), None);

        let irq = Event::Interrupt(InterruptEvent {
            source: InterruptSource::External,
            seq: 4,
        });
        assert_eq!(irq.seq(), Some(4));
        assert_eq!(Event::SeedRead { value: 9 }.seq(), None);
        assert_eq!(Event::Release.kind(), EventKind::Release);
    }

    #[test]
    fn test_context_bits_are_distinct() {
        let mut seen = 0u8;
        for kind in ContextKind::ALL {
            assert_eq!(seen & kind.bit(), 0);
            seen |= kind.bit();
        }
        assert_eq!(seen, 0b111);
    }
}
