//! Capture adapters
//!
//! One entry point per nondeterministic event source. The host calls these
//! from its syscall, exception and interrupt entry paths and from the copy
//! and randomness helpers. Each adapter follows the same shape:
//!
//! 1. gate on the control plane (nothing is touched when closed)
//! 2. validate payload length (copy adapters only, fatal on violation)
//! 3. mask local interrupts and preemption
//! 4. take a turn (syscall, exception, interrupt only)
//! 5. claim a slot and publish the whole record
//! 6. release the turn, then unmask
//!
//! Steps 3, 4 and 6 are scoped guards, so every early return unwinds them in
//! the right order. Return values are informational; hosts may ignore them.

use krr_hal::{ControlPlane, CoreId, GpRegisters, HalError, KernelAddr, Platform, UserAddr};

use crate::error::{contract_violation, Capture, SkipReason};
use crate::recorder::Recorder;
use crate::sequencer::Turn;
use crate::types::{
    ContextKind, Event, ExceptionEvent, InlineBytes, InterruptEvent, InterruptSource, RandomEvent,
    SyscallEvent, UserCopyEvent, MAX_COPY_BYTES, MAX_RANDOM_BYTES, UNSEQUENCED,
};

impl<P: Platform, C: ControlPlane, const N: usize> Recorder<P, C, N> {
    /// Record a syscall entry.
    ///
    /// Recorded with sequence number 0 if no turn is granted. Log exhaustion
    /// is the one drop that gets a diagnostic.
    pub fn on_syscall(&self, regs: &GpRegisters) -> Capture {
        if !self.gates_open() {
            return Capture::Skipped(SkipReason::Gated);
        }
        let mask = self.mask_local();
        let turn = self.turn_or_trace(ContextKind::Syscall, mask.core());

        let event = Event::Syscall(SyscallEvent {
            regs: *regs,
            nr: regs.rax,
            address_space_root: self.platform.address_space_root(),
            seq: turn.as_ref().map_or(UNSEQUENCED, Turn::seq),
        });

        let outcome = self.finish(&mask, event, turn.as_ref());
        let core = mask.core();
        // The host logger may lock; never call it inside the turn.
        drop(turn);
        drop(mask);

        if outcome == Capture::Skipped(SkipReason::LogFull) {
            log::error!("record/replay: no slot for syscall {} on core {}", regs.rax, core);
        }
        outcome
    }

    /// Record an exception or fault entry.
    pub fn on_exception(
        &self,
        regs: &GpRegisters,
        vector: u32,
        error_code: u64,
        fault_addr: u64,
    ) -> Capture {
        if !self.gates_open() {
            return Capture::Skipped(SkipReason::Gated);
        }
        let mask = self.mask_local();
        let turn = self.turn_or_trace(ContextKind::Exception, mask.core());

        let event = Event::Exception(ExceptionEvent {
            regs: *regs,
            vector,
            error_code,
            fault_addr,
            seq: turn.as_ref().map_or(UNSEQUENCED, Turn::seq),
        });
        self.finish(&mask, event, turn.as_ref())
    }

    /// Record an external interrupt.
    ///
    /// Best-effort: without a turn nothing is recorded and no slot is used.
    pub fn on_interrupt(&self) -> Capture {
        if !self.gates_open() {
            return Capture::Skipped(SkipReason::Gated);
        }
        let mask = self.mask_local();
        let turn = match self.sequencer.acquire_turn(ContextKind::Interrupt, mask.core()) {
            Ok(turn) => turn,
            Err(denied) => return Capture::Skipped(SkipReason::NoTurn(denied)),
        };

        let event = Event::Interrupt(InterruptEvent {
            source: InterruptSource::External,
            seq: turn.seq(),
        });
        self.finish(&mask, event, Some(&turn))
    }

    /// Record random bytes handed out by the kernel.
    ///
    /// Only the first [`MAX_RANDOM_BYTES`] are kept; the requested length is
    /// recorded in full.
    pub fn on_random_bytes(&self, buf: &[u8]) -> Capture {
        if !self.gates_open() {
            return Capture::Skipped(SkipReason::Gated);
        }
        if buf.len() > MAX_RANDOM_BYTES {
            log::warn!(
                "record/replay: random request of {} bytes truncated to {}",
                buf.len(),
                MAX_RANDOM_BYTES
            );
        }
        let mask = self.mask_local();

        let event = Event::Random(RandomEvent {
            requested: buf.len(),
            buf_addr: buf.as_ptr() as KernelAddr,
            bytes: InlineBytes::truncated(buf),
        });
        self.finish(&mask, event, None)
    }

    /// Record a copy of `len` bytes from user address `src` into kernel
    /// address `dst`.
    ///
    /// The content is re-read from user memory. A fault during that read is
    /// recorded anyway, with the unread tail zeroed.
    ///
    /// # Panics
    ///
    /// If `len` exceeds [`MAX_COPY_BYTES`] while recording is on.
    pub fn on_copy_from_user(&self, src: UserAddr, dst: KernelAddr, len: usize) -> Capture {
        if !self.gates_open() {
            return Capture::Skipped(SkipReason::Gated);
        }
        let Some(mut data) = InlineBytes::<MAX_COPY_BYTES>::zeroed(len) else {
            contract_violation("copy from user", len, MAX_COPY_BYTES)
        };
        let mask = self.mask_local();

        if let Err(err) = self.platform.copy_from_user(data.as_mut_slice(), src) {
            let copied = match err {
                HalError::UserFault { copied } => copied.min(len),
                HalError::NotSupported => 0,
            };
            data.as_mut_slice()[copied..].fill(0);
            log::warn!(
                "record/replay: user copy at {:#x} faulted after {} of {} bytes: {}",
                src,
                copied,
                len,
                err
            );
        }

        let event = Event::UserCopyIn(UserCopyEvent { src, dst, data });
        self.finish(&mask, event, None)
    }

    /// Record a string copied from user address `src`; `dst` is the kernel
    /// buffer as filled by the copy.
    ///
    /// # Panics
    ///
    /// If `dst` is longer than [`MAX_COPY_BYTES`] while recording is on.
    pub fn on_copy_string(&self, src: UserAddr, dst: &[u8]) -> Capture {
        if !self.gates_open() {
            return Capture::Skipped(SkipReason::Gated);
        }
        let Some(data) = InlineBytes::<MAX_COPY_BYTES>::from_slice(dst) else {
            contract_violation("string copy", dst.len(), MAX_COPY_BYTES)
        };
        let mask = self.mask_local();

        let event = Event::UserCopyOut(UserCopyEvent {
            src,
            dst: dst.as_ptr() as KernelAddr,
            data,
        });
        self.finish(&mask, event, None)
    }

    /// Record the result of a user string length probe.
    pub fn on_strnlen_user(&self, value: u64) -> Capture {
        self.capture_unsequenced(Event::StrnlenProbe { value })
    }

    /// Record a value returned by the hardware seed instruction.
    pub fn on_rdseed(&self, value: u64) -> Capture {
        self.capture_unsequenced(Event::SeedRead { value })
    }

    /// Record a scalar fetched from user memory.
    pub fn on_get_user(&self, value: u64) -> Capture {
        self.capture_unsequenced(Event::UserGet { value })
    }

    /// Record that `core` gave up recording responsibility.
    ///
    /// Independent of the sequencer: no turn is taken or released. The
    /// record's origin is always the executing core.
    pub fn on_release(&self, core: CoreId) -> Capture {
        if !self.gates_open() {
            return Capture::Skipped(SkipReason::Gated);
        }
        let mask = self.mask_local();
        if core != mask.core() {
            log::warn!(
                "record/replay: release for core {} issued on core {}",
                core,
                mask.core()
            );
        }
        self.finish(&mask, Event::Release, None)
    }

    fn capture_unsequenced(&self, event: Event) -> Capture {
        if !self.gates_open() {
            return Capture::Skipped(SkipReason::Gated);
        }
        let mask = self.mask_local();
        self.finish(&mask, event, None)
    }

    /// Turn for a kind that records even without one.
    fn turn_or_trace(&self, kind: ContextKind, core: CoreId) -> Option<Turn<'_>> {
        match self.sequencer.acquire_turn(kind, core) {
            Ok(turn) => Some(turn),
            Err(denied) => {
                log::trace!("record/replay: {:?} on core {} unsequenced: {}", kind, core, denied);
                None
            }
        }
    }

    fn finish(
        &self,
        mask: &crate::recorder::LocalMask<'_, P>,
        event: Event,
        turn: Option<&Turn<'_>>,
    ) -> Capture {
        match self.publish(mask, event) {
            Ok(slot) => Capture::Recorded {
                slot,
                seq: turn.map(Turn::seq),
            },
            Err(reason) => Capture::Skipped(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ContextSet, RecorderConfig};
    use crate::control::ControlFlags;
    use crate::types::EventKind;
    use krr_hal::IrqFlags;

    use core::sync::atomic::{AtomicU32, Ordering};

    /// Single-core platform with scripted user memory.
    struct OneCore {
        masked: AtomicU32,
        user: &'static [u8],
    }

    impl Platform for OneCore {
        fn current_core(&self) -> CoreId {
            0
        }
        fn irq_save(&self) -> IrqFlags {
            self.masked.fetch_add(1, Ordering::Relaxed);
            IrqFlags(0x200)
        }
        fn irq_restore(&self, _flags: IrqFlags) {
            self.masked.fetch_sub(1, Ordering::Relaxed);
        }
        fn preempt_disable(&self) {}
        fn preempt_enable(&self) {}
        fn address_space_root(&self) -> u64 {
            0xabc000
        }
        fn copy_from_user(&self, dst: &mut [u8], _src: UserAddr) -> Result<(), HalError> {
            let n = dst.len().min(self.user.len());
            dst[..n].copy_from_slice(&self.user[..n]);
            dst[n..].fill(0xff);
            if n < dst.len() {
                Err(HalError::UserFault { copied: n })
            } else {
                Ok(())
            }
        }
    }

    fn recorder(user: &'static [u8]) -> Recorder<OneCore, ControlFlags, 8> {
        let flags = ControlFlags::new();
        flags.initialize().unwrap();
        flags.enable().unwrap();
        Recorder::new(
            OneCore {
                masked: AtomicU32::new(0),
                user,
            },
            flags,
            RecorderConfig::DEFAULT,
        )
    }

    #[test]
    fn test_syscall_captures_number_and_root() {
        let rec = recorder(b"");
        let regs = GpRegisters {
            rax: 60,
            ..GpRegisters::default()
        };

        assert_eq!(rec.on_syscall(&regs), Capture::Recorded { slot: 0, seq: Some(1) });

        let record = rec.log().get(0).unwrap();
        match record.event {
            Event::Syscall(e) => {
                assert_eq!(e.nr, 60);
                assert_eq!(e.address_space_root, 0xabc000);
                assert_eq!(e.seq, 1);
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(rec.sequencer().holder(), None);
        assert_eq!(rec.platform().masked.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_exception_without_turn_records_seq_zero() {
        let flags = ControlFlags::new();
        flags.initialize().unwrap();
        flags.enable().unwrap();
        let config = RecorderConfig {
            sequenced_contexts: ContextSet::ALL.without(ContextKind::Exception),
        };
        let rec: Recorder<_, _, 4> = Recorder::new(
            OneCore {
                masked: AtomicU32::new(0),
                user: b"",
            },
            flags,
            config,
        );

        let out = rec.on_exception(&GpRegisters::default(), 14, 2, 0xdead);
        assert_eq!(out, Capture::Recorded { slot: 0, seq: None });
        match rec.log().get(0).unwrap().event {
            Event::Exception(e) => {
                assert_eq!(e.seq, UNSEQUENCED);
                assert_eq!(e.vector, 14);
                assert_eq!(e.fault_addr, 0xdead);
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(rec.sequencer().issued(), 0);
    }

    #[test]
    fn test_copy_fault_zeroes_unread_tail() {
        let rec = recorder(b"ab");
        assert!(rec.on_copy_from_user(0x4000, 0x9000, 4).is_recorded());

        match rec.log().get(0).unwrap().event {
            Event::UserCopyIn(e) => {
                assert_eq!(e.len(), 4);
                assert_eq!(e.data.as_slice(), b"ab\0\0");
                assert_eq!(e.src, 0x4000);
                assert_eq!(e.dst, 0x9000);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_random_bytes_truncated_keeps_requested_len() {
        let rec = recorder(b"");
        let buf = [7u8; MAX_RANDOM_BYTES + 10];
        assert!(rec.on_random_bytes(&buf).is_recorded());

        match rec.log().get(0).unwrap().event {
            Event::Random(e) => {
                assert_eq!(e.requested, MAX_RANDOM_BYTES + 10);
                assert_eq!(e.bytes.len(), MAX_RANDOM_BYTES);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_scalar_adapters() {
        let rec = recorder(b"");
        rec.on_strnlen_user(12);
        rec.on_rdseed(0x5eed);
        rec.on_get_user(3);
        rec.on_release(0);

        let kinds: alloc::vec::Vec<EventKind> = rec.log().iter().map(|(_, r)| r.kind()).collect();
        assert_eq!(
            kinds,
            [
                EventKind::StrnlenProbe,
                EventKind::SeedRead,
                EventKind::UserGet,
                EventKind::Release
            ]
        );
        assert_eq!(rec.sequencer().issued(), 0);
    }

    #[test]
    fn test_interrupt_reentry_is_skipped() {
        let rec = recorder(b"");
        let outer = rec.sequencer().acquire_turn(ContextKind::Syscall, 0).unwrap();

        let out = rec.on_interrupt();
        assert!(matches!(out, Capture::Skipped(SkipReason::NoTurn(_))));
        assert!(rec.log().is_empty());
        drop(outer);

        assert_eq!(rec.on_interrupt(), Capture::Recorded { slot: 0, seq: Some(2) });
    }
}
