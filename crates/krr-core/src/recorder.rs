//! The recorder: process-wide capture state
//!
//! A [`Recorder`] owns the event log and the sequencer and borrows the host
//! through two seams: a [`Platform`] for masking and core identity, and a
//! [`ControlPlane`] for the gating flags. The capture adapters (see
//! `capture`) are methods on it.
//!
//! A kernel keeps one recorder in a `static`; everything is `const`
//! constructible and no heap is used after that:
//!
//! ```ignore
//! static RECORDER: Recorder<HostPlatform, &ControlFlags, 4096> =
//!     Recorder::new(HostPlatform, &CONTROL, RecorderConfig::DEFAULT);
//! ```

use krr_hal::{ControlPlane, CoreId, IrqFlags, Platform};

use crate::config::RecorderConfig;
use crate::error::SkipReason;
use crate::event_log::{EventLog, EventSlot};
use crate::sequencer::Sequencer;
use crate::types::{Event, EventRecord};

/// Deterministic record/replay capture engine.
pub struct Recorder<P: Platform, C: ControlPlane, const N: usize> {
    pub(crate) platform: P,
    control: C,
    pub(crate) sequencer: Sequencer,
    log: EventLog<N>,
}

impl<P: Platform, C: ControlPlane, const N: usize> Recorder<P, C, N> {
    /// Create a recorder with an empty log of `N` slots.
    pub const fn new(platform: P, control: C, config: RecorderConfig) -> Self {
        Self {
            platform,
            control,
            sequencer: Sequencer::new(config.sequenced_contexts),
            log: EventLog::new(),
        }
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn control(&self) -> &C {
        &self.control
    }

    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }

    /// Read access to the log for the replay consumer.
    pub fn log(&self) -> &EventLog<N> {
        &self.log
    }

    /// Whether captures currently record at all.
    ///
    /// Both queries are side-effect free; nothing else is touched when this
    /// returns `false`.
    pub fn gates_open(&self) -> bool {
        self.control.is_log_initialized() && self.control.is_recording_enabled()
    }

    /// Claim a log slot.
    ///
    /// Returns `None` when the log is uninitialized, recording is disabled,
    /// or the log is full. Callers drop the event in all three cases.
    pub fn allocate_slot(&self) -> Option<EventSlot<'_>> {
        if !self.gates_open() {
            return None;
        }
        self.log.allocate_slot()
    }

    /// Disable local interrupts and preemption until the guard drops.
    pub(crate) fn mask_local(&self) -> LocalMask<'_, P> {
        LocalMask::new(&self.platform)
    }

    /// Claim a slot and publish `event` from the masked core.
    pub(crate) fn publish(&self, mask: &LocalMask<'_, P>, event: Event) -> Result<usize, SkipReason> {
        if !self.gates_open() {
            return Err(SkipReason::Gated);
        }
        let slot = self.log.allocate_slot().ok_or(SkipReason::LogFull)?;
        let index = slot.index();
        slot.publish(EventRecord {
            origin: mask.core(),
            event,
        });
        Ok(index)
    }
}

/// Local interrupt and preemption mask, restored on drop.
///
/// While held, the executing core cannot change and no nested interrupt on
/// this core can start a capture of its own.
pub(crate) struct LocalMask<'a, P: Platform> {
    platform: &'a P,
    flags: IrqFlags,
    core: CoreId,
}

impl<'a, P: Platform> LocalMask<'a, P> {
    fn new(platform: &'a P) -> Self {
        let flags = platform.irq_save();
        platform.preempt_disable();
        let core = platform.current_core();
        Self {
            platform,
            flags,
            core,
        }
    }

    /// Core the capture runs on.
    pub(crate) fn core(&self) -> CoreId {
        self.core
    }
}

impl<P: Platform> Drop for LocalMask<'_, P> {
    fn drop(&mut self) {
        self.platform.preempt_enable();
        self.platform.irq_restore(self.flags);
    }
}
