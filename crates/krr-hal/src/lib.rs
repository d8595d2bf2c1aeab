//! Host Abstraction Layer for the record/replay capture core
//!
//! The capture core runs inside a host kernel's syscall, fault, and interrupt
//! paths. Everything it needs from that kernel is reached through the two
//! traits defined here, so the core itself stays platform-free:
//!
//! - [`Platform`]: executing core identity, local interrupt and preemption
//!   masking, the active address-space root, and the raw user-memory copy
//! - [`ControlPlane`]: the two read-only gating queries owned by the
//!   record/replay control component
//!
//! # Platform Implementations
//!
//! - **Host kernel**: thin wrappers over `local_irq_save`, `preempt_disable`,
//!   `smp_processor_id`, CR3 and `raw_copy_from_user`
//! - **Mock** (`krr-hal-mock`): per-thread simulated cores for tests

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate alloc;

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Identifier of a CPU core.
pub type CoreId = u32;

/// Address in user space (never dereferenced by the core).
pub type UserAddr = u64;

/// Address in kernel space (recorded for information only).
pub type KernelAddr = u64;

/// Saved local interrupt state, returned by [`Platform::irq_save`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IrqFlags(pub u64);

/// General-purpose register snapshot taken at syscall or exception entry.
///
/// `rax` holds the *original* rax at entry (the syscall number on the
/// syscall path), not the return value slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GpRegisters {
    pub rax: u64,
    pub rbx: u64,
    pub rcx: u64,
    pub rdx: u64,
    pub rsi: u64,
    pub rdi: u64,
    pub rsp: u64,
    pub rbp: u64,
    pub r8: u64,
    pub r9: u64,
    pub r10: u64,
    pub r11: u64,
    pub r12: u64,
    pub r13: u64,
    pub r14: u64,
    pub r15: u64,
}

/// Host platform operations used on the capture path.
///
/// Every method may be called with local interrupts disabled, so none of
/// them may block or allocate.
pub trait Platform: Send + Sync {
    /// Core executing the caller.
    fn current_core(&self) -> CoreId;

    /// Disable local interrupts, returning the previous state.
    fn irq_save(&self) -> IrqFlags;

    /// Restore the local interrupt state saved by [`Platform::irq_save`].
    fn irq_restore(&self, flags: IrqFlags);

    /// Disable preemption on the local core (nests).
    fn preempt_disable(&self);

    /// Re-enable preemption on the local core.
    fn preempt_enable(&self);

    /// Current address-space root register (CR3 on x86_64).
    fn address_space_root(&self) -> u64;

    /// Copy `dst.len()` bytes from user address `src` without faulting
    /// into the host's fixup path.
    ///
    /// # Returns
    /// * `Ok(())` - All bytes copied
    /// * `Err(HalError::UserFault { copied })` - Only `copied` bytes were readable
    fn copy_from_user(&self, dst: &mut [u8], src: UserAddr) -> Result<(), HalError>;
}

/// Read-only view of the record/replay control plane.
///
/// Both queries must be cheap and side-effect free; they are evaluated on
/// every capture before anything else happens.
pub trait ControlPlane: Send + Sync {
    /// Whether the event log was initialized for this session.
    fn is_log_initialized(&self) -> bool;

    /// Whether recording is currently enabled.
    fn is_recording_enabled(&self) -> bool;
}

impl<T: Platform + ?Sized> Platform for &T {
    fn current_core(&self) -> CoreId {
        (**self).current_core()
    }

    fn irq_save(&self) -> IrqFlags {
        (**self).irq_save()
    }

    fn irq_restore(&self, flags: IrqFlags) {
        (**self).irq_restore(flags)
    }

    fn preempt_disable(&self) {
        (**self).preempt_disable()
    }

    fn preempt_enable(&self) {
        (**self).preempt_enable()
    }

    fn address_space_root(&self) -> u64 {
        (**self).address_space_root()
    }

    fn copy_from_user(&self, dst: &mut [u8], src: UserAddr) -> Result<(), HalError> {
        (**self).copy_from_user(dst, src)
    }
}

impl<T: ControlPlane + ?Sized> ControlPlane for &T {
    fn is_log_initialized(&self) -> bool {
        (**self).is_log_initialized()
    }

    fn is_recording_enabled(&self) -> bool {
        (**self).is_recording_enabled()
    }
}

/// HAL errors
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HalError {
    /// User memory access faulted after `copied` bytes
    UserFault { copied: usize },
    /// Operation not supported on this platform
    NotSupported,
}

impl fmt::Display for HalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HalError::UserFault { copied } => {
                write!(f, "user memory fault after {} bytes", copied)
            }
            HalError::NotSupported => write!(f, "operation not supported"),
        }
    }
}
