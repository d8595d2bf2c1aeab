//! Recording control plane
//!
//! Owns the session lifecycle and the two gating flags every capture checks:
//!
//! ```text
//! Uninitialized ──initialize──▶ Disabled ◀──disable── Enabled
//!                                  │  ──────enable──────▶ │
//!                                  └──────teardown──────▶ TornDown ◀─┘
//! ```
//!
//! The recorder only ever reads these flags through [`ControlPlane`]; it
//! never transitions them.

use core::fmt;
use core::sync::atomic::{AtomicU8, Ordering};

use krr_hal::ControlPlane;

/// Session lifecycle state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    /// Log storage not yet initialized
    Uninitialized = 0,
    /// Log initialized, recording off
    Disabled = 1,
    /// Log initialized, recording on
    Enabled = 2,
    /// Session over; never records again
    TornDown = 3,
}

impl SessionState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => SessionState::Uninitialized,
            1 => SessionState::Disabled,
            2 => SessionState::Enabled,
            _ => SessionState::TornDown,
        }
    }
}

/// Illegal lifecycle transition
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleError {
    /// `initialize` called twice
    AlreadyInitialized,
    /// Transition requires an initialized log
    NotInitialized,
    /// Session already torn down
    TornDown,
}

impl fmt::Display for LifecycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleError::AlreadyInitialized => write!(f, "event log already initialized"),
            LifecycleError::NotInitialized => write!(f, "event log not initialized"),
            LifecycleError::TornDown => write!(f, "recording session torn down"),
        }
    }
}

/// Process-wide recording flags with an explicit lifecycle.
pub struct ControlFlags {
    state: AtomicU8,
}

impl ControlFlags {
    /// Create flags in the `Uninitialized` state.
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(SessionState::Uninitialized as u8),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Mark the log as initialized (recording stays off).
    pub fn initialize(&self) -> Result<(), LifecycleError> {
        self.transition(|state| match state {
            SessionState::Uninitialized => Ok(SessionState::Disabled),
            SessionState::Disabled | SessionState::Enabled => {
                Err(LifecycleError::AlreadyInitialized)
            }
            SessionState::TornDown => Err(LifecycleError::TornDown),
        })
    }

    /// Turn recording on. Idempotent.
    pub fn enable(&self) -> Result<(), LifecycleError> {
        self.transition(|state| match state {
            SessionState::Disabled | SessionState::Enabled => Ok(SessionState::Enabled),
            SessionState::Uninitialized => Err(LifecycleError::NotInitialized),
            SessionState::TornDown => Err(LifecycleError::TornDown),
        })
    }

    /// Turn recording off. Idempotent.
    pub fn disable(&self) -> Result<(), LifecycleError> {
        self.transition(|state| match state {
            SessionState::Disabled | SessionState::Enabled => Ok(SessionState::Disabled),
            SessionState::Uninitialized => Err(LifecycleError::NotInitialized),
            SessionState::TornDown => Err(LifecycleError::TornDown),
        })
    }

    /// End the session. Captures become no-ops for good.
    pub fn teardown(&self) -> Result<(), LifecycleError> {
        self.transition(|state| match state {
            SessionState::Disabled | SessionState::Enabled => Ok(SessionState::TornDown),
            SessionState::Uninitialized => Err(LifecycleError::NotInitialized),
            SessionState::TornDown => Err(LifecycleError::TornDown),
        })
    }

    fn transition<F>(&self, next: F) -> Result<(), LifecycleError>
    where
        F: Fn(SessionState) -> Result<SessionState, LifecycleError>,
    {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            let target = next(SessionState::from_u8(current))?;
            match self.state.compare_exchange_weak(
                current,
                target as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(()),
                Err(actual) => current = actual,
            }
        }
    }
}

impl Default for ControlFlags {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlPlane for ControlFlags {
    fn is_log_initialized(&self) -> bool {
        matches!(self.state(), SessionState::Disabled | SessionState::Enabled)
    }

    fn is_recording_enabled(&self) -> bool {
        self.state() == SessionState::Enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_lifecycle() {
        let flags = ControlFlags::new();
        assert!(!flags.is_log_initialized());
        assert!(!flags.is_recording_enabled());

        flags.initialize().unwrap();
        assert!(flags.is_log_initialized());
        assert!(!flags.is_recording_enabled());

        flags.enable().unwrap();
        assert!(flags.is_recording_enabled());
        flags.enable().unwrap();

        flags.disable().unwrap();
        assert!(!flags.is_recording_enabled());
        assert!(flags.is_log_initialized());

        flags.teardown().unwrap();
        assert_eq!(flags.state(), SessionState::TornDown);
        assert!(!flags.is_log_initialized());
    }

    #[test]
    fn test_illegal_transitions() {
        let flags = ControlFlags::new();
        assert_eq!(flags.enable(), Err(LifecycleError::NotInitialized));
        assert_eq!(flags.teardown(), Err(LifecycleError::NotInitialized));

        flags.initialize().unwrap();
        assert_eq!(flags.initialize(), Err(LifecycleError::AlreadyInitialized));

        flags.teardown().unwrap();
        assert_eq!(flags.enable(), Err(LifecycleError::TornDown));
        assert_eq!(flags.initialize(), Err(LifecycleError::TornDown));
        assert_eq!(flags.state(), SessionState::TornDown);
    }
}
