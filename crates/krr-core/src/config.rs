//! Recorder configuration
//!
//! Log capacity is a compile-time const generic on [`crate::EventLog`]; the
//! payload maxima are constants in [`crate::types`]. The only runtime knob is
//! which execution contexts take part in the cross-core sequencer. The
//! control plane builds a [`RecorderConfig`] (usually deserialized from boot
//! parameters) and hands it to [`crate::Recorder::new`].

use serde::{Deserialize, Serialize};

use crate::types::ContextKind;

/// Set of [`ContextKind`]s, one bit per kind.
///
/// Serialized as its raw bits; unknown bits are dropped on the way in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub struct ContextSet(u8);

impl ContextSet {
    /// No context is sequenced
    pub const NONE: Self = Self(0);

    /// Syscalls, exceptions, and interrupts are all sequenced
    pub const ALL: Self = Self(0b111);

    /// Build a set from its raw bit representation (unknown bits dropped).
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & Self::ALL.0)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn with(self, kind: ContextKind) -> Self {
        Self(self.0 | kind.bit())
    }

    pub const fn without(self, kind: ContextKind) -> Self {
        Self(self.0 & !kind.bit())
    }

    pub const fn contains(self, kind: ContextKind) -> bool {
        self.0 & kind.bit() != 0
    }
}

impl From<u8> for ContextSet {
    fn from(bits: u8) -> Self {
        Self::from_bits(bits)
    }
}

impl From<ContextSet> for u8 {
    fn from(set: ContextSet) -> Self {
        set.bits()
    }
}

impl Default for ContextSet {
    fn default() -> Self {
        Self::ALL
    }
}

/// Runtime configuration of a [`crate::Recorder`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Contexts that must obtain a turn before recording
    pub sequenced_contexts: ContextSet,
}

impl RecorderConfig {
    /// Every sequenced context enabled.
    pub const DEFAULT: Self = Self {
        sequenced_contexts: ContextSet::ALL,
    };
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
