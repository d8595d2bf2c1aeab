//! Atomic shim shared by the arena and the ticket sequencer
//!
//! With the `loom` feature every atomic and cell used by this crate comes
//! from loom, so the loom tests exercise the real arena and sequencer code
//! rather than a copy of it. Without it the types are the plain `core` ones.
//!
//! Loom atomics cannot be built in a `const` context, so constructors are
//! declared through [`loom_const_fn!`], which emits a `const fn` normally and
//! a plain `fn` under loom.

#[cfg(feature = "loom")]
pub(crate) use loom::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

#[cfg(not(feature = "loom"))]
pub(crate) use core::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

#[cfg(feature = "loom")]
pub(crate) use loom::cell::UnsafeCell;

/// `core::cell::UnsafeCell` with loom's closure-based access API.
///
/// Going through `with` / `with_mut` lets loom track every access to the
/// cell and report unsynchronized reads of slot contents.
#[cfg(not(feature = "loom"))]
pub(crate) struct UnsafeCell<T>(core::cell::UnsafeCell<T>);

#[cfg(not(feature = "loom"))]
impl<T> UnsafeCell<T> {
    pub(crate) const fn new(value: T) -> Self {
        Self(core::cell::UnsafeCell::new(value))
    }

    #[inline(always)]
    pub(crate) fn with<R>(&self, f: impl FnOnce(*const T) -> R) -> R {
        f(self.0.get())
    }

    #[inline(always)]
    pub(crate) fn with_mut<R>(&self, f: impl FnOnce(*mut T) -> R) -> R {
        f(self.0.get())
    }
}

/// Back off inside a spin-wait loop.
///
/// Under loom this yields so the model checker can schedule the thread that
/// will end the wait.
#[inline]
pub(crate) fn spin_hint() {
    #[cfg(feature = "loom")]
    loom::thread::yield_now();

    #[cfg(not(feature = "loom"))]
    core::hint::spin_loop();
}

/// Declare a constructor that is `const` except under loom.
macro_rules! loom_const_fn {
    (
        $(#[$meta:meta])*
        $vis:vis fn $name:ident($($arg:ident: $ty:ty),* $(,)?) -> $ret:ty $body:block
    ) => {
        $(#[$meta])*
        #[cfg(not(feature = "loom"))]
        $vis const fn $name($($arg: $ty),*) -> $ret $body

        $(#[$meta])*
        #[cfg(feature = "loom")]
        $vis fn $name($($arg: $ty),*) -> $ret $body
    };
}

pub(crate) use loom_const_fn;
