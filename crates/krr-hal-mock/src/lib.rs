//! Mock host platform for testing the record/replay capture core
//!
//! Each test thread plays one CPU core. A thread binds itself to a core with
//! [`MockPlatform::bind_core`]; its simulated interrupt flag and preemption
//! depth live in thread-local state, so several threads can drive one
//! recorder concurrently exactly like cores of one machine.
//!
//! User memory is a set of byte regions registered with
//! [`MockPlatform::map_user`]; reads outside a region fault.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use krr_hal::{CoreId, HalError, IrqFlags, Platform, UserAddr};

thread_local! {
    /// Core simulated by the current thread
    static CORE: Cell<CoreId> = const { Cell::new(0) };
    /// Simulated local interrupt enable flag
    static IRQ_ENABLED: Cell<bool> = const { Cell::new(true) };
    /// Simulated preemption disable depth
    static PREEMPT_DEPTH: Cell<u32> = const { Cell::new(0) };
}

/// Mock platform for unit and integration testing.
pub struct MockPlatform {
    /// Value returned as the address-space root
    address_space_root: AtomicU64,
    /// Simulated user memory (region start -> bytes)
    user_memory: Mutex<BTreeMap<UserAddr, Vec<u8>>>,
    /// Number of `irq_save` calls from any core
    irq_saves: AtomicUsize,
}

impl MockPlatform {
    /// Create a mock platform with empty user memory.
    ///
    /// `const` so tests can hold a recorder in a `static` the way a kernel
    /// does.
    pub const fn new() -> Self {
        Self {
            address_space_root: AtomicU64::new(0x1000),
            user_memory: Mutex::new(BTreeMap::new()),
            irq_saves: AtomicUsize::new(0),
        }
    }

    /// Make the calling thread act as `core`.
    pub fn bind_core(core: CoreId) {
        CORE.with(|c| c.set(core));
    }

    /// Whether the calling thread's simulated interrupts are enabled.
    pub fn irqs_enabled() -> bool {
        IRQ_ENABLED.with(Cell::get)
    }

    /// Preemption disable depth of the calling thread.
    pub fn preempt_depth() -> u32 {
        PREEMPT_DEPTH.with(Cell::get)
    }

    /// Set the value reported as the address-space root.
    pub fn set_address_space_root(&self, root: u64) {
        self.address_space_root.store(root, Ordering::SeqCst);
    }

    /// Register a readable user memory region starting at `addr`.
    pub fn map_user(&self, addr: UserAddr, bytes: &[u8]) {
        self.lock_memory().insert(addr, bytes.to_vec());
    }

    /// Total number of `irq_save` calls observed.
    pub fn irq_save_count(&self) -> usize {
        self.irq_saves.load(Ordering::SeqCst)
    }

    fn lock_memory(&self) -> std::sync::MutexGuard<'_, BTreeMap<UserAddr, Vec<u8>>> {
        self.user_memory
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for MockPlatform {
    fn current_core(&self) -> CoreId {
        CORE.with(Cell::get)
    }

    fn irq_save(&self) -> IrqFlags {
        self.irq_saves.fetch_add(1, Ordering::SeqCst);
        let was_enabled = IRQ_ENABLED.with(|irq| irq.replace(false));
        IrqFlags(u64::from(was_enabled))
    }

    fn irq_restore(&self, flags: IrqFlags) {
        IRQ_ENABLED.with(|irq| irq.set(flags.0 != 0));
    }

    fn preempt_disable(&self) {
        PREEMPT_DEPTH.with(|depth| depth.set(depth.get() + 1));
    }

    fn preempt_enable(&self) {
        PREEMPT_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }

    fn address_space_root(&self) -> u64 {
        self.address_space_root.load(Ordering::SeqCst)
    }

    fn copy_from_user(&self, dst: &mut [u8], src: UserAddr) -> Result<(), HalError> {
        let memory = self.lock_memory();
        let Some((&start, region)) = memory.range(..=src).next_back() else {
            return Err(HalError::UserFault { copied: 0 });
        };

        let offset = usize::try_from(src - start).unwrap_or(usize::MAX);
        let available = region.get(offset..).unwrap_or(&[]);
        let copied = available.len().min(dst.len());
        dst[..copied].copy_from_slice(&available[..copied]);

        if copied < dst.len() {
            Err(HalError::UserFault { copied })
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_irq_save_restore_nests() {
        let platform = MockPlatform::new();
        assert!(MockPlatform::irqs_enabled());

        let outer = platform.irq_save();
        let inner = platform.irq_save();
        assert!(!MockPlatform::irqs_enabled());

        platform.irq_restore(inner);
        assert!(!MockPlatform::irqs_enabled());
        platform.irq_restore(outer);
        assert!(MockPlatform::irqs_enabled());
        assert_eq!(platform.irq_save_count(), 2);
    }

    #[test]
    fn test_core_binding_is_per_thread() {
        let platform = MockPlatform::new();
        MockPlatform::bind_core(5);

        let other = std::thread::scope(|s| {
            s.spawn(|| {
                MockPlatform::bind_core(9);
                platform.current_core()
            })
            .join()
            .unwrap()
        });

        assert_eq!(other, 9);
        assert_eq!(platform.current_core(), 5);
    }

    #[test]
    fn test_copy_from_user() {
        let platform = MockPlatform::new();
        platform.map_user(0x4000, b"hello world");

        let mut buf = [0u8; 5];
        platform.copy_from_user(&mut buf, 0x4006).unwrap();
        assert_eq!(&buf, b"world");

        let mut long = [0u8; 8];
        assert_eq!(
            platform.copy_from_user(&mut long, 0x4006),
            Err(HalError::UserFault { copied: 5 })
        );
        assert_eq!(&long[..5], b"world");

        assert_eq!(
            platform.copy_from_user(&mut buf, 0x10),
            Err(HalError::UserFault { copied: 0 })
        );
    }

    #[test]
    fn test_preempt_depth() {
        let platform = MockPlatform::new();
        platform.preempt_disable();
        platform.preempt_disable();
        assert_eq!(MockPlatform::preempt_depth(), 2);
        platform.preempt_enable();
        platform.preempt_enable();
        assert_eq!(MockPlatform::preempt_depth(), 0);
    }
}
