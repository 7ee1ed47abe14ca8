#![forbid(unsafe_code)]

//! Dirty flags.
//!
//! A [`DirtySet`] is the per-representation record of which categories of
//! visual change are pending. Property listeners [`mark`](DirtySet::mark)
//! flags from any thread; the UI thread consumes them with
//! [`check_and_clear`](DirtySet::check_and_clear) during a pass.
//!
//! # Design
//!
//! The flags, a `SCHEDULED` bit and a `DISPOSED` bit share one `AtomicU32`.
//! Every operation is a single read-modify-write on that word, so marking,
//! claiming a scheduled pass, consuming a flag and disposing are totally
//! ordered with respect to each other.
//!
//! # Invariants
//!
//! 1. **Coalescing**: N marks of `f` before a pass yield exactly one `true`
//!    from `check_and_clear(f)`.
//! 2. **No lost marks**: a pass clears `SCHEDULED` before it reads any flag.
//!    A mark that lands after that clear either is consumed by the running
//!    pass or finds `SCHEDULED` clear and claims a new pass.
//! 3. **Disposal is terminal**: once `DISPOSED` is set, `claim_schedule`,
//!    `begin_pass` and `check_and_clear` all return `false`.

use std::sync::atomic::{AtomicU32, Ordering};

use bitflags::bitflags;

bitflags! {
    /// Categories of pending visual change.
    ///
    /// Passes service flags in bit order: geometry, style, content, value,
    /// then the four adapter-defined flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DirtyFlags: u32 {
        /// Position, size, visibility.
        const GEOMETRY = 1 << 0;
        /// Colors, fonts, borders.
        const STYLE    = 1 << 1;
        /// Structural content, e.g. items of a list.
        const CONTENT  = 1 << 2;
        /// The displayed value.
        const VALUE    = 1 << 3;
        const CUSTOM_0 = 1 << 4;
        const CUSTOM_1 = 1 << 5;
        const CUSTOM_2 = 1 << 6;
        const CUSTOM_3 = 1 << 7;
    }
}

impl DirtyFlags {
    /// Every flag in reconciliation order.
    pub const ORDER: [DirtyFlags; 8] = [
        Self::GEOMETRY,
        Self::STYLE,
        Self::CONTENT,
        Self::VALUE,
        Self::CUSTOM_0,
        Self::CUSTOM_1,
        Self::CUSTOM_2,
        Self::CUSTOM_3,
    ];
}

const SCHEDULED: u32 = 1 << 30;
const DISPOSED: u32 = 1 << 31;
const FLAG_MASK: u32 = DirtyFlags::all().bits();

/// Atomic dirty-flag word for one representation.
#[derive(Debug, Default)]
pub struct DirtySet {
    bits: AtomicU32,
}

impl DirtySet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `flags`. Always succeeds; marking after disposal is harmless.
    #[inline]
    pub fn mark(&self, flags: DirtyFlags) {
        self.bits.fetch_or(flags.bits(), Ordering::AcqRel);
    }

    /// Try to become the one pending pass.
    ///
    /// Returns `true` if the caller must enqueue a pass: no pass was pending
    /// and the set is not disposed.
    pub fn claim_schedule(&self) -> bool {
        let mut current = self.bits.load(Ordering::Acquire);
        loop {
            if current & (SCHEDULED | DISPOSED) != 0 {
                return false;
            }
            match self.bits.compare_exchange_weak(
                current,
                current | SCHEDULED,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// Start a pass: release the pending-pass claim.
    ///
    /// Returns `false` if the set is disposed; the pass must not touch the
    /// node in that case.
    pub fn begin_pass(&self) -> bool {
        let previous = self.bits.fetch_and(!SCHEDULED, Ordering::AcqRel);
        previous & DISPOSED == 0
    }

    /// Atomically read and reset `flag`.
    ///
    /// Returns `false` after disposal even if the flag was set.
    #[inline]
    pub fn check_and_clear(&self, flag: DirtyFlags) -> bool {
        let previous = self.bits.fetch_and(!flag.bits(), Ordering::AcqRel);
        previous & flag.bits() != 0 && previous & DISPOSED == 0
    }

    /// Mark disposed. Returns `true` only for the first call.
    pub fn dispose(&self) -> bool {
        let previous = self.bits.fetch_or(DISPOSED, Ordering::AcqRel);
        previous & DISPOSED == 0
    }

    pub fn is_disposed(&self) -> bool {
        self.bits.load(Ordering::Acquire) & DISPOSED != 0
    }

    pub fn is_scheduled(&self) -> bool {
        self.bits.load(Ordering::Acquire) & SCHEDULED != 0
    }

    /// Flags currently marked.
    pub fn pending(&self) -> DirtyFlags {
        DirtyFlags::from_bits_truncate(self.bits.load(Ordering::Acquire) & FLAG_MASK)
    }
}
