//! # Cross-core coordination
//!
//! The render core and the I/O core share four things: the audio rings, the
//! double-buffered frame handoff ([`SwapChain`]), the vsync flag
//! ([`VsyncFlag`]) and the exclusive-access request ([`ExclusiveRequest`]).
//! Every field here has exactly one writing core. Only atomic loads and
//! stores are used; counters are bumped with load-then-store, which is fine
//! with a single writer and works without CAS.
//!
//! ## Exclusive access
//!
//! Erasing or programming flash stalls the bus for the whole operation and
//! runs with interrupts off on the I/O core. The render core must not be in
//! the middle of setting up a transfer when that happens:
//!
//! ```ignore
//! // I/O core
//! let guard = io.request_exclusive(SpinPolicy::bounded(1 << 24))?;
//! flash.erase_sector(addr);
//! drop(guard); // video resumes at the next frame boundary
//! ```
//!
//! The request is only ever granted at a frame boundary, never mid-line.

use core::cell::UnsafeCell;
use core::fmt::{Display, Formatter};
use core::hint::spin_loop;
use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

/// Vertical blanking state, written by the render core only.
#[derive(Debug, Default)]
pub struct VsyncFlag {
    blanking: AtomicBool,
    frames: AtomicU32,
}

impl VsyncFlag {
    pub const fn new() -> Self {
        Self { blanking: AtomicBool::new(false), frames: AtomicU32::new(0) }
    }

    /// Render core: entering vertical blanking. Counts the frame.
    pub(crate) fn enter(&self) {
        let frames = self.frames.load(Ordering::Relaxed).wrapping_add(1);
        self.frames.store(frames, Ordering::Release);
        self.blanking.store(true, Ordering::Release);
    }

    /// Render core: leaving vertical blanking.
    pub(crate) fn exit(&self) {
        self.blanking.store(false, Ordering::Release);
    }

    #[inline(always)]
    pub fn is_blanking(&self) -> bool {
        self.blanking.load(Ordering::Acquire)
    }

    /// Frames completed so far.
    #[inline(always)]
    pub fn frame(&self) -> u32 {
        self.frames.load(Ordering::Acquire)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ExclusiveState {
    Idle,
    /// Set by the I/O core, not yet seen by the render core.
    Requested,
    /// The render core has stopped transmitting and is parked.
    Granted,
    /// Released by the I/O core, the render core has not resumed yet.
    Releasing,
}

/// What the render core did when it looked at the request.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Observation {
    Unchanged,
    Granted,
    Withdrawn,
}

/// `requested` belongs to the I/O core, `granted` to the render core.
#[derive(Debug, Default)]
pub struct ExclusiveRequest {
    requested: AtomicBool,
    granted: AtomicBool,
}

impl ExclusiveRequest {
    pub const fn new() -> Self {
        Self { requested: AtomicBool::new(false), granted: AtomicBool::new(false) }
    }

    /// I/O core.
    pub(crate) fn request(&self) {
        self.requested.store(true, Ordering::Release);
    }

    /// I/O core.
    pub(crate) fn release(&self) {
        self.requested.store(false, Ordering::Release);
    }

    /// Render core, at a frame boundary or while parked.
    pub(crate) fn observe(&self) -> Observation {
        let requested = self.requested.load(Ordering::Acquire);
        let granted = self.granted.load(Ordering::Relaxed);
        match (requested, granted) {
            (true, false) => {
                self.granted.store(true, Ordering::Release);
                Observation::Granted
            }
            (false, true) => {
                self.granted.store(false, Ordering::Release);
                Observation::Withdrawn
            }
            _ => Observation::Unchanged,
        }
    }

    pub fn state(&self) -> ExclusiveState {
        match (self.requested.load(Ordering::Acquire), self.granted.load(Ordering::Acquire)) {
            (false, false) => ExclusiveState::Idle,
            (true, false) => ExclusiveState::Requested,
            (true, true) => ExclusiveState::Granted,
            (false, true) => ExclusiveState::Releasing,
        }
    }

    #[inline(always)]
    pub fn is_granted(&self) -> bool {
        self.granted.load(Ordering::Acquire)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SpinTimeout {
    pub spins: u32,
}

impl Display for SpinTimeout {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "gave up after {} spins", self.spins)
    }
}

/// How long a busy-wait may last. There is no scheduler to yield to, so
/// waits are plain spins; a bounded policy returns control to the caller
/// (to feed a watchdog, for example) instead of hanging forever.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SpinPolicy {
    limit: Option<u32>,
}

impl SpinPolicy {
    pub const FOREVER: SpinPolicy = SpinPolicy { limit: None };

    pub const fn bounded(spins: u32) -> Self {
        Self { limit: Some(spins) }
    }

    /// Spin until `done` returns true. Returns the number of spins taken.
    pub fn spin_until(&self, mut done: impl FnMut() -> bool) -> Result<u32, SpinTimeout> {
        let mut spins = 0u32;
        loop {
            if done() {
                return Ok(spins);
            }
            if self.limit.is_some_and(|limit| spins >= limit) {
                return Err(SpinTimeout { spins });
            }
            spins = spins.wrapping_add(1);
            spin_loop();
        }
    }
}

/// Two buffers, one shown and one drawn into.
///
/// The I/O core owns the back buffer whenever no flip is pending; it draws,
/// then requests a flip. The render core applies flips at frame boundaries
/// only, so it never reads a buffer that is being written.
///
/// `front` is written by the render core, `requested` by the I/O core,
/// `applied` by the render core.
pub struct SwapChain<T> {
    slots: [UnsafeCell<T>; 2],
    front: AtomicU8,
    requested: AtomicU32,
    applied: AtomicU32,
}

unsafe impl<T: Send + Sync> Sync for SwapChain<T> {}

impl<T> SwapChain<T> {
    pub fn new(front: T, back: T) -> Self {
        Self {
            slots: [UnsafeCell::new(front), UnsafeCell::new(back)],
            front: AtomicU8::new(0),
            requested: AtomicU32::new(0),
            applied: AtomicU32::new(0),
        }
    }

    #[inline(always)]
    pub fn flip_pending(&self) -> bool {
        self.requested.load(Ordering::Acquire) != self.applied.load(Ordering::Acquire)
    }

    /// I/O core: draw into the back buffer and queue a flip. `draw` also gets
    /// the front buffer, read-only, for incremental updates. Returns `false`
    /// without calling `draw` while the previous flip is still pending.
    ///
    /// # Safety
    ///
    /// Only one core may act as the writer of a given chain.
    pub(crate) unsafe fn publish(&self, draw: impl FnOnce(&mut T, &T)) -> bool {
        if self.flip_pending() {
            return false;
        }

        let front = self.front.load(Ordering::Acquire) as usize;
        let back = unsafe { &mut *self.slots[front ^ 1].get() };
        let shown = unsafe { &*self.slots[front].get() };
        draw(back, shown);

        let next = self.requested.load(Ordering::Relaxed).wrapping_add(1);
        self.requested.store(next, Ordering::Release);
        true
    }

    /// Render core, frame boundary only.
    pub(crate) fn apply_flip(&self) -> bool {
        let requested = self.requested.load(Ordering::Acquire);
        if requested == self.applied.load(Ordering::Relaxed) {
            return false;
        }

        let front = self.front.load(Ordering::Relaxed);
        self.front.store(front ^ 1, Ordering::Release);
        self.applied.store(requested, Ordering::Release);
        true
    }

    /// Render core: the buffer being shown.
    #[inline(always)]
    pub(crate) fn front(&self) -> &T {
        let front = self.front.load(Ordering::Relaxed) as usize;
        unsafe { &*self.slots[front].get() }
    }
}
