//! # SPSC ring buffer
//!
//! A fixed-capacity queue shared by exactly one producer and one consumer,
//! usually living on different cores. Every streaming path of the media
//! engine goes through it: the DAC sample feed, the HDMI data-island queue,
//! the per-line pixel feed and the control queues between the cores.
//!
//! ```ignore
//! static mut ISLANDS: RingBuffer<DataIsland, 256> = RingBuffer::new();
//!
//! let (mut tx, mut rx) = unsafe { ISLANDS.split() };
//! // core 0
//! if tx.push(island).is_err() { /* full: drop it */ }
//! // core 1, scanline interrupt
//! if let Some(island) = rx.pop() { /* ... */ }
//! ```
//!
//! ## Capacity
//!
//! `N` must be a power of two so that wraparound is a mask. One slot is
//! always kept empty to tell "full" from "empty" without a shared counter,
//! so the queue holds at most `N - 1` items.
//!
//! ## Memory ordering
//!
//! The producer is the only writer of `head`, the consumer the only writer of
//! `tail`. Each side publishes its index with `Release` after touching the
//! slot and reads the other side's index with `Acquire`. Only plain atomic
//! loads and stores are used, so this works on cores without CAS
//! (thumbv6m).
#![no_std]

use core::cell::UnsafeCell;
use core::fmt::{Debug, Formatter};
use core::mem::MaybeUninit;
use core::sync::atomic::{AtomicUsize, Ordering};

pub struct RingBuffer<T, const N: usize> {
    /// next slot to write
    head: AtomicUsize,
    /// next slot to read
    tail: AtomicUsize,
    slots: [UnsafeCell<MaybeUninit<T>>; N],
}

// Slots are only ever touched by the side that currently owns them, as
// decided by the head/tail handshake.
unsafe impl<T: Send, const N: usize> Sync for RingBuffer<T, N> {}

impl<T, const N: usize> RingBuffer<T, N> {
    const MASK: usize = N - 1;
    const VALID: () = assert!(N >= 2 && N.is_power_of_two(), "ring size must be a power of two");

    pub const fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let _ = Self::VALID;

        Self {
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            slots: [const { UnsafeCell::new(MaybeUninit::uninit()) }; N],
        }
    }

    /// Usable slots, always `N - 1`.
    #[inline(always)]
    pub const fn capacity(&self) -> usize {
        N - 1
    }

    /// Split into the producer and consumer halves.
    ///
    /// The halves borrow the buffer, so a second pair cannot be created while
    /// the first is alive.
    pub fn split(&mut self) -> (Producer<'_, T, N>, Consumer<'_, T, N>) {
        (Producer { rb: self }, Consumer { rb: self })
    }

    #[inline(always)]
    fn used(head: usize, tail: usize) -> usize {
        head.wrapping_sub(tail) & Self::MASK
    }
}

impl<T, const N: usize> Default for RingBuffer<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> Drop for RingBuffer<T, N> {
    fn drop(&mut self) {
        let head = *self.head.get_mut();
        let mut tail = *self.tail.get_mut();
        while tail != head {
            unsafe { self.slots[tail].get_mut().assume_init_drop() };
            tail = (tail + 1) & Self::MASK;
        }
    }
}

impl<T, const N: usize> Debug for RingBuffer<T, N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RingBuffer")
            .field("head", &self.head.load(Ordering::Relaxed))
            .field("tail", &self.tail.load(Ordering::Relaxed))
            .field("capacity", &(N - 1))
            .finish()
    }
}

/// Write half. Owns `head`.
pub struct Producer<'a, T, const N: usize> {
    rb: &'a RingBuffer<T, N>,
}

unsafe impl<T: Send, const N: usize> Send for Producer<'_, T, N> {}

impl<T, const N: usize> Producer<'_, T, N> {
    /// Queue `item`, handing it back if the buffer is full.
    ///
    /// Never blocks and never overwrites; a full buffer is backpressure and
    /// the caller decides what to drop.
    #[inline]
    pub fn push(&mut self, item: T) -> Result<(), T> {
        let head = self.rb.head.load(Ordering::Relaxed);
        let next = (head + 1) & RingBuffer::<T, N>::MASK;
        if next == self.rb.tail.load(Ordering::Acquire) {
            return Err(item);
        }

        unsafe { (*self.rb.slots[head].get()).write(item) };
        self.rb.head.store(next, Ordering::Release);
        Ok(())
    }

    /// Items queued, as seen from the producer. May over-report by whatever
    /// the consumer popped since its last published index.
    #[inline]
    pub fn used_space(&self) -> usize {
        let head = self.rb.head.load(Ordering::Relaxed);
        let tail = self.rb.tail.load(Ordering::Acquire);
        RingBuffer::<T, N>::used(head, tail)
    }

    #[inline]
    pub fn free_space(&self) -> usize {
        self.rb.capacity() - self.used_space()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.free_space() == 0
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.rb.capacity()
    }
}

/// Read half. Owns `tail`.
pub struct Consumer<'a, T, const N: usize> {
    rb: &'a RingBuffer<T, N>,
}

unsafe impl<T: Send, const N: usize> Send for Consumer<'_, T, N> {}

impl<T, const N: usize> Consumer<'_, T, N> {
    #[inline]
    pub fn pop(&mut self) -> Option<T> {
        let tail = self.rb.tail.load(Ordering::Relaxed);
        if tail == self.rb.head.load(Ordering::Acquire) {
            return None;
        }

        let item = unsafe { (*self.rb.slots[tail].get()).assume_init_read() };
        self.rb.tail.store((tail + 1) & RingBuffer::<T, N>::MASK, Ordering::Release);
        Some(item)
    }

    /// Look at the oldest item without dequeuing it.
    ///
    /// The producer cannot reuse the slot until `tail` moves, and `tail` only
    /// moves through `&mut self`.
    #[inline]
    pub fn peek(&self) -> Option<&T> {
        let tail = self.rb.tail.load(Ordering::Relaxed);
        if tail == self.rb.head.load(Ordering::Acquire) {
            return None;
        }

        Some(unsafe { (*self.rb.slots[tail].get()).assume_init_ref() })
    }

    /// Items queued, as seen from the consumer. May under-report by whatever
    /// the producer pushed since its last published index.
    #[inline]
    pub fn used_space(&self) -> usize {
        let tail = self.rb.tail.load(Ordering::Relaxed);
        let head = self.rb.head.load(Ordering::Acquire);
        RingBuffer::<T, N>::used(head, tail)
    }

    #[inline]
    pub fn free_space(&self) -> usize {
        self.rb.capacity() - self.used_space()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.used_space() == 0
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.rb.capacity()
    }
}
