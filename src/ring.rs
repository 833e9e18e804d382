//! Ticket-based bounded MPMC ring.
//!
//! Producers and consumers claim absolute indices with `fetch_add` on `tail`
//! and `head`; the claim never fails and never retries. Ownership of the slot
//! at `index % capacity` is then handed around by its stamp:
//!
//! ```text
//!   4·i            free, producer of index i may write
//!   4·i + 1        producer of index i is writing
//!   4·i + 2        written, consumer of index i may read
//!   4·(i + cap)    read (or skipped), free for the producer of the next lap
//! ```
//!
//! The low two bits carry the phase, so "written" and "free for the next
//! lap" stay distinct even when `cap == 1`.
//!
//! Every stamp store is `Release` and every stamp load that gates a slot
//! access is `Acquire`, so a producer's write happens-before the matching
//! consumer's read, which happens-before the next lap's write.
//!
//! Closing sets the top bit of `tail`. The tail value seen by that
//! `fetch_or` is the close index: claims at or above it are void. A producer
//! below it that is still waiting for space gives up once the ring is
//! closed, and the consumer of that index then moves the slot straight from
//! `4·i` to `4·(i + cap)` and takes the next claim. The writing phase makes
//! this a single CAS race between the two: exactly one of them wins.

use std::fmt;
use std::mem::MaybeUninit;

use crossbeam_utils::CachePadded;

use crate::backoff::Backoff;
use crate::error::{EnqueueError, Error, TryDequeueError, TryEnqueueError};
use crate::sync::{AtomicU64, Ordering, UnsafeCell};
use crate::trace::{debug, info};

/// Mark bit on `tail` once the ring is closed.
const CLOSED: u64 = 1 << 63;

/// `closed_at` value while the ring is open.
const OPEN: u64 = u64::MAX;

const PHASE_MASK: u64 = 0b11;
const PHASE_WRITTEN: u64 = 0b10;

#[inline(always)]
const fn free_stamp(index: u64) -> u64 {
    index << 2
}

#[inline(always)]
const fn writing_stamp(index: u64) -> u64 {
    (index << 2) | 1
}

#[inline(always)]
const fn full_stamp(index: u64) -> u64 {
    (index << 2) | PHASE_WRITTEN
}

#[repr(C, align(64))]
struct Slot<T> {
    stamp: AtomicU64,
    value: UnsafeCell<MaybeUninit<T>>,
}

impl<T> Slot<T> {
    fn new(stamp: u64) -> Self {
        Slot {
            stamp: AtomicU64::new(stamp),
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    /// # Safety
    ///
    /// The caller moved this slot into its writing phase.
    #[inline(always)]
    unsafe fn write(&self, value: T) {
        self.value.with_mut(|cell| {
            (*cell).write(value);
        })
    }

    /// # Safety
    ///
    /// The caller holds the claim for this slot's current written phase.
    #[inline(always)]
    unsafe fn take(&self) -> T {
        self.value.with_mut(|cell| (*cell).assume_init_read())
    }

    /// # Safety
    ///
    /// The slot is in a written phase and nobody else can reach it.
    unsafe fn drop_value(&self) {
        self.value.with_mut(|cell| (*cell).assume_init_drop())
    }
}

/// What the consumer of one index found in its slot.
enum Settled<T> {
    Value(T),
    /// The producer gave up after close; nothing will ever arrive here.
    Skipped,
    Closed,
}

/// Bounded lock-free multi-producer multi-consumer ring buffer.
///
/// Share it between threads behind an [`Arc`](std::sync::Arc). Blocking
/// [`enqueue`](Self::enqueue) and [`dequeue`](Self::dequeue) spin (then
/// yield) on their slot until it reaches the right phase;
/// [`try_enqueue`](Self::try_enqueue) and [`try_dequeue`](Self::try_dequeue)
/// never wait.
pub struct RingBuffer<T> {
    slots: Box<[Slot<T>]>,
    capacity: u64,
    mask: Option<u64>,
    tail: CachePadded<AtomicU64>,
    head: CachePadded<AtomicU64>,
    closed_at: CachePadded<AtomicU64>,
}

// SAFETY: values only move between threads through the stamp protocol, so
// sharing the ring needs nothing beyond `T: Send`.
unsafe impl<T: Send> Send for RingBuffer<T> {}
unsafe impl<T: Send> Sync for RingBuffer<T> {}

impl<T> RingBuffer<T> {
    /// Creates a ring with `capacity` slots.
    ///
    /// Any positive capacity works. Powers of two map indices to slots with
    /// a mask instead of a division.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidCapacity`] if `capacity` is zero.
    ///
    /// # Examples
    ///
    /// ```
    /// use slotring::{Error, RingBuffer};
    ///
    /// let ring = RingBuffer::<u32>::new(3).unwrap();
    /// assert_eq!(ring.capacity(), 3);
    ///
    /// assert_eq!(RingBuffer::<u32>::new(0).unwrap_err(), Error::InvalidCapacity);
    /// ```
    pub fn new(capacity: usize) -> Result<Self, Error> {
        if capacity == 0 {
            return Err(Error::InvalidCapacity);
        }

        let cap = capacity as u64;
        let slots = (0..cap).map(|pos| Slot::new(free_stamp(pos))).collect();
        let mask = capacity.is_power_of_two().then(|| cap - 1);

        debug!(capacity, masked = mask.is_some(), "ring buffer created");

        Ok(RingBuffer {
            slots,
            capacity: cap,
            mask,
            tail: CachePadded::new(AtomicU64::new(0)),
            head: CachePadded::new(AtomicU64::new(0)),
            closed_at: CachePadded::new(AtomicU64::new(OPEN)),
        })
    }

    #[inline(always)]
    fn slot(&self, index: u64) -> &Slot<T> {
        let pos = match self.mask {
            Some(mask) => index & mask,
            None => index % self.capacity,
        };
        &self.slots[pos as usize]
    }

    #[inline(always)]
    fn closed_index(&self) -> u64 {
        self.closed_at.load(Ordering::Acquire)
    }

    /// Writes `value` into the slot of `claim`, which was seen free.
    ///
    /// Hands the value back if the consumer of `claim` skipped the slot
    /// first.
    #[inline(always)]
    fn publish(&self, slot: &Slot<T>, claim: u64, value: T) -> Result<(), T> {
        if slot
            .stamp
            .compare_exchange(
                free_stamp(claim),
                writing_stamp(claim),
                Ordering::Acquire,
                Ordering::Relaxed,
            )
            .is_err()
        {
            return Err(value);
        }

        // SAFETY: the writing phase is ours alone until we publish.
        unsafe { slot.write(value) };
        slot.stamp.store(full_stamp(claim), Ordering::Release);
        Ok(())
    }

    /// Waits until the slot of `claim` (already taken from `head`) resolves.
    fn settle(&self, claim: u64) -> Settled<T> {
        let slot = self.slot(claim);
        let mut backoff = Backoff::new();

        loop {
            let closed_at = self.closed_index();
            if claim >= closed_at {
                return Settled::Closed;
            }

            let stamp = slot.stamp.load(Ordering::Acquire);
            if stamp == full_stamp(claim) {
                // SAFETY: the stamp equals our written phase and the claim is unique.
                let value = unsafe { slot.take() };
                slot.stamp
                    .store(free_stamp(claim + self.capacity), Ordering::Release);
                return Settled::Value(value);
            }

            if stamp == free_stamp(claim)
                && closed_at != OPEN
                && slot
                    .stamp
                    .compare_exchange(
                        free_stamp(claim),
                        free_stamp(claim + self.capacity),
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    )
                    .is_ok()
            {
                return Settled::Skipped;
            }

            backoff.snooze();
        }
    }

    /// Appends `value`, waiting for its slot to drain if the ring is full.
    ///
    /// `Ok` means the value is in the ring and will be handed to a consumer.
    ///
    /// # Errors
    ///
    /// [`EnqueueError`] holding `value` when the ring is closed, either
    /// before this call or while it was waiting for space.
    ///
    /// # Examples
    ///
    /// ```
    /// use slotring::RingBuffer;
    ///
    /// let ring = RingBuffer::new(2).unwrap();
    /// ring.enqueue("a").unwrap();
    /// ring.enqueue("b").unwrap();
    /// assert_eq!(ring.dequeue(), Ok("a"));
    /// ```
    pub fn enqueue(&self, value: T) -> Result<(), EnqueueError<T>> {
        let claim = self.tail.fetch_add(1, Ordering::Relaxed);
        if claim & CLOSED != 0 {
            return Err(EnqueueError(value));
        }

        let slot = self.slot(claim);
        let mut backoff = Backoff::new();
        loop {
            let stamp = slot.stamp.load(Ordering::Acquire);
            if stamp == free_stamp(claim) {
                return self.publish(slot, claim, value).map_err(EnqueueError);
            }
            // past our phase means the consumer already skipped this index
            if stamp > free_stamp(claim) || self.closed_index() != OPEN {
                return Err(EnqueueError(value));
            }
            backoff.snooze();
        }
    }

    /// Removes the next value, waiting for a producer to publish it.
    ///
    /// # Errors
    ///
    /// [`Error::Closed`] once the ring is closed and no value remains for
    /// this caller. Callers already waiting when the ring closes are woken
    /// with the same error.
    ///
    /// # Examples
    ///
    /// ```
    /// use slotring::{Error, RingBuffer};
    ///
    /// let ring = RingBuffer::new(4).unwrap();
    /// ring.enqueue(1).unwrap();
    /// ring.close();
    ///
    /// assert_eq!(ring.dequeue(), Ok(1));
    /// assert_eq!(ring.dequeue(), Err(Error::Closed));
    /// ```
    pub fn dequeue(&self) -> Result<T, Error> {
        loop {
            let claim = self.head.fetch_add(1, Ordering::Relaxed);
            match self.settle(claim) {
                Settled::Value(value) => return Ok(value),
                Settled::Skipped => continue,
                Settled::Closed => return Err(Error::Closed),
            }
        }
    }

    /// Appends `value` only if its slot is free right now.
    ///
    /// # Errors
    ///
    /// [`TryEnqueueError::Full`] when the slot still holds an unread value,
    /// [`TryEnqueueError::Closed`] when the ring is closed.
    pub fn try_enqueue(&self, value: T) -> Result<(), TryEnqueueError<T>> {
        let mut backoff = Backoff::new();
        let mut tail = self.tail.load(Ordering::Relaxed);

        loop {
            if tail & CLOSED != 0 {
                return Err(TryEnqueueError::Closed(value));
            }

            let slot = self.slot(tail);
            let stamp = slot.stamp.load(Ordering::Acquire);

            if stamp == free_stamp(tail) {
                match self.tail.compare_exchange_weak(
                    tail,
                    tail + 1,
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    // only a close can beat us to the slot once it is claimed
                    Ok(_) => {
                        return self
                            .publish(slot, tail, value)
                            .map_err(TryEnqueueError::Closed)
                    }
                    Err(current) => {
                        tail = current;
                        backoff.spin();
                    }
                }
            } else if stamp < free_stamp(tail) {
                // previous lap not consumed yet
                return Err(TryEnqueueError::Full(value));
            } else {
                backoff.spin();
                tail = self.tail.load(Ordering::Relaxed);
            }
        }
    }

    /// Removes the next value only if it is already published.
    ///
    /// # Errors
    ///
    /// [`TryDequeueError::Empty`] when nothing is ready,
    /// [`TryDequeueError::Closed`] when the ring is closed and drained.
    pub fn try_dequeue(&self) -> Result<T, TryDequeueError> {
        let mut backoff = Backoff::new();
        let mut head = self.head.load(Ordering::Relaxed);

        loop {
            let slot = self.slot(head);
            let stamp = slot.stamp.load(Ordering::Acquire);
            let closed_at = self.closed_index();

            let ready = stamp == full_stamp(head)
                || (stamp == free_stamp(head) && closed_at != OPEN && head < closed_at);

            if ready {
                match self.head.compare_exchange_weak(
                    head,
                    head + 1,
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => match self.settle(head) {
                        Settled::Value(value) => return Ok(value),
                        Settled::Skipped => head = self.head.load(Ordering::Relaxed),
                        Settled::Closed => return Err(TryDequeueError::Closed),
                    },
                    Err(current) => {
                        head = current;
                        backoff.spin();
                    }
                }
            } else if head >= closed_at {
                return Err(TryDequeueError::Closed);
            } else if stamp < full_stamp(head) {
                return Err(TryDequeueError::Empty);
            } else {
                backoff.spin();
                head = self.head.load(Ordering::Relaxed);
            }
        }
    }

    /// Closes the ring.
    ///
    /// Later enqueues fail fast and hand their value back, and so do
    /// blocked enqueues that are still waiting for space. Values published
    /// before the close are still delivered; after that every dequeue,
    /// including those already waiting, returns [`Error::Closed`].
    ///
    /// Returns `true` if this call closed the ring, `false` if it was
    /// already closed.
    pub fn close(&self) -> bool {
        let tail = self.tail.fetch_or(CLOSED, Ordering::AcqRel);
        if tail & CLOSED != 0 {
            return false;
        }

        self.closed_at.store(tail, Ordering::Release);
        info!(close_index = tail, "ring buffer closed");
        true
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.tail.load(Ordering::Acquire) & CLOSED != 0
    }

    /// Number of slots, fixed at construction.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of claimed-but-unconsumed values.
    ///
    /// A snapshot only: under concurrent use it may count values whose
    /// producer is still writing, or one that gave up after a close.
    /// Always within `0..=capacity`.
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Relaxed);
        let tail = (self.tail.load(Ordering::Relaxed) & !CLOSED)
            .min(self.closed_at.load(Ordering::Relaxed));
        tail.saturating_sub(head).min(self.capacity) as usize
    }

    /// Whether [`len`](Self::len) is zero.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> fmt::Debug for RingBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<T> Drop for RingBuffer<T> {
    fn drop(&mut self) {
        let mut dropped = 0usize;
        for slot in self.slots.iter() {
            if slot.stamp.load(Ordering::Relaxed) & PHASE_MASK == PHASE_WRITTEN {
                // SAFETY: written phase means a published value nobody took, and
                // `&mut self` rules out any other accessor.
                unsafe { slot.drop_value() };
                dropped += 1;
            }
        }
        if dropped > 0 {
            debug!(dropped, "dropped unconsumed values");
        }
    }
}
