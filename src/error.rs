use thiserror::Error;

/// Errors reported by [`RingBuffer`](crate::RingBuffer) construction and
/// blocking dequeue.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The buffer was asked for zero slots.
    #[error("capacity must be greater than zero")]
    InvalidCapacity,
    /// The buffer is closed and every value published before the close has
    /// been handed out.
    #[error("ring buffer is closed")]
    Closed,
}

/// A blocking enqueue on a closed buffer. Carries the rejected value back.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("ring buffer is closed")]
pub struct EnqueueError<T>(pub T);

impl<T> EnqueueError<T> {
    /// Returns the rejected value.
    pub fn into_inner(self) -> T {
        self.0
    }
}

/// Why a [`try_enqueue`](crate::RingBuffer::try_enqueue) did not go through.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TryEnqueueError<T> {
    /// The target slot still holds an unread value.
    #[error("ring buffer is full")]
    Full(T),
    /// The ring is closed.
    #[error("ring buffer is closed")]
    Closed(T),
}

impl<T> TryEnqueueError<T> {
    /// Returns the value that could not be enqueued.
    pub fn into_inner(self) -> T {
        match self {
            TryEnqueueError::Full(value) | TryEnqueueError::Closed(value) => value,
        }
    }

    /// Whether the slot was still occupied.
    pub fn is_full(&self) -> bool {
        matches!(self, TryEnqueueError::Full(_))
    }

    /// Whether the ring was closed.
    pub fn is_closed(&self) -> bool {
        matches!(self, TryEnqueueError::Closed(_))
    }
}

/// Why a [`try_dequeue`](crate::RingBuffer::try_dequeue) came back empty-handed.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TryDequeueError {
    /// Nothing is published at the head yet.
    #[error("ring buffer is empty")]
    Empty,
    /// The ring is closed and drained.
    #[error("ring buffer is closed")]
    Closed,
}
