//! slotring - bounded lock-free MPMC ring buffer
//!
//! A fixed-capacity queue shared by any number of producer and consumer
//! threads. Producers and consumers claim unique indices with a single
//! `fetch_add` on their own counter, then wait only on the one slot that
//! index maps to. A per-slot stamp, not a lock, decides who may touch the
//! slot's value.
//!
//! ```
//! use std::sync::Arc;
//! use std::thread;
//!
//! use slotring::RingBuffer;
//!
//! let ring = Arc::new(RingBuffer::new(16).unwrap());
//!
//! let producer = {
//!     let ring = Arc::clone(&ring);
//!     thread::spawn(move || {
//!         for i in 0..100 {
//!             ring.enqueue(i).unwrap();
//!         }
//!         ring.close();
//!     })
//! };
//!
//! let mut sum = 0;
//! while let Ok(value) = ring.dequeue() {
//!     sum += value;
//! }
//! producer.join().unwrap();
//! assert_eq!(sum, (0..100).sum());
//! ```
//!
//! Waiting is a spin that escalates to [`std::thread::yield_now`]; there is
//! no parking and no timeout. [`RingBuffer::close`] is the way to release
//! threads once no more data will arrive.
#![warn(missing_docs)]

mod backoff;
mod error;
mod ring;
mod sync;
mod trace;

pub use error::{EnqueueError, Error, TryDequeueError, TryEnqueueError};
pub use ring::RingBuffer;
pub use trace::init_tracing;
