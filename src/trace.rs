//! Tracing hooks.
//!
//! The ring logs three events and nothing on the enqueue/dequeue path:
//!
//! - construction, at `debug`, with `capacity` and `masked` (power-of-two
//!   lookup);
//! - the first [`close`](crate::RingBuffer::close), at `info`, with the
//!   `close_index`;
//! - drop, at `debug`, with the count of `dropped` unconsumed values, only
//!   when there were any.
//!
//! Enable with `--features tracing`. Without the feature the macros expand
//! to nothing.

/// Install a `tracing-subscriber` fmt layer filtered by `RUST_LOG`.
///
/// Defaults to `slotring=trace` when `RUST_LOG` is unset. Calling it twice
/// is harmless; the second installation is ignored. Does nothing without
/// the `tracing` feature.
#[cfg(feature = "tracing")]
pub fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("slotring=trace"));

    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_timer(fmt::time::uptime()),
        )
        .with(filter)
        .try_init();
}

/// No-op without the `tracing` feature.
#[cfg(not(feature = "tracing"))]
pub const fn init_tracing() {}

#[cfg(feature = "tracing")]
pub(crate) use tracing::{debug, info};

#[cfg(not(feature = "tracing"))]
macro_rules! debug_noop {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
macro_rules! info_noop {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
pub(crate) use debug_noop as debug;
#[cfg(not(feature = "tracing"))]
pub(crate) use info_noop as info;
