//! Common types shared by the engine and the protocol layer.

mod signal;

pub use self::signal::Signal;

/// Thread ID as seen by the GDB client.
pub type Tid = core::num::NonZeroUsize;
