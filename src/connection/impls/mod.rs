//! Implementations of the [`Connection`](super::Connection) trait for
//! built-in types.

#[cfg(feature = "std")]
mod tcpstream;
