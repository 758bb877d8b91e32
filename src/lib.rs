//! An in-process GDB remote debugger for Motorola 68000-family hosts.
//!
//! `gdbserver68k` runs a target program inside the debugger's own process,
//! hooks the CPU exception vectors the target could trip over, and serves
//! control of the target to a remote `gdb` using the
//! [GDB Remote Serial Protocol](https://sourceware.org/gdb/onlinedocs/gdb/Remote-Protocol.html).
//!
//! The crate is split into two halves:
//!
//! - [`engine`]: the [`DebugEngine`](engine::DebugEngine), which owns the
//!   target's register context, the software breakpoint table and the
//!   installed exception vectors, and which switches the CPU into (and back
//!   out of) the target.
//! - [`GdbStub`]: the protocol layer, which frames packets, dispatches
//!   commands, and calls into any type implementing [`Target`](target::Target).
//!
//! Everything that touches real hardware or the host operating system sits
//! behind the traits in [`hal`]. A backend for Human68k on real 68k hardware
//! is provided under `target_arch = "m68k"`; tests drive the engine with a
//! simulated machine.
//!
//! ## Features
//!
//! - `alloc`: allow the packet buffer to be heap allocated.
//! - `std`: `impl Connection for TcpStream` and `std::error::Error` impls.
//! - `trace-pkt`: log every inbound and outbound packet via `trace!`.

#![cfg_attr(not(feature = "std"), no_std)]
#![cfg_attr(target_arch = "m68k", feature(asm_experimental_arch))]
#![warn(missing_docs)]

extern crate alloc;

#[macro_use]
extern crate log;

mod connection;
mod gdbstub_impl;
mod protocol;
mod util;

pub mod arch;
pub mod common;
pub mod engine;
pub mod hal;
pub mod target;

pub use connection::Connection;
pub use gdbstub_impl::*;
pub use protocol::{ConsoleOutput, PacketParseError, ResponseWriterError};

/// Thread id reported for targets without sibling threads.
pub const SINGLE_THREAD_TID: common::Tid = unsafe { common::Tid::new_unchecked(1) };
