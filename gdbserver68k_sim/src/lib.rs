//! A software 68000/68010 machine implementing [`gdbserver68k::hal::Host`].
//!
//! The simulator interprets a small subset of the 68k instruction set,
//! enough to run hand-assembled test programs and the trampolines the debug
//! engine installs. Exceptions are taken exactly as the hardware would take
//! them: a frame is pushed on the supervisor stack and the vector is
//! fetched from the table at address 0. The process table Human68k keeps
//! for threads can be laid out in RAM, so the real
//! [`Human68kThreads`](gdbserver68k::hal::human68k::Human68kThreads) walker
//! serves as the simulator's thread registry.

#[macro_use]
extern crate log;

mod cpu;
mod machine;
mod ram;

pub use machine::{layout, SimVectors, Simulator};
pub use ram::SimBus;
