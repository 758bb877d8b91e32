//! Private utility types used internally within `gdbserver68k`.

pub mod managed_vec;
