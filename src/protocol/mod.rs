//! GDB Remote Serial Protocol framing and command parsing.

pub(crate) mod commands;
pub(crate) mod common;
mod console_output;
mod packet;
pub(crate) mod recv_packet;
mod response_writer;

pub use console_output::ConsoleOutput;
pub use packet::PacketParseError;
pub(crate) use packet::Packet;
pub use response_writer::Error as ResponseWriterError;
pub(crate) use response_writer::ResponseWriter;
