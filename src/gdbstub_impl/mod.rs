use core::marker::PhantomData;

use managed::ManagedSlice;

use crate::common::*;
use crate::connection::Connection;
use crate::protocol::commands::Command;
use crate::protocol::recv_packet::{RecvPacketBlocking, RecvPacketError};
use crate::protocol::{Packet, PacketParseError, ResponseWriter};
use crate::target::Target;
use crate::SINGLE_THREAD_TID;

mod builder;
mod error;
mod ext;
mod target_result_ext;

pub use builder::{GdbStubBuilder, GdbStubBuilderError, DEFAULT_PACKET_BUFFER_SIZE};
pub use error::GdbStubError;

use GdbStubError as Error;

/// errno sent back for requests the stub cannot make sense of (`EINVAL`)
const EINVAL: u8 = 0x16;

/// Describes why the GDB session ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Target exited with given status code
    TargetExited(u8),
    /// GDB issued a kill command
    Kill,
    /// GDB interrupted the target before the session got going. The target
    /// has been killed.
    Aborted,
}

/// Debug a [`Target`] using the GDB Remote Serial Protocol over a given
/// [`Connection`].
pub struct GdbStub<'a, T: Target, C: Connection> {
    conn: C,
    packet_buffer: ManagedSlice<'a, u8>,
    state: GdbStubImpl<T, C>,
}

impl<'a, T: Target, C: Connection> GdbStub<'a, T, C> {
    /// Create a [`GdbStubBuilder`] using the provided Connection.
    pub fn builder(conn: C) -> GdbStubBuilder<'a, T, C> {
        GdbStubBuilder::new(conn)
    }

    /// Create a new `GdbStub` using the provided connection.
    ///
    /// _Note:_ `new` is only available when the `alloc` feature is enabled, as
    /// it will use a dynamically allocated `Vec` as a packet buffer.
    ///
    /// For fine-grained control over various `GdbStub` options, including the
    /// ability to specify a fixed-size buffer, use the [`GdbStub::builder`]
    /// method instead.
    #[cfg(feature = "alloc")]
    pub fn new(conn: C) -> GdbStub<'a, T, C> {
        // without a borrowed buffer, the only way `build` can fail is with
        // `alloc` disabled
        match GdbStubBuilder::new(conn).build() {
            Ok(stub) => stub,
            Err(e) => unreachable!("{}", e),
        }
    }

    /// Starts a GDB remote debugging session.
    ///
    /// Returns once the GDB client closes the debugging session, or if the
    /// target exits.
    pub fn run(&mut self, target: &mut T) -> Result<DisconnectReason, Error<T::Error, C::Error>> {
        self.state
            .run(target, &mut self.conn, &mut self.packet_buffer)
    }

    /// Return a mutable reference to the underlying connection.
    pub fn borrow_conn(&mut self) -> &mut C {
        &mut self.conn
    }
}

struct GdbStubImpl<T: Target, C: Connection> {
    _target: PhantomData<T>,
    _connection: PhantomData<C>,

    current_mem_tid: Tid,
    attached: bool,
    packet_buffer_len: usize,
    session_started: bool,
}

enum HandlerStatus {
    Handled,
    NeedsOk,
    Disconnect(DisconnectReason),
}

impl<T: Target, C: Connection> GdbStubImpl<T, C> {
    fn new(packet_buffer_len: usize, attached: bool) -> GdbStubImpl<T, C> {
        GdbStubImpl {
            _target: PhantomData,
            _connection: PhantomData,

            // the client selects a thread with `Hg` before it cares
            current_mem_tid: SINGLE_THREAD_TID,
            attached,
            packet_buffer_len,
            session_started: false,
        }
    }

    fn run(
        &mut self,
        target: &mut T,
        conn: &mut C,
        packet_buffer: &mut ManagedSlice<u8>,
    ) -> Result<DisconnectReason, Error<T::Error, C::Error>> {
        conn.on_session_start().map_err(Error::ConnectionRead)?;

        loop {
            let packet_buffer = match RecvPacketBlocking::new().recv(packet_buffer, || conn.read())
            {
                Err(RecvPacketError::Capacity) => return Err(Error::PacketBufferOverflow),
                Err(RecvPacketError::Connection(e)) => return Err(Error::ConnectionRead(e)),
                Ok(buf) => buf,
            };

            let packet = match Packet::from_buf(packet_buffer) {
                Ok(packet) => packet,
                Err(e) if e.is_framing_error() => {
                    warn!("bad packet, requesting retransmit: {:?}", e);
                    conn.write(b'-').map_err(Error::ConnectionWrite)?;
                    conn.flush().map_err(Error::ConnectionWrite)?;
                    continue;
                }
                Err(PacketParseError::MalformedCommand) => {
                    warn!("malformed command");
                    conn.write(b'+').map_err(Error::ConnectionWrite)?;
                    let mut res = ResponseWriter::new(conn);
                    res.write_str("E")?;
                    res.write_num(EINVAL)?;
                    res.flush()?;
                    continue;
                }
                Err(e) => {
                    warn!("ignoring junk from client: {:?}", e);
                    continue;
                }
            };

            if let Some(disconnect_reason) = self.handle_packet(target, conn, packet)? {
                return Ok(disconnect_reason);
            }
        }
    }

    fn handle_packet(
        &mut self,
        target: &mut T,
        conn: &mut C,
        packet: Packet<'_>,
    ) -> Result<Option<DisconnectReason>, Error<T::Error, C::Error>> {
        match packet {
            Packet::Ack => {}
            Packet::Nack => warn!("client NACKed a reply; not retransmitting"),
            Packet::Interrupt if !self.session_started => {
                info!("interrupted before the session started, killing target");
                target.kill().map_err(Error::TargetError)?;
                return Ok(Some(DisconnectReason::Aborted));
            }
            Packet::Interrupt => debug!("<-- interrupt packet while stopped, ignored"),
            Packet::Command(command) => {
                self.session_started = true;

                // Acknowledge the command
                conn.write(b'+').map_err(Error::ConnectionWrite)?;

                let mut res = ResponseWriter::new(conn);
                let disconnect_reason = match self.handle_command(&mut res, target, command) {
                    Ok(HandlerStatus::Handled) => None,
                    Ok(HandlerStatus::NeedsOk) => {
                        res.write_str("OK")?;
                        None
                    }
                    Ok(HandlerStatus::Disconnect(reason)) => Some(reason),
                    // HACK: handling this "dummy" error is required as part of the
                    // `TargetResultExt::handle_error()` machinery.
                    Err(Error::NonFatalError(code)) => {
                        res.write_str("E")?;
                        res.write_num(code)?;
                        None
                    }
                    Err(Error::TargetError(e)) => {
                        // leave the client with a stop it can inspect
                        res.write_str("S05")?;
                        res.flush()?;
                        return Err(Error::TargetError(e));
                    }
                    Err(e) => return Err(e),
                };

                res.flush()?;
                return Ok(disconnect_reason);
            }
        };

        Ok(None)
    }

    fn handle_command(
        &mut self,
        res: &mut ResponseWriter<C>,
        target: &mut T,
        cmd: Command<'_>,
    ) -> Result<HandlerStatus, Error<T::Error, C::Error>> {
        match cmd {
            Command::Unknown(cmd) => {
                info!("Unknown command: {}", alloc::string::String::from_utf8_lossy(cmd));
                Ok(HandlerStatus::Handled)
            }
            // `handle_X` methods are defined in the `ext` module
            Command::QuestionMark(_) => self.handle_stop_reason(res),
            Command::g(_) => self.handle_read_registers(res, target),
            Command::G(cmd) => self.handle_write_registers(target, cmd),
            Command::H(cmd) => self.handle_set_thread(target, cmd),
            Command::m(cmd) => self.handle_read_memory(res, target, cmd),
            Command::M(cmd) => self.handle_write_memory(target, cmd.addr, cmd.len, cmd.val),
            Command::X(cmd) => self.handle_write_memory(target, cmd.addr, cmd.len, cmd.val),
            Command::qAttached(_) => self.handle_attached(res),
            Command::qC(_) => self.handle_current_thread(res, target),
            Command::qfThreadInfo(_) => self.handle_thread_list(res, target),
            Command::qsThreadInfo(_) => {
                res.write_str("l")?;
                Ok(HandlerStatus::Handled)
            }
            Command::qThreadExtraInfo(cmd) => self.handle_thread_extra_info(res, target, cmd),
            Command::qSupported(cmd) => self.handle_supported(res, cmd),
            Command::qSymbol(_) => Ok(HandlerStatus::NeedsOk),
            Command::qTStatus(_) => Ok(HandlerStatus::Handled),
            Command::qOffsets(_) => self.handle_section_offsets(res, target),
            Command::qXferFeaturesRead(cmd) => self.handle_target_xml(res, target, cmd),
            Command::Z(cmd) => self.handle_add_breakpoint(target, cmd.0),
            Command::z(cmd) => self.handle_remove_breakpoint(target, cmd.0),
            Command::vContQuestionMark(_) => {
                res.write_str("vCont;c;C;s;S")?;
                Ok(HandlerStatus::Handled)
            }
            Command::vCont(cmd) => self.handle_vcont(res, target, cmd),
            Command::vKill(_) => self.handle_kill(res, target),
        }
    }
}
