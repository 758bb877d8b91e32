use super::prelude::*;

use crate::arch::{M68kCoreRegs, Registers};
use crate::protocol::commands::_h_upcase::Op;
use crate::protocol::commands::{m, qSupported, qThreadExtraInfo, G, H};
use crate::protocol::common::thread_id::IdKind;

impl<T: Target, C: Connection> GdbStubImpl<T, C> {
    pub(crate) fn handle_supported(
        &mut self,
        res: &mut ResponseWriter<C>,
        cmd: qSupported<'_>,
    ) -> Result<HandlerStatus, Error<T::Error, C::Error>> {
        debug!(
            "client features: {}",
            alloc::string::String::from_utf8_lossy(cmd.features)
        );

        res.write_str("PacketSize=")?;
        res.write_num(self.packet_buffer_len)?;
        res.write_str(";qXfer:features:read+")?;
        Ok(HandlerStatus::Handled)
    }

    pub(crate) fn handle_stop_reason(
        &mut self,
        res: &mut ResponseWriter<C>,
    ) -> Result<HandlerStatus, Error<T::Error, C::Error>> {
        // the target is only ever inspected while trapped
        res.write_str("S")?;
        res.write_num(Signal::SIGTRAP.0)?;
        Ok(HandlerStatus::Handled)
    }

    pub(crate) fn handle_attached(
        &mut self,
        res: &mut ResponseWriter<C>,
    ) -> Result<HandlerStatus, Error<T::Error, C::Error>> {
        res.write_str(if self.attached { "1" } else { "0" })?;
        Ok(HandlerStatus::Handled)
    }

    pub(crate) fn handle_read_registers(
        &mut self,
        res: &mut ResponseWriter<C>,
        target: &mut T,
    ) -> Result<HandlerStatus, Error<T::Error, C::Error>> {
        let mut regs = M68kCoreRegs::default();
        target
            .read_registers(&mut regs, self.current_mem_tid)
            .handle_error()?;

        let mut err = Ok(());
        regs.gdb_serialize(|val| {
            let res = match val {
                Some(b) => res.write_hex_buf(&[b]),
                None => res.write_str("xx"),
            };
            if let Err(e) = res {
                err = Err(e);
            }
        });
        err?;
        Ok(HandlerStatus::Handled)
    }

    pub(crate) fn handle_write_registers(
        &mut self,
        target: &mut T,
        cmd: G<'_>,
    ) -> Result<HandlerStatus, Error<T::Error, C::Error>> {
        let mut regs = M68kCoreRegs::default();
        if regs.gdb_deserialize(cmd.vals).is_err() {
            return Err(Error::NonFatalError(EINVAL));
        }
        target
            .write_registers(&regs, self.current_mem_tid)
            .handle_error()?;
        Ok(HandlerStatus::NeedsOk)
    }

    pub(crate) fn handle_set_thread(
        &mut self,
        target: &mut T,
        cmd: H,
    ) -> Result<HandlerStatus, Error<T::Error, C::Error>> {
        match cmd.kind {
            Op::Other => {
                self.current_mem_tid = match cmd.thread.tid {
                    IdKind::WithId(tid) => tid,
                    IdKind::Any | IdKind::All => {
                        target.current_thread().map_err(Error::TargetError)?
                    }
                }
            }
            // resumption always follows the thread that stopped
            Op::StepContinue => {}
        }
        Ok(HandlerStatus::NeedsOk)
    }

    pub(crate) fn handle_read_memory(
        &mut self,
        res: &mut ResponseWriter<C>,
        target: &mut T,
        cmd: m<'_>,
    ) -> Result<HandlerStatus, Error<T::Error, C::Error>> {
        // the hex-encoded reply has to fit the client's packet size
        if cmd.len > cmd.buf.len() / 2 {
            return Err(Error::NonFatalError(EINVAL));
        }

        let data = &mut cmd.buf[..cmd.len];
        target.read_addrs(cmd.addr, data).handle_error()?;
        res.write_hex_buf(data)?;
        Ok(HandlerStatus::Handled)
    }

    pub(crate) fn handle_write_memory(
        &mut self,
        target: &mut T,
        addr: u32,
        len: usize,
        val: &[u8],
    ) -> Result<HandlerStatus, Error<T::Error, C::Error>> {
        if val.len() != len {
            return Err(Error::NonFatalError(EINVAL));
        }
        if !val.is_empty() {
            target.write_addrs(addr, val).handle_error()?;
        }
        Ok(HandlerStatus::NeedsOk)
    }

    pub(crate) fn handle_current_thread(
        &mut self,
        res: &mut ResponseWriter<C>,
        target: &mut T,
    ) -> Result<HandlerStatus, Error<T::Error, C::Error>> {
        let tid = target.current_thread().map_err(Error::TargetError)?;
        res.write_str("QC")?;
        res.write_num(tid.get())?;
        Ok(HandlerStatus::Handled)
    }

    pub(crate) fn handle_thread_list(
        &mut self,
        res: &mut ResponseWriter<C>,
        target: &mut T,
    ) -> Result<HandlerStatus, Error<T::Error, C::Error>> {
        res.write_str("m")?;

        let mut err = Ok(());
        let mut first = true;
        target
            .list_active_threads(&mut |tid| {
                if err.is_err() {
                    return;
                }
                let sep = if first { Ok(()) } else { res.write_str(",") };
                first = false;
                if let Err(e) = sep.and_then(|_| res.write_num(tid.get())) {
                    err = Err(e)
                }
            })
            .map_err(Error::TargetError)?;
        err?;

        Ok(HandlerStatus::Handled)
    }

    pub(crate) fn handle_thread_extra_info(
        &mut self,
        res: &mut ResponseWriter<C>,
        target: &mut T,
        cmd: qThreadExtraInfo,
    ) -> Result<HandlerStatus, Error<T::Error, C::Error>> {
        let mut buf = [0; 32];
        let len = target
            .thread_extra_info(cmd.tid, &mut buf)
            .handle_error()?;
        res.write_hex_buf(&buf[..len.min(buf.len())])?;
        Ok(HandlerStatus::Handled)
    }
}
