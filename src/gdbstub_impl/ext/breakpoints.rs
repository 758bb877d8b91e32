use super::prelude::*;

use crate::protocol::commands::breakpoint::BasicBreakpoint;

/// `Z0`/`z0`: the only breakpoint type the stub implements.
const SW_BREAKPOINT: u8 = 0;

impl<T: Target, C: Connection> GdbStubImpl<T, C> {
    pub(crate) fn handle_add_breakpoint(
        &mut self,
        target: &mut T,
        cmd: BasicBreakpoint,
    ) -> Result<HandlerStatus, Error<T::Error, C::Error>> {
        if cmd.type_ != SW_BREAKPOINT {
            // empty reply: unsupported
            return Ok(HandlerStatus::Handled);
        }

        match target.add_sw_breakpoint(cmd.addr, cmd.kind).handle_error()? {
            true => Ok(HandlerStatus::NeedsOk),
            false => Err(Error::NonFatalError(1)),
        }
    }

    pub(crate) fn handle_remove_breakpoint(
        &mut self,
        target: &mut T,
        cmd: BasicBreakpoint,
    ) -> Result<HandlerStatus, Error<T::Error, C::Error>> {
        if cmd.type_ != SW_BREAKPOINT {
            return Ok(HandlerStatus::Handled);
        }

        match target.remove_sw_breakpoint(cmd.addr, cmd.kind).handle_error()? {
            true => Ok(HandlerStatus::NeedsOk),
            false => Err(Error::NonFatalError(1)),
        }
    }
}
