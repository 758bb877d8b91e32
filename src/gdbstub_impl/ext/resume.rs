use super::prelude::*;

use crate::protocol::commands::_vCont::{vCont, VContKind};
use crate::protocol::ConsoleOutput;
use crate::target::{ResumeAction, StopReason};

impl<T: Target, C: Connection> GdbStubImpl<T, C> {
    pub(crate) fn handle_vcont(
        &mut self,
        res: &mut ResponseWriter<C>,
        target: &mut T,
        cmd: vCont<'_>,
    ) -> Result<HandlerStatus, Error<T::Error, C::Error>> {
        // there is only ever one runnable thread, so the first action decides
        let action = match cmd.actions().next().flatten() {
            Some(action) => action,
            None => return Err(Error::NonFatalError(EINVAL)),
        };

        let action = match action.kind {
            VContKind::Continue => ResumeAction::Continue,
            // signals cannot be delivered; resuming with one steps instead
            VContKind::Step | VContKind::StepWithSig(_) | VContKind::ContinueWithSig(_) => {
                ResumeAction::Step
            }
        };

        self.do_resume(res, target, action)
    }

    fn do_resume(
        &mut self,
        res: &mut ResponseWriter<C>,
        target: &mut T,
        action: ResumeAction,
    ) -> Result<HandlerStatus, Error<T::Error, C::Error>> {
        let mut err: Result<(), Error<T::Error, C::Error>> = Ok(());
        let stop_reason = {
            let mut check_gdb_interrupt = || match res.as_conn().peek() {
                Ok(Some(0x03)) => true, // 0x03 is the interrupt byte
                Ok(Some(_)) => false,   // it's nice that GDB is chatty, but we're busy
                Ok(None) => false,
                Err(e) => {
                    err = Err(Error::ConnectionRead(e));
                    true // assume something went wrong and report a stop
                }
            };
            target
                .resume(action, &mut check_gdb_interrupt)
                .map_err(Error::TargetError)?
        };
        err?;

        let signal = match stop_reason {
            StopReason::Exited(code) => {
                res.write_str("W")?;
                res.write_num(code)?;
                return Ok(HandlerStatus::Disconnect(DisconnectReason::TargetExited(code)));
            }
            StopReason::Signal(signal) => signal,
        };

        // console output goes out as `O` packets ahead of the stop reply
        let mut err = Ok(());
        {
            let conn = res.as_conn();
            let mut callback = |buf: &[u8]| {
                if err.is_err() {
                    return;
                }
                let mut out = ResponseWriter::new(&mut *conn);
                let sent = match out.write_str("O").and_then(|_| out.write_hex_buf(buf)) {
                    Ok(()) => out.flush(),
                    Err(e) => Err(e),
                };
                if let Err(e) = sent {
                    err = Err(e);
                }
            };
            target.report_console_output(&mut ConsoleOutput::new(&mut callback));
        }
        err?;

        if let Ok(tid) = target.current_thread() {
            self.current_mem_tid = tid;
        }

        res.write_str("S")?;
        res.write_num(signal.0)?;
        Ok(HandlerStatus::Handled)
    }

    pub(crate) fn handle_kill(
        &mut self,
        res: &mut ResponseWriter<C>,
        target: &mut T,
    ) -> Result<HandlerStatus, Error<T::Error, C::Error>> {
        target.kill().map_err(Error::TargetError)?;
        res.write_str("OK")?;
        Ok(HandlerStatus::Disconnect(DisconnectReason::Kill))
    }
}
