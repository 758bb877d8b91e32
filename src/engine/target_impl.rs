use core::convert::TryFrom;

use super::{DebugEngine, EngineError, EngineState, Op, Reply, Resumed};
use crate::arch::M68kCoreRegs;
use crate::common::Tid;
use crate::hal::{Host, ThreadHandle};
use crate::outputln;
use crate::protocol::ConsoleOutput;
use crate::target::{
    ResumeAction, SectionOffsets, StopReason, Target, TargetError, TargetResult,
};

/// errno reported for memory the target cannot access (`EFAULT`)
const EFAULT: u8 = 0x0e;
/// errno reported for requests naming something that does not exist (`EINVAL`)
const EINVAL: u8 = 0x16;

impl From<EngineError> for TargetError<EngineError> {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::BusFault(_) => TargetError::Errno(EFAULT),
            EngineError::UnknownThread => TargetError::Errno(EINVAL),
            EngineError::Breakpoint(_) => TargetError::NonFatal,
            e @ EngineError::NotHalted(_) | e @ EngineError::Terminated => TargetError::Fatal(e),
        }
    }
}

fn handle_of(tid: Tid) -> Result<ThreadHandle, EngineError> {
    u16::try_from(tid.get() - 1)
        .map(ThreadHandle)
        .map_err(|_| EngineError::UnknownThread)
}

fn tid_of(thread: ThreadHandle) -> Tid {
    // `+ 1` on a u16 never wraps to zero in a usize
    Tid::new(usize::from(thread.0) + 1).unwrap_or(crate::SINGLE_THREAD_TID)
}

impl<H: Host> DebugEngine<H> {
    /// Issue a request that runs the target.
    fn run(&mut self, op: Op<'_>) -> Result<Resumed, EngineError> {
        match self.request(op, None)? {
            Reply::Resumed(resumed) => Ok(resumed),
            Reply::Done => unreachable!("running the target always reports how it stopped"),
        }
    }
}

impl<H: Host> Target for DebugEngine<H> {
    type Error = EngineError;

    fn read_registers(&mut self, regs: &mut M68kCoreRegs, tid: Tid) -> TargetResult<(), Self> {
        self.request(Op::GetRegs(regs), Some(handle_of(tid)?))?;
        Ok(())
    }

    fn write_registers(&mut self, regs: &M68kCoreRegs, tid: Tid) -> TargetResult<(), Self> {
        self.request(Op::SetRegs(regs), Some(handle_of(tid)?))?;
        Ok(())
    }

    fn read_addrs(&mut self, start_addr: u32, data: &mut [u8]) -> TargetResult<(), Self> {
        self.request(Op::ReadMemory(start_addr, data), None)?;
        Ok(())
    }

    fn write_addrs(&mut self, start_addr: u32, data: &[u8]) -> TargetResult<(), Self> {
        self.request(Op::WriteMemory(start_addr, data), None)?;
        Ok(())
    }

    fn resume(
        &mut self,
        action: ResumeAction,
        check_gdb_interrupt: &mut dyn FnMut() -> bool,
    ) -> Result<StopReason, EngineError> {
        let op = match action {
            ResumeAction::Continue => Op::Cont(check_gdb_interrupt),
            ResumeAction::Step => Op::SingleStep(check_gdb_interrupt),
        };
        Ok(match self.run(op)? {
            Resumed::Stopped(stop) => StopReason::Signal(stop.signal),
            Resumed::Exited(status) => StopReason::Exited(status),
        })
    }

    fn report_console_output(&mut self, output: &mut ConsoleOutput<'_>) {
        if let Some(fault) = self.take_fault() {
            outputln!(output, "{}", fault);
        }
    }

    fn kill(&mut self) -> Result<(), EngineError> {
        match self.run(Op::Kill)? {
            Resumed::Exited(status) => debug!("killed target exited with status {}", status),
            Resumed::Stopped(stop) => warn!(
                "target trapped on its way out ({} at {:#010x})",
                stop.signal, stop.pc
            ),
        }
        Ok(())
    }

    fn add_sw_breakpoint(&mut self, addr: u32, kind: usize) -> TargetResult<bool, Self> {
        match self.set_breakpoint(addr, kind) {
            Ok(()) => Ok(true),
            Err(EngineError::Breakpoint(e)) => {
                debug!("cannot set breakpoint at {:#010x}: {:?}", addr, e);
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn remove_sw_breakpoint(&mut self, addr: u32, kind: usize) -> TargetResult<bool, Self> {
        match self.remove_breakpoint(addr, kind) {
            Ok(()) => Ok(true),
            Err(EngineError::Breakpoint(_)) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn list_active_threads(
        &mut self,
        thread_is_active: &mut dyn FnMut(Tid),
    ) -> Result<(), EngineError> {
        self.list_threads(&mut |thread| thread_is_active(tid_of(thread)))
    }

    fn current_thread(&mut self) -> Result<Tid, EngineError> {
        Ok(tid_of(DebugEngine::current_thread(self)?))
    }

    fn thread_extra_info(&mut self, tid: Tid, buf: &mut [u8]) -> TargetResult<usize, Self> {
        Ok(self.thread_name(handle_of(tid)?, buf)?)
    }

    fn section_offsets(&mut self) -> Result<Option<SectionOffsets>, EngineError> {
        if self.state() == EngineState::Terminated {
            return Err(EngineError::Terminated);
        }
        let offset = self.config().load_offset;
        Ok(Some(SectionOffsets {
            text: offset,
            data: offset,
            bss: offset,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_ids_are_one_based() {
        assert_eq!(handle_of(crate::SINGLE_THREAD_TID), Ok(ThreadHandle(0)));
        assert_eq!(tid_of(ThreadHandle(4)).get(), 5);
        assert_eq!(
            handle_of(Tid::new(0x10001).unwrap()),
            Err(EngineError::UnknownThread)
        );
    }

    #[test]
    fn engine_errors_map_to_reply_codes() {
        let e: TargetError<EngineError> = EngineError::BusFault(crate::hal::BusFault { addr: 0 }).into();
        assert!(matches!(e, TargetError::Errno(0x0e)));
        let e: TargetError<EngineError> = EngineError::UnknownThread.into();
        assert!(matches!(e, TargetError::Errno(0x16)));
        let e: TargetError<EngineError> = EngineError::Terminated.into();
        assert!(matches!(e, TargetError::Fatal(EngineError::Terminated)));
    }
}
