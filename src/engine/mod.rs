//! The debug engine: runs the target in-process and keeps it inspectable
//! between stops.
//!
//! [`DebugEngine`] owns the target's [`TargetContext`], the
//! [`BreakpointTable`] and the installed exception vectors. The target only
//! ever runs inside [`DebugEngine::resume`]; everything else happens while
//! it is frozen.

use core::fmt;

use crate::arch::{CpuRevision, M68kCoreRegs};
use crate::common::Signal;
use crate::hal::{BusFault, Entry, EntryMode, Host, ThreadHandle, ThreadRegistry, VectorTable};

mod breakpoints;
mod context;
mod frame;
mod memory;
mod target_impl;
mod threads;
mod vectors;

pub use self::breakpoints::{BreakpointError, BreakpointTable, BREAKPOINT_CAPACITY};
pub use self::context::{ReturnFrame, TargetContext};
pub use self::frame::{decode, Access, Decoded, ExceptionFrame, FaultInfo, FrameFormat};
pub use self::memory::BusExt;
pub use self::threads::{suspend_others, terminate_all, SuspendedSiblings};
pub use self::vectors::{Trampoline, VectorClass, VectorGuard};

/// Lifecycle of the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Loaded but never run.
    Loaded,
    /// Inside [`DebugEngine::resume`].
    Running,
    /// Trapped; registers and memory may be inspected.
    Stopped,
    /// Exited. The vectors are restored and nothing more can be done.
    Terminated,
}

/// Static facts about the loaded target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineConfig {
    /// Distance from the image's link address to where it was loaded.
    pub load_offset: u32,
}

/// Errors from the debug engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineError {
    /// The operation needs a halted target.
    NotHalted(EngineState),
    /// The target has exited.
    Terminated,
    /// A memory access faulted.
    BusFault(BusFault),
    /// A breakpoint could not be set or removed.
    Breakpoint(BreakpointError),
    /// No such thread in the target.
    UnknownThread,
}

impl From<BusFault> for EngineError {
    fn from(e: BusFault) -> Self {
        EngineError::BusFault(e)
    }
}

impl From<BreakpointError> for EngineError {
    fn from(e: BreakpointError) -> Self {
        match e {
            BreakpointError::Fault(e) => EngineError::BusFault(e),
            e => EngineError::Breakpoint(e),
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use self::EngineError::*;
        match self {
            NotHalted(state) => write!(f, "target is not halted (state: {:?})", state),
            Terminated => write!(f, "target has exited"),
            BusFault(e) => write!(f, "bus fault at {:#010x}", e.addr),
            Breakpoint(e) => write!(f, "breakpoint error: {:?}", e),
            UnknownThread => write!(f, "no such thread"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for EngineError {}

/// Why the target stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopEvent {
    /// Signal to report.
    pub signal: Signal,
    /// The vector that fired.
    pub class: Option<VectorClass>,
    /// Program counter of the stopped target.
    pub pc: u32,
    /// The failed access, for bus and address errors.
    pub fault: Option<FaultInfo>,
}

/// Outcome of running the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resumed {
    /// The target trapped.
    Stopped(StopEvent),
    /// The target exited with this status.
    Exited(u8),
}

/// A request to the engine, as issued through [`DebugEngine::request`].
pub enum Op<'a> {
    /// Fill the buffer from memory at an address, with breakpoints hidden.
    ReadMemory(u32, &'a mut [u8]),
    /// Write the bytes to memory at an address, keeping breakpoints armed.
    WriteMemory(u32, &'a [u8]),
    /// Read the registers.
    GetRegs(&'a mut M68kCoreRegs),
    /// Write the registers.
    SetRegs(&'a M68kCoreRegs),
    /// Run until the target traps.
    Cont(&'a mut dyn FnMut() -> bool),
    /// Run one instruction.
    SingleStep(&'a mut dyn FnMut() -> bool),
    /// Make the target exit.
    Kill,
}

/// The engine's answer to an [`Op`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// The target ran.
    Resumed(Resumed),
    /// Done; nothing to report.
    Done,
}

/// Which register set a thread id refers to.
enum Selected {
    Live,
    Sibling(ThreadHandle),
}

/// Controls a target running in the debugger's own address space.
pub struct DebugEngine<H: Host> {
    host: H,
    cpu: CpuRevision,
    config: EngineConfig,
    ctx: TargetContext,
    state: EngineState,
    breakpoints: BreakpointTable,
    vectors: Option<VectorGuard<H::Vectors>>,
    pending_fault: Option<FaultInfo>,
}

impl<H: Host> DebugEngine<H> {
    /// Take control of a freshly loaded target whose initial registers are
    /// `context`. Hooks the exception vectors right away.
    pub fn new(mut host: H, context: TargetContext, config: EngineConfig) -> DebugEngine<H> {
        let cpu = host.cpu_revision();
        let vectors = VectorGuard::install(host.vector_table());

        let mut ctx = context;
        ctx.update_sp();
        info!(
            "target loaded: pc={:#010x} usp={:#010x} ssp={:#010x} cpu={:?}",
            ctx.pc, ctx.usp, ctx.ssp, cpu
        );

        DebugEngine {
            host,
            cpu,
            config,
            ctx,
            state: EngineState::Loaded,
            breakpoints: BreakpointTable::new(),
            vectors: Some(vectors),
            pending_fault: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// The CPU the target runs on.
    pub fn cpu(&self) -> CpuRevision {
        self.cpu
    }

    /// The engine's configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The target's register state as of the last stop.
    pub fn context(&self) -> &TargetContext {
        &self.ctx
    }

    /// The active breakpoints.
    pub fn breakpoints(&self) -> &BreakpointTable {
        &self.breakpoints
    }

    /// The host backend.
    pub fn host(&mut self) -> &mut H {
        &mut self.host
    }

    /// Take the description of the bus or address error the target last
    /// stopped on, if it has not been taken yet.
    pub fn take_fault(&mut self) -> Option<FaultInfo> {
        self.pending_fault.take()
    }

    fn ensure_halted(&self) -> Result<(), EngineError> {
        match self.state {
            EngineState::Loaded | EngineState::Stopped => Ok(()),
            EngineState::Terminated => Err(EngineError::Terminated),
            state @ EngineState::Running => Err(EngineError::NotHalted(state)),
        }
    }

    /// The thread registry, if the target has threads right now.
    fn registry(&mut self) -> Result<Option<&mut H::Threads>, EngineError> {
        match self.host.threads() {
            Some(reg) => {
                if reg.is_active()? {
                    Ok(Some(reg))
                } else {
                    Ok(None)
                }
            }
            None => Ok(None),
        }
    }

    fn select(&mut self, thread: Option<ThreadHandle>) -> Result<Selected, EngineError> {
        let thread = match thread {
            Some(thread) => thread,
            None => return Ok(Selected::Live),
        };
        let reg = match self.registry()? {
            Some(reg) => reg,
            None if thread == ThreadHandle(0) => return Ok(Selected::Live),
            None => return Err(EngineError::UnknownThread),
        };
        if reg.current()? == thread {
            return Ok(Selected::Live);
        }
        let mut found = false;
        reg.list(&mut |t| found |= t == thread)?;
        if found {
            Ok(Selected::Sibling(thread))
        } else {
            Err(EngineError::UnknownThread)
        }
    }

    /// Dispatch a single [`Op`]. `thread` selects the register set for
    /// [`Op::GetRegs`] and [`Op::SetRegs`]; `None` means the current thread.
    pub fn request(
        &mut self,
        op: Op<'_>,
        thread: Option<ThreadHandle>,
    ) -> Result<Reply, EngineError> {
        Ok(match op {
            Op::ReadMemory(addr, buf) => {
                self.read_memory(addr, buf)?;
                Reply::Done
            }
            Op::WriteMemory(addr, data) => {
                self.write_memory(addr, data)?;
                Reply::Done
            }
            Op::GetRegs(regs) => {
                *regs = self.registers(thread)?;
                Reply::Done
            }
            Op::SetRegs(regs) => {
                self.set_registers(regs, thread)?;
                Reply::Done
            }
            Op::Cont(poll) => Reply::Resumed(self.resume(EntryMode::Continue, poll)?),
            Op::SingleStep(poll) => Reply::Resumed(self.resume(EntryMode::Step, poll)?),
            Op::Kill => Reply::Resumed(self.kill()?),
        })
    }

    /// Read target memory, with breakpoint patches hidden.
    pub fn read_memory(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), EngineError> {
        self.ensure_halted()?;
        self.host.bus().read_bytes(addr, buf)?;
        self.breakpoints.unshadow(addr, buf);
        Ok(())
    }

    /// Write target memory. Breakpoints inside the range stay armed and
    /// will restore the newly written bytes when removed.
    pub fn write_memory(&mut self, addr: u32, data: &[u8]) -> Result<(), EngineError> {
        self.ensure_halted()?;
        let bus = self.host.bus();
        bus.write_bytes(addr, data)?;
        self.breakpoints.reshadow(bus, addr, data)?;
        Ok(())
    }

    /// Arm a software breakpoint.
    pub fn set_breakpoint(&mut self, addr: u32, kind: usize) -> Result<(), EngineError> {
        self.ensure_halted()?;
        self.breakpoints.set(self.host.bus(), addr, kind)?;
        Ok(())
    }

    /// Disarm a software breakpoint.
    pub fn remove_breakpoint(&mut self, addr: u32, kind: usize) -> Result<(), EngineError> {
        self.ensure_halted()?;
        self.breakpoints.remove(self.host.bus(), addr, kind)?;
        Ok(())
    }

    /// Registers of `thread`: the live context for the current thread, the
    /// scheduler's saved copy for any other.
    pub fn registers(&mut self, thread: Option<ThreadHandle>) -> Result<M68kCoreRegs, EngineError> {
        self.ensure_halted()?;
        match self.select(thread)? {
            Selected::Live => Ok(self.ctx.core_regs()),
            Selected::Sibling(thread) => {
                let reg = self.registry()?.ok_or(EngineError::UnknownThread)?;
                Ok(reg.saved_context(thread)?.core_regs())
            }
        }
    }

    /// Overwrite the current thread's registers. Siblings are read-only.
    pub fn set_registers(
        &mut self,
        regs: &M68kCoreRegs,
        thread: Option<ThreadHandle>,
    ) -> Result<(), EngineError> {
        self.ensure_halted()?;
        match self.select(thread)? {
            Selected::Live => {
                self.ctx.set_core_regs(regs);
                Ok(())
            }
            Selected::Sibling(_) => Err(EngineError::UnknownThread),
        }
    }

    /// Report every thread of the target. A target without a thread
    /// facility has the single thread `ThreadHandle(0)`.
    pub fn list_threads(&mut self, thread: &mut dyn FnMut(ThreadHandle)) -> Result<(), EngineError> {
        match self.registry()? {
            Some(reg) => reg.list(thread)?,
            None => thread(ThreadHandle(0)),
        }
        Ok(())
    }

    /// The thread the target stopped in.
    pub fn current_thread(&mut self) -> Result<ThreadHandle, EngineError> {
        match self.registry()? {
            Some(reg) => Ok(reg.current()?),
            None => Ok(ThreadHandle(0)),
        }
    }

    /// Copy `thread`'s name into `buf`, returning its length.
    pub fn thread_name(&mut self, thread: ThreadHandle, buf: &mut [u8]) -> Result<usize, EngineError> {
        match self.registry()? {
            Some(reg) => Ok(reg.name(thread, buf)?),
            None if thread == ThreadHandle(0) => {
                let name = b"main";
                let n = name.len().min(buf.len());
                buf[..n].copy_from_slice(&name[..n]);
                Ok(n)
            }
            None => Err(EngineError::UnknownThread),
        }
    }

    /// Run the target until it traps or exits.
    ///
    /// Sibling threads are held for the duration. `poll_interrupt` is
    /// handed to the host to detect a client interrupt request.
    pub fn resume(
        &mut self,
        mode: EntryMode,
        poll_interrupt: &mut dyn FnMut() -> bool,
    ) -> Result<Resumed, EngineError> {
        self.ensure_halted()?;

        self.ctx.update_sp();
        if let Some(vectors) = self.vectors.as_mut() {
            vectors.table().flush_icache();
        }
        let suspended = match self.registry()? {
            Some(reg) => Some(suspend_others(reg)?),
            None => None,
        };

        self.state = EngineState::Running;
        self.pending_fault = None;
        let entry = self.host.enter_target(&mut self.ctx, mode, poll_interrupt);

        let offset = match entry {
            Entry::Trap(offset) => offset,
            Entry::Exited => {
                // the process and its threads are gone; nothing to resume
                drop(suspended);
                let status = self.host.exit_status();
                if let Some(vectors) = self.vectors.take() {
                    vectors.restore();
                }
                self.state = EngineState::Terminated;
                info!("target exited with status {}", status);
                return Ok(Resumed::Exited(status));
            }
        };

        self.state = EngineState::Stopped;
        if let Some(suspended) = suspended {
            if let Some(reg) = self.host.threads() {
                if let Err(e) = suspended.resume(reg) {
                    warn!("sibling threads not fully resumed: {:?}", e);
                }
            }
        }

        let decoded = decode(self.host.bus(), self.cpu, offset, self.ctx.ssp)?;
        self.ctx.sr = decoded.sr;
        self.ctx.pc = decoded.pc;
        self.ctx.ssp = decoded.ssp;
        self.ctx.update_sp();

        let mut signal = decoded.signal;
        if mode == EntryMode::Step
            && decoded.class == Some(VectorClass::Trace)
            && self.host.take_interrupt_request()
        {
            signal = Signal::SIGINT;
        }
        self.pending_fault = decoded.fault;

        Ok(Resumed::Stopped(StopEvent {
            signal,
            class: decoded.class,
            pc: decoded.pc,
            fault: decoded.fault,
        }))
    }

    /// Make the target exit through the host's exit path: every sibling but
    /// the main thread is blocked, the context is pointed at the exit
    /// routine, and the target is continued.
    pub fn kill(&mut self) -> Result<Resumed, EngineError> {
        self.ensure_halted()?;
        if let Some(reg) = self.registry()? {
            terminate_all(reg)?;
        }
        self.host.prepare_exit(&mut self.ctx)?;
        self.ctx.update_sp();
        self.resume(EntryMode::Continue, &mut || false)
    }
}
