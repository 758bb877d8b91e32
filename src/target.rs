//! The interface between [`GdbStub`](crate::GdbStub) and the program being
//! debugged.
//!
//! [`DebugEngine`](crate::engine::DebugEngine) is the implementation used in
//! practice, but anything implementing [`Target`] can be served. The
//! integration tests drive the protocol layer with a simulated machine
//! through the same trait.

use crate::arch::{M68kCoreRegs, TARGET_XML};
use crate::common::{Signal, Tid};
use crate::protocol::ConsoleOutput;

/// The result of a target operation which may fail without ending the
/// debugging session.
pub type TargetResult<T, Tgt> = Result<T, TargetError<<Tgt as Target>::Error>>;

/// The error type for [`TargetResult`].
///
/// Anything other than `Fatal` is reported to the client as an `E<nn>`
/// reply, and the session carries on.
#[non_exhaustive]
#[derive(Debug)]
pub enum TargetError<E> {
    /// A non-specific, non-fatal error. Reported as `E01`.
    NonFatal,
    /// A non-fatal error with a specific errno, reported as `E<errno>`.
    Errno(u8),
    /// A non-fatal I/O error. Reported using its raw OS error code, or 121
    /// (`EREMOTEIO`) if it has none.
    #[cfg(feature = "std")]
    Io(std::io::Error),
    /// Something the session cannot recover from.
    Fatal(E),
}

impl<E> From<()> for TargetError<E> {
    fn from(_: ()) -> TargetError<E> {
        TargetError::NonFatal
    }
}

#[cfg(feature = "std")]
impl<E> From<std::io::Error> for TargetError<E> {
    fn from(e: std::io::Error) -> TargetError<E> {
        TargetError::Io(e)
    }
}

/// How the client wants the target to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeAction {
    /// Run until something traps.
    Continue,
    /// Execute a single instruction.
    Step,
}

/// Why [`Target::resume`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The target stopped with a signal.
    Signal(Signal),
    /// The target exited with the given status.
    Exited(u8),
}

/// Relocation of the loaded image relative to its link addresses, reported
/// in reply to `qOffsets`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionOffsets {
    /// `.text` displacement
    pub text: u32,
    /// `.data` displacement
    pub data: u32,
    /// `.bss` displacement
    pub bss: u32,
}

/// A debuggable m68k program.
///
/// Methods returning a [`TargetResult`] may fail with a non-fatal
/// [`TargetError`], which the stub reports to the client as an error reply.
/// Methods returning a plain `Result` end the session on error.
pub trait Target {
    /// A target-specific fatal error.
    type Error;

    /// Read the registers of thread `tid`.
    fn read_registers(&mut self, regs: &mut M68kCoreRegs, tid: Tid) -> TargetResult<(), Self>;

    /// Write the registers of thread `tid`.
    fn write_registers(&mut self, regs: &M68kCoreRegs, tid: Tid) -> TargetResult<(), Self>;

    /// Fill `data` with memory starting at `start_addr`.
    fn read_addrs(&mut self, start_addr: u32, data: &mut [u8]) -> TargetResult<(), Self>;

    /// Write `data` to memory starting at `start_addr`.
    fn write_addrs(&mut self, start_addr: u32, data: &[u8]) -> TargetResult<(), Self>;

    /// Run the target until it stops or exits.
    ///
    /// `check_gdb_interrupt` returns true once the client has asked for the
    /// target to be stopped; a target that sees it should stop and report
    /// [`Signal::SIGINT`]. It is cheap enough to poll every few hundred
    /// instructions.
    fn resume(
        &mut self,
        action: ResumeAction,
        check_gdb_interrupt: &mut dyn FnMut() -> bool,
    ) -> Result<StopReason, Self::Error>;

    /// Called after every [`resume`](Self::resume) that stopped on a signal,
    /// before the stop is reported. Anything written is shown on the client's
    /// console.
    fn report_console_output(&mut self, _output: &mut ConsoleOutput<'_>) {}

    /// Terminate the target.
    fn kill(&mut self) -> Result<(), Self::Error>;

    /// Set a software breakpoint. `kind` is the instruction length the
    /// client expects. Returns `false` if the breakpoint cannot be set.
    fn add_sw_breakpoint(&mut self, addr: u32, kind: usize) -> TargetResult<bool, Self>;

    /// Remove a software breakpoint. Returns `false` if there is none at
    /// `addr`.
    fn remove_sw_breakpoint(&mut self, addr: u32, kind: usize) -> TargetResult<bool, Self>;

    /// Report every live thread.
    fn list_active_threads(
        &mut self,
        thread_is_active: &mut dyn FnMut(Tid),
    ) -> Result<(), Self::Error>;

    /// The thread that was running when the target stopped.
    fn current_thread(&mut self) -> Result<Tid, Self::Error>;

    /// Write a human-readable description of `tid` (typically its name) into
    /// `buf`, returning the number of bytes written.
    fn thread_extra_info(&mut self, tid: Tid, buf: &mut [u8]) -> TargetResult<usize, Self>;

    /// Relocation of the loaded image, if the target was relocated.
    fn section_offsets(&mut self) -> Result<Option<SectionOffsets>, Self::Error> {
        Ok(None)
    }

    /// The target description served through `qXfer:features:read`.
    fn target_description_xml(&self) -> &str {
        TARGET_XML
    }
}
