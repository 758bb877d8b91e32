use gdbserver68k::arch::CpuRevision;
use gdbserver68k::engine::{BusExt, DebugEngine, EngineConfig, ReturnFrame, TargetContext};
use gdbserver68k::hal::human68k::{prc, pth, work_area, Human68kThreads};
use gdbserver68k::hal::{
    BusFault, Entry, EntryMode, Host, SchedState, ThreadHandle, ThreadRegistry, VectorTable,
};

use crate::cpu::{self, Cpu, Trap};
use crate::ram::SimBus;

/// Where things live in the simulated address space.
pub mod layout {
    /// Size of RAM. Everything above is unmapped and raises a bus error.
    pub const RAM_SIZE: u32 = 0x10_0000;
    /// Where the engine's trampolines are copied.
    pub const TRAMPOLINES: u32 = 0x0800;
    /// Code executing `_EXIT`, pointed at by the work area's exit entry.
    pub const EXIT_STUB: u32 = 0x1900;
    /// Process table, when threads are enabled.
    pub const PROCESS_TABLE: u32 = 0x2000;
    /// libpthread blocks, when threads are enabled.
    pub const THREAD_BLOCKS: u32 = 0x3000;
    /// Where programs are loaded.
    pub const LOAD_ADDR: u32 = 0x6800;
    /// Initial user stack pointer.
    pub const USER_STACK: u32 = 0x8_0000;
    /// Initial supervisor stack pointer.
    pub const SUPERVISOR_STACK: u32 = 0x9_0000;
    /// The engine's trap entry. Not backed by memory: the machine hands
    /// control back to the engine when execution gets here.
    pub const TRAP_ENTRY: u32 = 0x00fe_0000;
    /// The engine's interrupt entry.
    pub const NMI_ENTRY: u32 = 0x00fe_0010;
    /// Initial target of every vector. Getting here is fatal.
    pub const UNHANDLED: u32 = 0x00fe_0100;
}

use self::layout::*;

/// Instructions between two polls of the client interrupt callback.
const POLL_INTERVAL: u64 = 256;

/// The vector table at address 0.
pub struct SimVectors {
    bus: SimBus,
}

impl VectorTable for SimVectors {
    fn read_vector(&mut self, offset: u16) -> u32 {
        self.bus.read_u32(u32::from(offset)).unwrap_or(UNHANDLED)
    }

    fn write_vector(&mut self, offset: u16, handler: u32) {
        if let Err(e) = self.bus.write_u32(u32::from(offset), handler) {
            error!("cannot write vector {:#x}: {:?}", offset, e);
        }
    }

    fn place_trampolines(&mut self, code: &[u8]) -> u32 {
        if let Err(e) = self.bus.load(TRAMPOLINES, code) {
            error!("cannot place trampolines: {:?}", e);
        }
        TRAMPOLINES
    }

    fn trap_entry(&self) -> u32 {
        TRAP_ENTRY
    }

    fn interrupt_entry(&self) -> u32 {
        NMI_ENTRY
    }

    // neither simulated CPU has a cache
    fn flush_icache(&mut self) {}
}

/// A 68000 or 68010 with 1 MiB of RAM, running one Human68k-style process.
pub struct Simulator {
    revision: CpuRevision,
    bus: SimBus,
    vectors: Option<SimVectors>,
    threads: Option<Human68kThreads<SimBus>>,
    cpu: Cpu,
    interrupt_pending: bool,
    exit_status: u8,
    instructions: u64,
    blocked_during_run: Vec<ThreadHandle>,
}

impl Simulator {
    /// A machine with empty RAM, every vector pointing nowhere, and a DOS
    /// exit routine.
    pub fn new(revision: CpuRevision) -> Simulator {
        let revision = match revision {
            CpuRevision::Mc68000 | CpuRevision::Mc68010 => revision,
            other => {
                warn!("{:?} is not simulated, using a 68010", other);
                CpuRevision::Mc68010
            }
        };

        let mut bus = SimBus::new(RAM_SIZE as usize);
        let mut setup = || -> Result<(), BusFault> {
            for offset in (0..0x400).step_by(4) {
                bus.write_u32(offset, UNHANDLED)?;
            }
            // _EXIT
            bus.write_u16(EXIT_STUB, 0xff00)?;
            bus.write_u32(work_area::EXIT_ENTRY, EXIT_STUB)?;
            bus.write_u8(work_area::MPU_TYPE, revision as u8)
        };
        if let Err(e) = setup() {
            error!("RAM too small for the system area: {:?}", e);
        }

        Simulator {
            revision,
            vectors: Some(SimVectors { bus: bus.clone() }),
            bus,
            threads: None,
            cpu: Cpu::default(),
            interrupt_pending: false,
            exit_status: 0,
            instructions: 0,
            blocked_during_run: Vec::new(),
        }
    }

    /// Shared handle to RAM.
    pub fn ram(&self) -> SimBus {
        self.bus.clone()
    }

    /// Copy a program image into RAM.
    pub fn load(&mut self, addr: u32, image: &[u8]) -> Result<(), BusFault> {
        self.bus.load(addr, image)
    }

    /// Registers for a program entered at `entry` in user mode.
    pub fn initial_context(&self, entry: u32) -> TargetContext {
        TargetContext {
            pc: entry,
            usp: USER_STACK,
            ssp: SUPERVISOR_STACK,
            ..TargetContext::default()
        }
    }

    /// Lay out a libpthread-style thread list in the process table: one
    /// slot per name, slot 0 being the main thread and `current` the one
    /// that is running. Sibling `i` has `d0 = i` and `pc = entry` saved.
    pub fn spawn_threads(
        &mut self,
        names: &[&str],
        current: u16,
        entry: u32,
    ) -> Result<(), BusFault> {
        let bus = &mut self.bus;
        let slot = |i: u32| PROCESS_TABLE + i * work_area::PRC_SIZE;
        let block = |i: u32| THREAD_BLOCKS + i * 0x20;

        bus.write_u32(work_area::PRC_TABLE, PROCESS_TABLE)?;
        bus.write_u32(work_area::PRC_CURRENT, slot(u32::from(current)))?;
        bus.write_u16(work_area::PRC_COUNT, names.len().saturating_sub(1) as u16)?;

        for (i, name) in names.iter().enumerate() {
            let i = i as u32;
            let mut padded = [0; prc::NAME_LEN];
            let n = name.len().min(padded.len());
            padded[..n].copy_from_slice(&name.as_bytes()[..n]);

            bus.load(slot(i) + prc::NAME, &padded)?;
            bus.write_u8(slot(i) + prc::WAIT_FLAG, 0)?;
            bus.write_u8(slot(i) + prc::COUNTER, 5)?;
            bus.write_u32(slot(i) + prc::WAIT_TIME, 0)?;
            bus.write_u32(slot(i) + prc::D, i)?;
            bus.write_u32(slot(i) + prc::PC, entry)?;
            bus.write_u32(slot(i) + prc::USP, USER_STACK - 0x1000 * (i + 1))?;
            bus.write_u32(slot(i) + prc::SSP, SUPERVISOR_STACK)?;
            bus.write_u32(slot(i) + prc::BUF_PTR, block(i))?;

            bus.write_u32(block(i) + pth::MAGIC_OFF, pth::MAGIC)?;
            bus.write_u32(block(i) + pth::TID, i)?;
            bus.write_u32(block(i) + pth::MAIN, block(0))?;
            let next = if i + 1 < names.len() as u32 { block(i + 1) } else { 0 };
            bus.write_u32(block(i) + pth::NEXT, next)?;
        }

        self.threads = Some(Human68kThreads::new(self.bus.clone()));
        Ok(())
    }

    /// The threads that were blocked while the target last ran.
    pub fn blocked_during_run(&self) -> &[ThreadHandle] {
        &self.blocked_during_run
    }

    /// Total instructions executed.
    pub fn instructions(&self) -> u64 {
        self.instructions
    }

    /// Hand the machine to a debug engine, with the program entered at
    /// `entry`.
    pub fn into_engine(self, entry: u32, config: EngineConfig) -> DebugEngine<Simulator> {
        let ctx = self.initial_context(entry);
        DebugEngine::new(self, ctx, config)
    }

    fn record_blocked(&mut self) {
        self.blocked_during_run.clear();
        let threads = match self.threads.as_mut() {
            Some(threads) => threads,
            None => return,
        };
        let mut all = Vec::new();
        if threads.list(&mut |t| all.push(t)).is_err() {
            return;
        }
        for t in all {
            if let Ok(state) = threads.sched_state(t) {
                if state.wait_flag == SchedState::WAITING {
                    self.blocked_during_run.push(t);
                }
            }
        }
    }

    /// Run until control reaches one of the engine's entries, or the
    /// program exits.
    fn run(&mut self, mode: EntryMode, poll_interrupt: &mut dyn FnMut() -> bool) -> Entry {
        if mode == EntryMode::Step && poll_interrupt() {
            self.interrupt_pending = true;
        }

        let mut executed = 0u64;
        loop {
            match self.cpu.pc {
                TRAP_ENTRY | NMI_ENTRY => {
                    return match self.cpu.pop16(&mut self.bus) {
                        Ok(offset) => Entry::Trap(offset),
                        Err(e) => {
                            error!("trampoline left no vector code: {:?}", e);
                            self.halt()
                        }
                    };
                }
                pc if pc >= UNHANDLED => {
                    error!("unhandled exception through vector {:#x}", pc - UNHANDLED);
                    return self.halt();
                }
                _ => {}
            }

            let opcode = self.bus.read_u16(self.cpu.pc).unwrap_or(0);
            executed += 1;
            self.instructions += 1;
            match self.cpu.execute(&mut self.bus, self.revision) {
                Ok(()) => {
                    if self.cpu.tracing() {
                        let pc = self.cpu.pc;
                        let trace = Trap::Exception {
                            offset: cpu::TRACE,
                            pc,
                        };
                        if let Err(addr) =
                            self.cpu.take_exception(&mut self.bus, self.revision, trace, 0)
                        {
                            return self.double_fault(addr);
                        }
                    }
                }
                Err(Trap::Dos(call)) => {
                    if let Some(status) = self.dos_call(call) {
                        return self.exit(status);
                    }
                }
                Err(trap) => {
                    if let Err(addr) =
                        self.cpu
                            .take_exception(&mut self.bus, self.revision, trap, opcode)
                    {
                        return self.double_fault(addr);
                    }
                }
            }

            if mode == EntryMode::Continue && executed % POLL_INTERVAL == 0 && poll_interrupt() {
                debug!("client interrupt at pc={:#010x}", self.cpu.pc);
                let nmi = Trap::Exception {
                    offset: cpu::NMI,
                    pc: self.cpu.pc,
                };
                if let Err(addr) = self.cpu.take_exception(&mut self.bus, self.revision, nmi, 0) {
                    return self.double_fault(addr);
                }
            }
        }
    }

    /// Service a DOS call. Returns the exit status for the calls that end
    /// the process.
    fn dos_call(&mut self, call: u16) -> Option<u8> {
        match call {
            // _EXIT
            0xff00 => Some(0),
            // _EXIT2
            0xff4c => {
                let status = self.bus.read_u16(self.cpu.sp()).unwrap_or(0xff);
                Some(status as u8)
            }
            _ => {
                warn!("unimplemented DOS call {:#06x}", call);
                self.cpu.d[0] = 0;
                None
            }
        }
    }

    fn exit(&mut self, status: u8) -> Entry {
        debug!("program exited with status {}", status);
        self.exit_status = status;
        Entry::Exited
    }

    fn double_fault(&mut self, addr: u32) -> Entry {
        error!("double fault at {:#010x}", addr);
        self.halt()
    }

    fn halt(&mut self) -> Entry {
        self.exit(0xff)
    }
}

impl Host for Simulator {
    type Bus = SimBus;
    type Vectors = SimVectors;
    type Threads = Human68kThreads<SimBus>;

    fn cpu_revision(&self) -> CpuRevision {
        self.revision
    }

    fn bus(&mut self) -> &mut SimBus {
        &mut self.bus
    }

    fn vector_table(&mut self) -> SimVectors {
        let bus = &self.bus;
        self.vectors
            .take()
            .unwrap_or_else(|| SimVectors { bus: bus.clone() })
    }

    fn threads(&mut self) -> Option<&mut Human68kThreads<SimBus>> {
        self.threads.as_mut()
    }

    fn enter_target(
        &mut self,
        ctx: &mut TargetContext,
        mode: EntryMode,
        poll_interrupt: &mut dyn FnMut() -> bool,
    ) -> Entry {
        self.record_blocked();

        // what the host's switch routine does: push an rte frame, load the
        // registers, rte
        let frame = ReturnFrame::new(self.revision, ctx, mode);
        let ssp = ctx.ssp.wrapping_sub(frame.as_bytes().len() as u32);
        if let Err(e) = self.bus.load(ssp, frame.as_bytes()) {
            return self.double_fault(e.addr);
        }
        self.cpu = Cpu {
            d: ctx.d,
            a: [ctx.a[0], ctx.a[1], ctx.a[2], ctx.a[3], ctx.a[4], ctx.a[5], ctx.a[6]],
            usp: ctx.usp,
            ssp: ssp.wrapping_add(frame.as_bytes().len() as u32),
            sr: frame.sr(),
            pc: frame.pc(),
        };

        let entry = self.run(mode, poll_interrupt);

        ctx.d = self.cpu.d;
        ctx.a[..7].copy_from_slice(&self.cpu.a);
        ctx.usp = self.cpu.usp;
        ctx.ssp = self.cpu.ssp;
        entry
    }

    fn take_interrupt_request(&mut self) -> bool {
        core::mem::replace(&mut self.interrupt_pending, false)
    }

    fn exit_status(&mut self) -> u8 {
        self.exit_status
    }

    fn prepare_exit(&mut self, ctx: &mut TargetContext) -> Result<(), BusFault> {
        ctx.pc = self.bus.read_u32(work_area::EXIT_ENTRY)?;
        ctx.ssp = SUPERVISOR_STACK;
        ctx.sr = 0x2000;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use gdbserver68k::engine::{EngineState, Resumed};
    use gdbserver68k::common::Signal;

    fn engine(code: &[u8], revision: CpuRevision) -> DebugEngine<Simulator> {
        let mut sim = Simulator::new(revision);
        sim.load(LOAD_ADDR, code).unwrap();
        sim.into_engine(LOAD_ADDR, EngineConfig::default())
    }

    fn signal(res: Resumed) -> Signal {
        match res {
            Resumed::Stopped(stop) => stop.signal,
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn trampolines_route_traps_back() {
        for &revision in &[CpuRevision::Mc68000, CpuRevision::Mc68010] {
            // nop ; illegal
            let mut engine = engine(&[0x4e, 0x71, 0x4a, 0xfc], revision);
            let res = engine.resume(EntryMode::Continue, &mut || false).unwrap();
            assert_eq!(signal(res), Signal::SIGILL);
            assert_eq!(engine.context().pc, LOAD_ADDR + 2);
            assert_eq!(engine.context().ssp, SUPERVISOR_STACK);
        }
    }

    #[test]
    fn step_then_exit() {
        // moveq #7,d0 ; move.w #7,-(sp) ; _EXIT2
        let code = [0x70, 0x07, 0x3f, 0x3c, 0x00, 0x07, 0xff, 0x4c];
        let mut engine = engine(&code, CpuRevision::Mc68010);
        let res = engine.resume(EntryMode::Step, &mut || false).unwrap();
        assert_eq!(signal(res), Signal::SIGTRAP);
        assert_eq!(engine.context().pc, LOAD_ADDR + 2);
        assert_eq!(engine.context().d[0], 7);

        let res = engine.resume(EntryMode::Continue, &mut || false).unwrap();
        assert_eq!(res, Resumed::Exited(7));
        assert_eq!(engine.state(), EngineState::Terminated);
        // vectors are back to their boot values
        assert_eq!(engine.host().ram().read_u32(0x24).unwrap(), UNHANDLED);
    }

    #[test]
    fn interrupt_stops_a_busy_loop() {
        // bra.s *
        let mut engine = engine(&[0x60, 0xfe], CpuRevision::Mc68000);
        let mut polls = 0;
        let res = engine
            .resume(EntryMode::Continue, &mut || {
                polls += 1;
                polls == 3
            })
            .unwrap();
        assert_eq!(signal(res), Signal::SIGINT);
        assert_eq!(polls, 3);
        assert_eq!(engine.context().pc, LOAD_ADDR);
    }
}
