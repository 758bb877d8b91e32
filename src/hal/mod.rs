//! The boundary between the debug engine and the machine it runs on.
//!
//! The engine never touches hardware directly. Everything that needs raw
//! memory access, exception vectors, the context switch into the target or
//! knowledge of the host OS's thread tables goes through the traits here.
//! [`human68k`] implements them for real hardware.

use crate::arch::CpuRevision;
use crate::engine::TargetContext;

pub mod human68k;

/// Width of a single bus access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    /// 8 bits
    Byte,
    /// 16 bits
    Word,
    /// 32 bits
    Long,
}

impl Width {
    /// Size of the access in bytes.
    pub fn bytes(self) -> u32 {
        match self {
            Width::Byte => 1,
            Width::Word => 2,
            Width::Long => 4,
        }
    }
}

/// A bus or address error raised by an access the debugger made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusFault {
    /// Address of the failed access.
    pub addr: u32,
}

/// Raw access to the debugger's address space, with hardware access faults
/// turned into errors.
///
/// Implementations perform exactly one access of the requested width.
/// Callers never ask for a word or long access at an odd address.
pub trait Bus {
    /// Read `width` bytes at `addr`, zero-extended.
    fn read(&mut self, addr: u32, width: Width) -> Result<u32, BusFault>;

    /// Write the low `width` bytes of `value` at `addr`.
    fn write(&mut self, addr: u32, width: Width, value: u32) -> Result<(), BusFault>;
}

/// The CPU's exception vector table, plus somewhere to put the code the
/// vectors get pointed at.
pub trait VectorTable {
    /// Current contents of the vector at byte `offset` from the vector base.
    fn read_vector(&mut self, offset: u16) -> u32;

    /// Point the vector at byte `offset` at `handler`.
    fn write_vector(&mut self, offset: u16, handler: u32);

    /// Copy trampoline code into executable memory that stays valid for the
    /// whole session, returning its address.
    fn place_trampolines(&mut self, code: &[u8]) -> u32;

    /// Address of the common trap entry the trampolines jump to.
    fn trap_entry(&self) -> u32;

    /// Address of the entry used by the non-maskable interrupt trampoline.
    ///
    /// It must pass the interrupt through untouched when the target is not
    /// running, and otherwise behave exactly like [`trap_entry`](Self::trap_entry).
    fn interrupt_entry(&self) -> u32;

    /// Flush the instruction cache, if the CPU has one.
    fn flush_icache(&mut self);
}

/// Handle to one of the target process's cooperative threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadHandle(pub u16);

/// The scheduler-visible fields of a thread that the engine saves, forces
/// and restores around a resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedState {
    /// Non-zero while the thread sleeps.
    pub wait_flag: u8,
    /// Remaining time slice.
    pub counter: u8,
    /// Residual sleep time.
    pub wait_time: u32,
}

impl SchedState {
    /// `wait_flag` value for a thread that will not be scheduled.
    pub const WAITING: u8 = 0xff;

    /// This state, forced to "sleeping with no wake-up time".
    pub fn blocked(self) -> SchedState {
        SchedState {
            wait_flag: Self::WAITING,
            wait_time: 0,
            ..self
        }
    }

    /// This state, forced to "ready to run".
    pub fn runnable(self) -> SchedState {
        SchedState {
            wait_flag: 0,
            wait_time: 0,
            ..self
        }
    }
}

/// The host's table of cooperative threads belonging to the target process.
pub trait ThreadRegistry {
    /// Whether the target process currently has a thread facility active.
    /// Every other method may assume this returned `true`.
    fn is_active(&mut self) -> Result<bool, BusFault>;

    /// Report every thread of the target process, main thread included.
    fn list(&mut self, thread: &mut dyn FnMut(ThreadHandle)) -> Result<(), BusFault>;

    /// The thread that was running when the target trapped.
    fn current(&mut self) -> Result<ThreadHandle, BusFault>;

    /// The process's main thread.
    fn main_thread(&mut self) -> Result<ThreadHandle, BusFault>;

    /// Read a thread's scheduler state.
    fn sched_state(&mut self, thread: ThreadHandle) -> Result<SchedState, BusFault>;

    /// Overwrite a thread's scheduler state.
    fn set_sched_state(&mut self, thread: ThreadHandle, state: SchedState)
        -> Result<(), BusFault>;

    /// The registers the scheduler saved when it last switched `thread` out.
    fn saved_context(&mut self, thread: ThreadHandle) -> Result<TargetContext, BusFault>;

    /// Copy the thread's name into `buf`, returning its length.
    fn name(&mut self, thread: ThreadHandle, buf: &mut [u8]) -> Result<usize, BusFault>;
}

/// Registry for hosts whose targets never have sibling threads.
#[derive(Debug)]
pub enum NoThreads {}

impl ThreadRegistry for NoThreads {
    fn is_active(&mut self) -> Result<bool, BusFault> {
        match *self {}
    }

    fn list(&mut self, _thread: &mut dyn FnMut(ThreadHandle)) -> Result<(), BusFault> {
        match *self {}
    }

    fn current(&mut self) -> Result<ThreadHandle, BusFault> {
        match *self {}
    }

    fn main_thread(&mut self) -> Result<ThreadHandle, BusFault> {
        match *self {}
    }

    fn sched_state(&mut self, _thread: ThreadHandle) -> Result<SchedState, BusFault> {
        match *self {}
    }

    fn set_sched_state(&mut self, _: ThreadHandle, _: SchedState) -> Result<(), BusFault> {
        match *self {}
    }

    fn saved_context(&mut self, _thread: ThreadHandle) -> Result<TargetContext, BusFault> {
        match *self {}
    }

    fn name(&mut self, _thread: ThreadHandle, _buf: &mut [u8]) -> Result<usize, BusFault> {
        match *self {}
    }
}

/// How the target is entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryMode {
    /// Run until something traps.
    Continue,
    /// Run one instruction with the trace bit forced on.
    Step,
}

/// How control came back from the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entry {
    /// A hooked vector fired. Carries the vector offset the trampoline
    /// pushed.
    Trap(u16),
    /// The target process terminated.
    Exited,
}

/// Everything the engine needs from the machine and the host OS.
pub trait Host {
    /// Fault-safe memory access.
    type Bus: Bus;
    /// Vector table handle, owned by the engine for the whole session.
    type Vectors: VectorTable;
    /// Sibling thread table. Use [`NoThreads`] if the host has none.
    type Threads: ThreadRegistry;

    /// The CPU model.
    fn cpu_revision(&self) -> CpuRevision;

    /// Memory access in the debugger's address space.
    fn bus(&mut self) -> &mut Self::Bus;

    /// Hand over the vector table. Called once, when the engine is created.
    fn vector_table(&mut self) -> Self::Vectors;

    /// The target process's thread table, if the host has one.
    fn threads(&mut self) -> Option<&mut Self::Threads>;

    /// Switch into the target and block until it traps or exits.
    ///
    /// On entry `ctx.a[7]` already holds the live stack pointer. The host
    /// loads `ctx`, builds an exception-return frame on `ctx.ssp` (see
    /// [`ReturnFrame`](crate::engine::ReturnFrame)) and executes `rte`. On
    /// [`Entry::Trap`], `ctx` holds d0-d7, a0-a6 and `usp` as captured by the
    /// trap entry, and `ctx.ssp` points at the exception frame the CPU
    /// pushed. `ctx.sr` and `ctx.pc` are left for the engine to decode.
    ///
    /// `poll_interrupt` returns true once the client has asked for the
    /// target to be stopped. Hosts that cannot poll may ignore it and rely
    /// on the interrupt vector instead.
    fn enter_target(
        &mut self,
        ctx: &mut TargetContext,
        mode: EntryMode,
        poll_interrupt: &mut dyn FnMut() -> bool,
    ) -> Entry;

    /// Take (and clear) an interrupt request that arrived while the target
    /// was being single-stepped.
    fn take_interrupt_request(&mut self) -> bool;

    /// The exit status of a target that returned [`Entry::Exited`].
    fn exit_status(&mut self) -> u8;

    /// Point `ctx` at the host's process-exit routine, so that continuing
    /// the target terminates it.
    fn prepare_exit(&mut self, ctx: &mut TargetContext) -> Result<(), BusFault>;
}

#[cfg(test)]
pub(crate) mod mock {
    //! In-memory stand-ins for unit tests.

    use super::*;

    use alloc::rc::Rc;
    use alloc::vec;
    use alloc::vec::Vec;
    use core::cell::RefCell;

    /// A flat RAM starting at address 0; anything past the end faults.
    pub struct MockBus {
        pub mem: Vec<u8>,
        pub accesses: usize,
    }

    impl MockBus {
        pub fn new(size: usize) -> MockBus {
            MockBus {
                mem: vec![0; size],
                accesses: 0,
            }
        }

        pub fn load(&mut self, addr: u32, bytes: &[u8]) {
            let addr = addr as usize;
            self.mem[addr..addr + bytes.len()].copy_from_slice(bytes);
        }

        pub fn load_u16(&mut self, addr: u32, val: u16) {
            self.load(addr, &val.to_be_bytes())
        }

        pub fn load_u32(&mut self, addr: u32, val: u32) {
            self.load(addr, &val.to_be_bytes())
        }

        fn range(&self, addr: u32, width: Width) -> Result<core::ops::Range<usize>, BusFault> {
            let start = addr as usize;
            let end = start + width.bytes() as usize;
            if end > self.mem.len() {
                return Err(BusFault { addr });
            }
            Ok(start..end)
        }
    }

    impl Bus for MockBus {
        fn read(&mut self, addr: u32, width: Width) -> Result<u32, BusFault> {
            assert!(width == Width::Byte || addr % 2 == 0, "misaligned read");
            self.accesses += 1;
            let range = self.range(addr, width)?;
            Ok(self.mem[range]
                .iter()
                .fold(0u32, |acc, b| (acc << 8) | u32::from(*b)))
        }

        fn write(&mut self, addr: u32, width: Width, value: u32) -> Result<(), BusFault> {
            assert!(width == Width::Byte || addr % 2 == 0, "misaligned write");
            self.accesses += 1;
            let range = self.range(addr, width)?;
            let bytes = value.to_be_bytes();
            let n = width.bytes() as usize;
            self.mem[range].copy_from_slice(&bytes[4 - n..]);
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct MockVectorState {
        pub vectors: Vec<u32>,
        pub code: Vec<u8>,
        pub writes: usize,
        pub flushes: usize,
    }

    /// 64 vectors, each initially holding `0x1000 + offset`.
    pub struct MockVectors(Rc<RefCell<MockVectorState>>);

    impl MockVectors {
        pub const AREA: u32 = 0x0800;
        pub const TRAP_ENTRY: u32 = 0x00fe_0000;
        pub const NMI_ENTRY: u32 = 0x00fe_0010;

        pub fn new() -> MockVectors {
            let vectors = (0..64).map(|i| 0x1000 + i * 4).collect();
            MockVectors(Rc::new(RefCell::new(MockVectorState {
                vectors,
                ..Default::default()
            })))
        }

        pub fn state(&self) -> Rc<RefCell<MockVectorState>> {
            self.0.clone()
        }
    }

    impl VectorTable for MockVectors {
        fn read_vector(&mut self, offset: u16) -> u32 {
            self.0.borrow().vectors[offset as usize / 4]
        }

        fn write_vector(&mut self, offset: u16, handler: u32) {
            let mut s = self.0.borrow_mut();
            s.vectors[offset as usize / 4] = handler;
            s.writes += 1;
        }

        fn place_trampolines(&mut self, code: &[u8]) -> u32 {
            self.0.borrow_mut().code = code.to_vec();
            Self::AREA
        }

        fn trap_entry(&self) -> u32 {
            Self::TRAP_ENTRY
        }

        fn interrupt_entry(&self) -> u32 {
            Self::NMI_ENTRY
        }

        fn flush_icache(&mut self) {
            self.0.borrow_mut().flushes += 1;
        }
    }

    /// Threads `0..n`; thread 0 is the main thread.
    pub struct MockThreads {
        pub states: Vec<SchedState>,
        pub current: u16,
        pub active: bool,
        pub writes: usize,
        pub fail_on: Option<ThreadHandle>,
    }

    impl MockThreads {
        pub fn new(states: &[SchedState], current: u16) -> MockThreads {
            MockThreads {
                states: states.to_vec(),
                current,
                active: true,
                writes: 0,
                fail_on: None,
            }
        }

        fn check(&self, thread: ThreadHandle) -> Result<usize, BusFault> {
            let i = thread.0 as usize;
            if i >= self.states.len() || self.fail_on == Some(thread) {
                return Err(BusFault { addr: 0x1c50 });
            }
            Ok(i)
        }
    }

    impl ThreadRegistry for MockThreads {
        fn is_active(&mut self) -> Result<bool, BusFault> {
            Ok(self.active)
        }

        fn list(&mut self, thread: &mut dyn FnMut(ThreadHandle)) -> Result<(), BusFault> {
            for i in 0..self.states.len() {
                thread(ThreadHandle(i as u16));
            }
            Ok(())
        }

        fn current(&mut self) -> Result<ThreadHandle, BusFault> {
            Ok(ThreadHandle(self.current))
        }

        fn main_thread(&mut self) -> Result<ThreadHandle, BusFault> {
            Ok(ThreadHandle(0))
        }

        fn sched_state(&mut self, thread: ThreadHandle) -> Result<SchedState, BusFault> {
            let i = thread.0 as usize;
            self.states.get(i).copied().ok_or(BusFault { addr: 0x1c50 })
        }

        fn set_sched_state(
            &mut self,
            thread: ThreadHandle,
            state: SchedState,
        ) -> Result<(), BusFault> {
            let i = self.check(thread)?;
            self.states[i] = state;
            self.writes += 1;
            Ok(())
        }

        fn saved_context(&mut self, thread: ThreadHandle) -> Result<TargetContext, BusFault> {
            let i = self.check(thread)?;
            let mut ctx = TargetContext::default();
            ctx.d[0] = i as u32;
            ctx.pc = 0x7000 + i as u32 * 0x10;
            Ok(ctx)
        }

        fn name(&mut self, thread: ThreadHandle, buf: &mut [u8]) -> Result<usize, BusFault> {
            let i = self.check(thread)?;
            let name = alloc::format!("thread{}", i);
            let n = name.len().min(buf.len());
            buf[..n].copy_from_slice(&name.as_bytes()[..n]);
            Ok(n)
        }
    }
}
