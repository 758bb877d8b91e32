use core::arch::global_asm;
use core::cell::UnsafeCell;
use core::ptr;

use crate::arch::CpuRevision;
use crate::engine::{BusExt, ReturnFrame, TargetContext};
use crate::hal::{Bus, BusFault, Entry, EntryMode, Host, VectorTable, Width};

use super::{psp, work_area, AccessBuf, Human68kThreads};

global_asm!(
    r#"
    .bss
    .even
gdbserver68k_ctx:
    .space  4
gdbserver68k_host_sp:
    .space  4
gdbserver68k_in_target:
    .space  2

    .text
    .even

| int gdbserver68k_bus_rw(u32 addr, void *data, u32 size, u32 write)
| size: 0 = byte, 1 = word, 2 = long. Returns -1 on a bus or address error.
    .globl  gdbserver68k_bus_rw
gdbserver68k_bus_rw:
    movem.l %a2-%a5,-(%sp)
    movea.l 20(%sp),%a1
    movea.l 24(%sp),%a2
    move.l  28(%sp),%d1
    move.w  %sr,-(%sp)
    ori.w   #0x0700,%sr
    movea.l %sp,%a5
    movea.l 0x0008.w,%a4
    movea.l 0x000c.w,%a3
    move.l  #8f,0x0008.w
    move.l  #8f,0x000c.w
    tst.l   34(%sp)
    beq.s   1f
    exg     %a1,%a2
1:  tst.b   %d1
    bne.s   2f
    move.b  (%a1),(%a2)
    bra.s   7f
2:  cmpi.b  #1,%d1
    bne.s   3f
    move.w  (%a1),(%a2)
    bra.s   7f
3:  move.l  (%a1),(%a2)
7:  moveq   #0,%d0
    bra.s   9f
8:  moveq   #-1,%d0
    movea.l %a5,%sp
9:  move.l  %a4,0x0008.w
    move.l  %a3,0x000c.w
    move.w  (%sp)+,%sr
    movem.l (%sp)+,%a2-%a5
    rts

| int gdbserver68k_switch(TargetContext *ctx, const u8 *frame, u32 len)
| Returns the vector offset pushed by a trampoline, or -1 once the target
| has exited.
    .globl  gdbserver68k_switch
gdbserver68k_switch:
    movem.l %d2-%d7/%a2-%a6,-(%sp)
    move.l  %sp,gdbserver68k_host_sp
    movea.l 48(%sp),%a0
    movea.l 52(%sp),%a1
    move.l  56(%sp),%d0
    movea.l 72(%a0),%a2
    move.l  %a2,%usp
    movea.l 76(%a0),%sp
    suba.l  %d0,%sp
    movea.l %sp,%a2
    subq.l  #1,%d0
1:  move.b  (%a1)+,(%a2)+
    dbra    %d0,1b
    move.l  %a0,gdbserver68k_ctx
    st      gdbserver68k_in_target
    movem.l (%a0),%d0-%d7/%a0-%a6
    rte

    .globl  gdbserver68k_trap_entry
gdbserver68k_trap_entry:
    move.l  %a0,-(%sp)
    movea.l gdbserver68k_ctx,%a0
    movem.l %d0-%d7,(%a0)
    movem.l %a1-%a6,36(%a0)
    move.l  (%sp)+,32(%a0)
    sf      gdbserver68k_in_target
    moveq   #0,%d0
    move.w  (%sp)+,%d0
    move.l  %usp,%a1
    move.l  %a1,72(%a0)
    move.l  %sp,76(%a0)
    movea.l gdbserver68k_host_sp,%sp
    movem.l (%sp)+,%d2-%d7/%a2-%a6
    rts

    .globl  gdbserver68k_nmi_entry
gdbserver68k_nmi_entry:
    move.b  #0x0c,0xe8e007
    tst.b   gdbserver68k_in_target
    bne.s   1f
    addq.l  #2,%sp
    rte
1:  tst.b   0x0cbc.w
    beq.s   2f
    clr.w   -(%sp)
2:  pea     gdbserver68k_trap_entry
    move.w  #0x2000,-(%sp)
    rte

    .globl  gdbserver68k_exit_entry
gdbserver68k_exit_entry:
    sf      gdbserver68k_in_target
    movea.l gdbserver68k_host_sp,%sp
    movem.l (%sp)+,%d2-%d7/%a2-%a6
    moveq   #-1,%d0
    rts

| int gdbserver68k_exec(const char *name, const void *cmdline, const char *env, u32 regs[5])
    .globl  gdbserver68k_exec
gdbserver68k_exec:
    movem.l %d2-%d7/%a2-%a6,-(%sp)
    move.l  56(%sp),-(%sp)
    move.l  56(%sp),-(%sp)
    move.l  56(%sp),-(%sp)
    move.w  #1,-(%sp)
    .short  0xff4b
    lea     14(%sp),%sp
    movea.l 60(%sp),%a5
    movem.l %a0-%a4,(%a5)
    movem.l (%sp)+,%d2-%d7/%a2-%a6
    rts

    .globl  gdbserver68k_dos_breakck
gdbserver68k_dos_breakck:
    move.w  6(%sp),-(%sp)
    .short  0xff33
    addq.l  #2,%sp
    rts

    .globl  gdbserver68k_dos_getpdb
gdbserver68k_dos_getpdb:
    .short  0xff81
    rts

    .globl  gdbserver68k_dos_setpdb
gdbserver68k_dos_setpdb:
    move.l  4(%sp),-(%sp)
    .short  0xff80
    addq.l  #4,%sp
    rts

    .globl  gdbserver68k_dos_wait
gdbserver68k_dos_wait:
    .short  0xff4d
    rts

    .globl  gdbserver68k_b_super
gdbserver68k_b_super:
    movea.l 4(%sp),%a1
    moveq   #-127,%d0
    trap    #15
    rts

    .globl  gdbserver68k_icache_flush
gdbserver68k_icache_flush:
    moveq   #-84,%d0
    moveq   #3,%d1
    trap    #15
    rts
"#
);

extern "C" {
    fn gdbserver68k_bus_rw(addr: u32, data: *mut u8, size: u32, write: u32) -> i32;
    fn gdbserver68k_switch(ctx: *mut TargetContext, frame: *const u8, len: u32) -> i32;
    fn gdbserver68k_trap_entry();
    fn gdbserver68k_nmi_entry();
    fn gdbserver68k_exit_entry();
    fn gdbserver68k_exec(name: *const u8, cmdline: *const u8, env: *const u8, regs: *mut [u32; 5]) -> i32;
    fn gdbserver68k_dos_breakck(mode: i32) -> i32;
    fn gdbserver68k_dos_getpdb() -> u32;
    fn gdbserver68k_dos_setpdb(psp: u32) -> u32;
    fn gdbserver68k_dos_wait() -> i32;
    fn gdbserver68k_b_super(ssp: u32) -> i32;
    fn gdbserver68k_icache_flush();
}

/// Where ELF images are linked; `qOffsets` reports the distance from here.
const ELF_START_ADDR: u32 = 0x6800;

/// Interior-mutable storage that is only touched with interrupts masked or
/// from the single debugger thread.
#[repr(C, align(4))]
struct Area<const N: usize>(UnsafeCell<[u8; N]>);

// SAFETY: Human68k runs one debugger instance on one CPU.
unsafe impl<const N: usize> Sync for Area<N> {}

impl<const N: usize> Area<N> {
    const fn new() -> Self {
        Area(UnsafeCell::new([0; N]))
    }

    fn base(&self) -> u32 {
        self.0.get() as u32
    }

    fn top(&self) -> u32 {
        self.base() + N as u32
    }
}

static TRAMPOLINES: Area<128> = Area::new();
static TARGET_USP: Area<4096> = Area::new();
static TARGET_SSP: Area<4096> = Area::new();
/// Stack DOS runs the target's exit path on.
static EXIT_SSP: Area<1024> = Area::new();

/// [`Bus`] performing accesses with the bus and address error vectors
/// temporarily redirected, so a faulting access is reported rather than
/// taken. Requires supervisor mode.
#[derive(Debug, Clone, Copy)]
pub struct SupervisorBus(());

impl Bus for SupervisorBus {
    fn read(&mut self, addr: u32, width: Width) -> Result<u32, BusFault> {
        let mut data = AccessBuf::new(0);
        let (size, ptr) = data.slot(width);
        // SAFETY: faults are caught by the routine's private vectors
        let res = unsafe { gdbserver68k_bus_rw(addr, ptr, size, 0) };
        if res != 0 {
            return Err(BusFault { addr });
        }
        Ok(data.value())
    }

    fn write(&mut self, addr: u32, width: Width, value: u32) -> Result<(), BusFault> {
        let mut data = AccessBuf::new(value);
        let (size, ptr) = data.slot(width);
        // SAFETY: see `read`
        let res = unsafe { gdbserver68k_bus_rw(addr, ptr, size, 1) };
        if res != 0 {
            return Err(BusFault { addr });
        }
        Ok(())
    }
}

/// The exception vector table at address 0.
pub struct Human68kVectors {
    cpu: CpuRevision,
}

impl VectorTable for Human68kVectors {
    fn read_vector(&mut self, offset: u16) -> u32 {
        // SAFETY: the vector table is always mapped
        unsafe { ptr::read_volatile(u32::from(offset) as usize as *const u32) }
    }

    fn write_vector(&mut self, offset: u16, handler: u32) {
        // SAFETY: see `read_vector`
        unsafe { ptr::write_volatile(u32::from(offset) as usize as *mut u32, handler) }
    }

    fn place_trampolines(&mut self, code: &[u8]) -> u32 {
        let area = TRAMPOLINES.0.get() as *mut u8;
        let len = code.len().min(128);
        if len < code.len() {
            error!("trampoline area too small for {} bytes", code.len());
        }
        // SAFETY: the area is only written here, before any vector points at it
        unsafe { ptr::copy_nonoverlapping(code.as_ptr(), area, len) };
        TRAMPOLINES.base()
    }

    fn trap_entry(&self) -> u32 {
        gdbserver68k_trap_entry as usize as u32
    }

    fn interrupt_entry(&self) -> u32 {
        gdbserver68k_nmi_entry as usize as u32
    }

    fn flush_icache(&mut self) {
        if self.cpu.has_icache() {
            // SAFETY: IOCS _SYS_STAT only touches the cache control register
            unsafe { gdbserver68k_icache_flush() }
        }
    }
}

/// A freshly loaded target: the host, its initial registers, and the
/// offset of the load address from the ELF link address.
pub struct LoadedTarget {
    /// The host backend.
    pub host: Human68k,
    /// Registers to start the target with.
    pub context: TargetContext,
    /// Value to report through `qOffsets`.
    pub load_offset: u32,
}

/// [`Host`] for Human68k running on the bare CPU.
pub struct Human68k {
    cpu: CpuRevision,
    bus: SupervisorBus,
    threads: Human68kThreads<SupervisorBus>,
    vectors_taken: bool,
    host_psp: u32,
    target_psp: u32,
    breakck: i32,
}

impl Human68k {
    /// Switch the debugger into supervisor mode.
    ///
    /// # Safety
    ///
    /// Must be called before any other function in this module, and only
    /// once.
    pub unsafe fn enter_supervisor() {
        gdbserver68k_b_super(0);
    }

    /// Load (but do not start) the program at `path` with DOS `_EXEC`.
    ///
    /// `path` and `env` must be NUL terminated; `cmdline` is a Human68k
    /// command line (length byte followed by the text). Returns the DOS
    /// error code on failure.
    ///
    /// # Safety
    ///
    /// The CPU must be in supervisor mode, and only one target may be loaded
    /// per process.
    pub unsafe fn load(path: &[u8], cmdline: &[u8], env: &[u8]) -> Result<LoadedTarget, i32> {
        let breakck = gdbserver68k_dos_breakck(-1);
        gdbserver68k_dos_breakck(2);
        let host_psp = gdbserver68k_dos_getpdb();

        let mut regs = [0u32; 5];
        let res = gdbserver68k_exec(path.as_ptr(), cmdline.as_ptr(), env.as_ptr(), &mut regs);
        if res < 0 {
            gdbserver68k_dos_breakck(breakck);
            return Err(res);
        }

        let mut bus = SupervisorBus(());
        let fault = |_| -1;

        let mut context = TargetContext::default();
        context.a[..5].copy_from_slice(&regs);
        context.pc = regs[4];
        context.usp = TARGET_USP.top();
        context.ssp = TARGET_SSP.top();

        let target_psp = regs[0] + 0x10;
        let exit = gdbserver68k_exit_entry as usize as u32;
        bus.write_u32(target_psp + psp::EXIT, exit).map_err(fault)?;
        bus.write_u32(target_psp + psp::CTRLC, exit).map_err(fault)?;
        bus.write_u32(target_psp + psp::ERREXIT, exit).map_err(fault)?;
        bus.write_u32(target_psp + psp::SSP, EXIT_SSP.top()).map_err(fault)?;
        let sr = bus.read_u16(target_psp + psp::SR).map_err(fault)?;
        bus.write_u16(target_psp + psp::ABORT_SR, sr).map_err(fault)?;

        gdbserver68k_dos_setpdb(target_psp);

        let mpu = bus.read_u8(work_area::MPU_TYPE).map_err(fault)?;
        let cpu = CpuRevision::from_u8(mpu).unwrap_or_else(|| {
            warn!("unknown MPU type {}, assuming 68030", mpu);
            CpuRevision::Mc68030
        });
        info!(
            "target psp:{:#x} usp:{:#x} ssp:{:#x} cpu:{:?}",
            target_psp, context.usp, context.ssp, cpu
        );

        Ok(LoadedTarget {
            host: Human68k {
                cpu,
                bus,
                threads: Human68kThreads::new(bus),
                vectors_taken: false,
                host_psp,
                target_psp,
                breakck,
            },
            context,
            load_offset: (regs[0] + 0x100).wrapping_sub(ELF_START_ADDR),
        })
    }
}

impl Host for Human68k {
    type Bus = SupervisorBus;
    type Vectors = Human68kVectors;
    type Threads = Human68kThreads<SupervisorBus>;

    fn cpu_revision(&self) -> CpuRevision {
        self.cpu
    }

    fn bus(&mut self) -> &mut SupervisorBus {
        &mut self.bus
    }

    fn vector_table(&mut self) -> Human68kVectors {
        if self.vectors_taken {
            warn!("vector table handed out twice");
        }
        self.vectors_taken = true;
        Human68kVectors { cpu: self.cpu }
    }

    fn threads(&mut self) -> Option<&mut Self::Threads> {
        Some(&mut self.threads)
    }

    fn enter_target(
        &mut self,
        ctx: &mut TargetContext,
        mode: EntryMode,
        _poll_interrupt: &mut dyn FnMut() -> bool,
    ) -> Entry {
        // interrupts reach the target through the NMI switch, not by polling
        let frame = ReturnFrame::new(self.cpu, ctx, mode);
        let bytes = frame.as_bytes();
        // SAFETY: `ctx` stays borrowed until the trap entry has written it
        // back, and the return frame lands on the target's own stack.
        let res = unsafe {
            gdbserver68k_dos_breakck(self.breakck);
            let res = gdbserver68k_switch(ctx, bytes.as_ptr(), bytes.len() as u32);
            gdbserver68k_dos_breakck(2);
            res
        };
        if res < 0 {
            Entry::Exited
        } else {
            Entry::Trap(res as u16)
        }
    }

    fn take_interrupt_request(&mut self) -> bool {
        false
    }

    fn exit_status(&mut self) -> u8 {
        // SAFETY: the target has exited, so its process can be reaped and
        // the debugger becomes the current process again
        unsafe {
            let status = gdbserver68k_dos_wait();
            // an exit from CTRL+C inside a DOS call runs in user mode
            gdbserver68k_b_super(0);
            gdbserver68k_dos_setpdb(self.host_psp);
            gdbserver68k_dos_breakck(self.breakck);
            status as u8
        }
    }

    fn prepare_exit(&mut self, ctx: &mut TargetContext) -> Result<(), BusFault> {
        ctx.pc = self.bus.read_u32(work_area::EXIT_ENTRY)?;
        ctx.ssp = self.bus.read_u32(self.target_psp + psp::SSP)?;
        ctx.sr = 0x2000;
        Ok(())
    }
}
