use crate::arch::{CpuRevision, M68kCoreRegs, StatusRegister};
use crate::hal::EntryMode;

/// The target's complete register state while it is stopped.
///
/// `a[7]` is whichever of `usp`/`ssp` the supervisor bit of `sr` selects;
/// the other one is only held in its own field. The layout is shared with
/// the hardware context switch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct TargetContext {
    /// Data registers.
    pub d: [u32; 8],
    /// Address registers. `a[7]` is the live stack pointer.
    pub a: [u32; 8],
    /// Status register (only the low 16 bits are meaningful).
    pub sr: u32,
    /// Program counter.
    pub pc: u32,
    /// User stack pointer.
    pub usp: u32,
    /// Supervisor stack pointer.
    pub ssp: u32,
}

impl TargetContext {
    /// Whether the target is in supervisor mode.
    pub fn is_supervisor(&self) -> bool {
        StatusRegister::from_raw(self.sr).contains(StatusRegister::SUPERVISOR)
    }

    /// Copy the live stack pointer into `a[7]`.
    pub fn update_sp(&mut self) {
        self.a[7] = if self.is_supervisor() {
            self.ssp
        } else {
            self.usp
        };
    }

    /// Copy `a[7]` back into the stack pointer field `sr` selects.
    pub fn retrieve_sp(&mut self) {
        if self.is_supervisor() {
            self.ssp = self.a[7];
        } else {
            self.usp = self.a[7];
        }
    }

    /// The registers GDB sees, with `a7` projected from the live stack.
    pub fn core_regs(&self) -> M68kCoreRegs {
        let mut ctx = *self;
        ctx.update_sp();
        M68kCoreRegs {
            d: ctx.d,
            a: ctx.a,
            sr: ctx.sr,
            pc: ctx.pc,
        }
    }

    /// Overwrite the GDB-visible registers. `a7` lands in the stack pointer
    /// selected by the *new* `sr`.
    pub fn set_core_regs(&mut self, regs: &M68kCoreRegs) {
        self.d = regs.d;
        self.a = regs.a;
        self.sr = regs.sr;
        self.pc = regs.pc;
        self.retrieve_sp();
    }
}

/// The exception-return frame a host pushes on the target's supervisor
/// stack before executing `rte`.
///
/// In memory order: `sr` (word), `pc` (long), and on CPUs past the 68000 a
/// zero format/vector word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReturnFrame {
    bytes: [u8; 8],
    len: usize,
}

impl ReturnFrame {
    /// Build the frame that resumes `ctx` in the given mode. A step forces
    /// the trace bit on.
    pub fn new(cpu: CpuRevision, ctx: &TargetContext, mode: EntryMode) -> ReturnFrame {
        let mut sr = StatusRegister::from_raw(ctx.sr);
        if mode == EntryMode::Step {
            sr |= StatusRegister::TRACE;
        }

        let mut bytes = [0; 8];
        bytes[0..2].copy_from_slice(&sr.bits().to_be_bytes());
        bytes[2..6].copy_from_slice(&ctx.pc.to_be_bytes());
        let len = if cpu.has_format_word() { 8 } else { 6 };

        ReturnFrame { bytes, len }
    }

    /// The frame's bytes, lowest address first.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// The status register `rte` will load.
    pub fn sr(&self) -> u16 {
        u16::from_be_bytes([self.bytes[0], self.bytes[1]])
    }

    /// The program counter `rte` will load.
    pub fn pc(&self) -> u32 {
        u32::from_be_bytes([self.bytes[2], self.bytes[3], self.bytes[4], self.bytes[5]])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(sr: u32) -> TargetContext {
        TargetContext {
            sr,
            usp: 0x1000,
            ssp: 0x2000,
            pc: 0x6800,
            ..Default::default()
        }
    }

    #[test]
    fn update_sp_follows_supervisor_bit() {
        let mut user = ctx(0x0000);
        user.update_sp();
        assert_eq!(user.a[7], 0x1000);

        let mut sup = ctx(0x2000);
        sup.update_sp();
        assert_eq!(sup.a[7], 0x2000);
    }

    #[test]
    fn set_core_regs_retrieves_sp() {
        let mut c = ctx(0x0000);
        let mut regs = c.core_regs();
        assert_eq!(regs.a[7], 0x1000);

        regs.a[7] = 0x1ff0;
        c.set_core_regs(&regs);
        assert_eq!(c.usp, 0x1ff0);
        assert_eq!(c.ssp, 0x2000);

        // switching to supervisor mode in the same write moves a7 to ssp
        regs.sr = 0x2700;
        regs.a[7] = 0x2ff0;
        c.set_core_regs(&regs);
        assert_eq!(c.usp, 0x1ff0);
        assert_eq!(c.ssp, 0x2ff0);
        assert_eq!(c.core_regs(), regs);
    }

    #[test]
    fn return_frame_layout() {
        let c = ctx(0x2004);
        let frame = ReturnFrame::new(CpuRevision::Mc68000, &c, EntryMode::Continue);
        assert_eq!(frame.as_bytes(), &[0x20, 0x04, 0x00, 0x00, 0x68, 0x00]);

        let frame = ReturnFrame::new(CpuRevision::Mc68030, &c, EntryMode::Step);
        assert_eq!(
            frame.as_bytes(),
            &[0xa0, 0x04, 0x00, 0x00, 0x68, 0x00, 0x00, 0x00]
        );
        assert_eq!(frame.sr(), 0xa004);
        assert_eq!(frame.pc(), 0x6800);
    }
}
