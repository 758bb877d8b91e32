use crate::common::Signal;
use crate::hal::VectorTable;

/// The exception classes the engine diverts while the target runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorClass {
    /// Bus error
    BusError,
    /// Address error
    AddressError,
    /// Illegal instruction
    IllegalInstruction,
    /// Integer divide by zero
    ZeroDivide,
    /// `CHK` / `CHK2` out of bounds
    Chk,
    /// `TRAPV` with overflow set
    Trapv,
    /// Privilege violation
    PrivilegeViolation,
    /// Trace (single step)
    Trace,
    /// Level 7 autovector (the NMI switch)
    Nmi,
    /// `TRAP #9`, the breakpoint instruction
    Breakpoint,
}

impl VectorClass {
    /// Every class, in installation order.
    pub const ALL: [VectorClass; 10] = [
        VectorClass::BusError,
        VectorClass::AddressError,
        VectorClass::IllegalInstruction,
        VectorClass::ZeroDivide,
        VectorClass::Chk,
        VectorClass::Trapv,
        VectorClass::PrivilegeViolation,
        VectorClass::Trace,
        VectorClass::Nmi,
        VectorClass::Breakpoint,
    ];

    /// Byte offset of the vector from the vector base.
    pub fn offset(self) -> u16 {
        match self {
            VectorClass::BusError => 0x08,
            VectorClass::AddressError => 0x0c,
            VectorClass::IllegalInstruction => 0x10,
            VectorClass::ZeroDivide => 0x14,
            VectorClass::Chk => 0x18,
            VectorClass::Trapv => 0x1c,
            VectorClass::PrivilegeViolation => 0x20,
            VectorClass::Trace => 0x24,
            VectorClass::Nmi => 0x7c,
            VectorClass::Breakpoint => 0xa4,
        }
    }

    /// The class hooked at vector `offset`, if any.
    pub fn from_offset(offset: u16) -> Option<VectorClass> {
        VectorClass::ALL.iter().copied().find(|c| c.offset() == offset)
    }

    /// The signal a stop of this class is reported as.
    pub fn signal(self) -> Signal {
        match self {
            VectorClass::BusError | VectorClass::AddressError => Signal::SIGBUS,
            VectorClass::IllegalInstruction => Signal::SIGILL,
            VectorClass::ZeroDivide | VectorClass::Chk | VectorClass::Trapv => Signal::SIGFPE,
            VectorClass::PrivilegeViolation => Signal::SIGSEGV,
            VectorClass::Trace | VectorClass::Breakpoint => Signal::SIGTRAP,
            VectorClass::Nmi => Signal::SIGINT,
        }
    }

    /// Bus and address errors, whose frames describe the failed access.
    pub fn is_access_fault(self) -> bool {
        matches!(self, VectorClass::BusError | VectorClass::AddressError)
    }
}

/// `move.w #code,-(sp); jmp entry`: tags the exception with its vector
/// offset and enters the debugger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trampoline {
    /// Value pushed for the trap entry to find.
    pub code: u16,
    /// Where to jump.
    pub entry: u32,
}

impl Trampoline {
    /// Encoded size in bytes.
    pub const LEN: usize = 10;

    const MOVE_W_IMM_PREDEC_SP: u16 = 0x3f3c;
    const JMP_ABS_L: u16 = 0x4ef9;

    /// Machine code for this trampoline.
    pub fn encode(&self) -> [u8; Trampoline::LEN] {
        let mut out = [0; Trampoline::LEN];
        out[0..2].copy_from_slice(&Self::MOVE_W_IMM_PREDEC_SP.to_be_bytes());
        out[2..4].copy_from_slice(&self.code.to_be_bytes());
        out[4..6].copy_from_slice(&Self::JMP_ABS_L.to_be_bytes());
        out[6..10].copy_from_slice(&self.entry.to_be_bytes());
        out
    }
}

/// The debugger's hooks, installed in a [`VectorTable`].
///
/// The original vectors are put back exactly once: by [`restore`] or, failing
/// that, when the guard is dropped.
///
/// [`restore`]: VectorGuard::restore
pub struct VectorGuard<V: VectorTable> {
    table: V,
    saved: [u32; 10],
    installed: bool,
}

impl<V: VectorTable> VectorGuard<V> {
    /// Point every [`VectorClass`] at a trampoline into `table`'s entries.
    pub fn install(mut table: V) -> VectorGuard<V> {
        let trap = table.trap_entry();
        let nmi = table.interrupt_entry();

        let mut code = [0; Trampoline::LEN * 10];
        for (class, out) in VectorClass::ALL
            .iter()
            .zip(code.chunks_exact_mut(Trampoline::LEN))
        {
            let entry = match class {
                VectorClass::Nmi => nmi,
                _ => trap,
            };
            out.copy_from_slice(
                &Trampoline {
                    code: class.offset(),
                    entry,
                }
                .encode(),
            );
        }
        let base = table.place_trampolines(&code);

        let mut saved = [0; 10];
        for (i, class) in VectorClass::ALL.iter().enumerate() {
            saved[i] = table.read_vector(class.offset());
            let stub = base + (i * Trampoline::LEN) as u32;
            table.write_vector(class.offset(), stub);
            trace!("vector {:#04x}: {:#010x} -> {:#010x}", class.offset(), saved[i], stub);
        }
        table.flush_icache();

        debug!("exception vectors installed, trampolines at {:#010x}", base);
        VectorGuard {
            table,
            saved,
            installed: true,
        }
    }

    /// The vector table the hooks live in.
    pub fn table(&mut self) -> &mut V {
        &mut self.table
    }

    /// What `class`'s vector held before the hooks were installed.
    pub fn original(&self, class: VectorClass) -> u32 {
        let i = VectorClass::ALL
            .iter()
            .position(|c| *c == class)
            .unwrap_or_default();
        self.saved[i]
    }

    /// Put the original vectors back.
    pub fn restore(mut self) {
        self.restore_inner();
    }

    fn restore_inner(&mut self) {
        if !self.installed {
            return;
        }
        for (class, old) in VectorClass::ALL.iter().zip(self.saved.iter()) {
            self.table.write_vector(class.offset(), *old);
        }
        self.table.flush_icache();
        self.installed = false;
        debug!("exception vectors restored");
    }
}

impl<V: VectorTable> Drop for VectorGuard<V> {
    fn drop(&mut self) {
        self.restore_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::mock::MockVectors;

    #[test]
    fn classes_round_trip_offsets() {
        for class in VectorClass::ALL.iter() {
            assert_eq!(VectorClass::from_offset(class.offset()), Some(*class));
        }
        assert_eq!(VectorClass::from_offset(0x80), None);
    }

    #[test]
    fn signals() {
        assert_eq!(VectorClass::IllegalInstruction.signal(), Signal::SIGILL);
        assert_eq!(VectorClass::ZeroDivide.signal(), Signal::SIGFPE);
        assert_eq!(VectorClass::PrivilegeViolation.signal(), Signal::SIGSEGV);
        assert_eq!(VectorClass::Nmi.signal(), Signal::SIGINT);
        assert_eq!(VectorClass::Breakpoint.signal(), Signal::SIGTRAP);
        assert_eq!(VectorClass::AddressError.signal(), Signal::SIGBUS);
    }

    #[test]
    fn trampoline_encoding() {
        let t = Trampoline {
            code: 0xa4,
            entry: 0x00fe_0000,
        };
        assert_eq!(
            t.encode(),
            [0x3f, 0x3c, 0x00, 0xa4, 0x4e, 0xf9, 0x00, 0xfe, 0x00, 0x00]
        );
    }

    #[test]
    fn install_and_restore_on_drop() {
        let vectors = MockVectors::new();
        let state = vectors.state();
        {
            let guard = VectorGuard::install(vectors);
            let s = state.borrow();
            assert_eq!(s.flushes, 1);
            for (i, class) in VectorClass::ALL.iter().enumerate() {
                let stub = s.vectors[class.offset() as usize / 4];
                assert_eq!(stub, MockVectors::AREA + (i * Trampoline::LEN) as u32);
                assert_eq!(guard.original(*class), 0x1000 + u32::from(class.offset()));
            }
            let nmi = &s.code[8 * Trampoline::LEN..9 * Trampoline::LEN];
            assert_eq!(&nmi[6..], &MockVectors::NMI_ENTRY.to_be_bytes());
            let bp = &s.code[9 * Trampoline::LEN..];
            assert_eq!(&bp[6..], &MockVectors::TRAP_ENTRY.to_be_bytes());
        }
        let s = state.borrow();
        for class in VectorClass::ALL.iter() {
            assert_eq!(
                s.vectors[class.offset() as usize / 4],
                0x1000 + u32::from(class.offset())
            );
        }
        assert_eq!(s.writes, 20);
        assert_eq!(s.flushes, 2);
    }

    #[test]
    fn explicit_restore_runs_once() {
        let vectors = MockVectors::new();
        let state = vectors.state();
        let guard = VectorGuard::install(vectors);
        guard.restore();
        assert_eq!(state.borrow().writes, 20);
    }
}
