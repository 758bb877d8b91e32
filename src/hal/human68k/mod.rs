//! Human68k on X68000-family hardware.
//!
//! [`Human68kThreads`] only needs a [`Bus`](crate::hal::Bus) and is usable
//! (and tested) anywhere. The rest of the backend executes 68k code and is
//! only built for `target_arch = "m68k"`.

mod threads;

pub use self::threads::Human68kThreads;

use crate::hal::Width;

cfg_if::cfg_if! {
    if #[cfg(target_arch = "m68k")] {
        mod machine;
        pub use self::machine::{Human68k, Human68kVectors, LoadedTarget, SupervisorBus};
    }
}

/// Fixed addresses in the Human68k system work area.
pub mod work_area {
    /// Long word holding the entry point of DOS `_EXIT`.
    pub const EXIT_ENTRY: u32 = 0x1800;
    /// Byte holding the MPU type (0 = 68000, 1 = 68010, ...).
    pub const MPU_TYPE: u32 = 0x0cbc;
    /// Pointer to the first process control block.
    pub const PRC_TABLE: u32 = 0x1c50;
    /// Pointer to the running thread's process control block.
    pub const PRC_CURRENT: u32 = 0x1c54;
    /// Word holding the number of process table slots, minus one.
    pub const PRC_COUNT: u32 = 0x1c58;
    /// Stride of the process table (not `sizeof(struct dos_prcptr)`).
    pub const PRC_SIZE: u32 = 0x7c;
}

/// Byte offsets into a process descriptor (PSP).
pub mod psp {
    /// Address DOS jumps to when the process exits.
    pub const EXIT: u32 = 0x04;
    /// Address DOS jumps to on CTRL+C.
    pub const CTRLC: u32 = 0x08;
    /// Address DOS jumps to on a fatal error.
    pub const ERREXIT: u32 = 0x0c;
    /// Supervisor stack used while the process exits.
    pub const SSP: u32 = 0x30;
    /// Status register at process start.
    pub const SR: u32 = 0x34;
    /// Status register restored on abort.
    pub const ABORT_SR: u32 = 0x36;
}

/// Byte offsets into a process control block (`struct dos_prcptr`).
pub mod prc {
    /// Byte, non-zero while the thread sleeps.
    pub const WAIT_FLAG: u32 = 0x04;
    /// Byte, remaining time slice.
    pub const COUNTER: u32 = 0x05;
    /// Saved user stack pointer.
    pub const USP: u32 = 0x0c;
    /// Saved d0-d7.
    pub const D: u32 = 0x10;
    /// Saved a0-a6.
    pub const A: u32 = 0x30;
    /// Saved status register (word).
    pub const SR: u32 = 0x4c;
    /// Saved program counter.
    pub const PC: u32 = 0x4e;
    /// Saved supervisor stack pointer.
    pub const SSP: u32 = 0x52;
    /// Communication buffer pointer.
    pub const BUF_PTR: u32 = 0x5c;
    /// NUL-padded thread name.
    pub const NAME: u32 = 0x60;
    /// Length of [`NAME`].
    pub const NAME_LEN: usize = 16;
    /// Residual sleep time.
    pub const WAIT_TIME: u32 = 0x70;
}

/// Byte offsets into the libpthread block a thread's communication buffer
/// points at.
pub mod pth {
    /// `'Pth1'`
    pub const MAGIC: u32 = 0x5074_6831;
    /// Where [`MAGIC`] lives.
    pub const MAGIC_OFF: u32 = 12;
    /// The thread's process table slot.
    pub const TID: u32 = 16;
    /// Pointer to the main thread's block.
    pub const MAIN: u32 = 24;
    /// Pointer to the next thread's block, 0 at the end.
    pub const NEXT: u32 = 28;
}

/// Staging buffer for one access by the bus access routine, which moves
/// words and longs through it. A 68000 raises an address error on a word
/// or long access at an odd address, so it is kept long aligned.
#[cfg_attr(not(target_arch = "m68k"), allow(dead_code))]
#[repr(C, align(4))]
pub(crate) struct AccessBuf([u8; 4]);

#[cfg_attr(not(target_arch = "m68k"), allow(dead_code))]
impl AccessBuf {
    pub(crate) fn new(value: u32) -> AccessBuf {
        AccessBuf(value.to_be_bytes())
    }

    /// The routine's size code for `width`, and the first byte an access of
    /// that width moves (the low bytes of the big-endian value).
    pub(crate) fn slot(&mut self, width: Width) -> (u32, *mut u8) {
        let (size, off) = match width {
            Width::Byte => (0, 3),
            Width::Word => (1, 2),
            Width::Long => (2, 0),
        };
        (size, self.0[off..].as_mut_ptr())
    }

    pub(crate) fn value(&self) -> u32 {
        u32::from_be_bytes(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_buf_slots_are_aligned() {
        let mut buf = AccessBuf::new(0x1122_3344);
        let (size, long) = buf.slot(Width::Long);
        assert_eq!(size, 2);
        assert_eq!(long as usize % 4, 0);
        let (size, word) = buf.slot(Width::Word);
        assert_eq!(size, 1);
        assert_eq!(word as usize % 2, 0);
        assert_eq!(word as usize - long as usize, 2);
        let (size, byte) = buf.slot(Width::Byte);
        assert_eq!(size, 0);
        // SAFETY: the pointer is into `buf`, which is still alive
        assert_eq!(unsafe { *byte }, 0x44);
        assert_eq!(buf.value(), 0x1122_3344);
    }
}
