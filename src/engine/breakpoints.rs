use crate::arch::BREAKPOINT_INSTRUCTION;
use crate::hal::{Bus, BusFault};

use super::BusExt;

/// Maximum number of software breakpoints.
pub const BREAKPOINT_CAPACITY: usize = 64;

const PATCH_LEN: usize = BREAKPOINT_INSTRUCTION.len();

/// Why a breakpoint could not be set or removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakpointError {
    /// Every slot is in use.
    TableFull,
    /// No breakpoint at that address.
    NotFound,
    /// The patch would overlap a breakpoint at a different address.
    Overlap,
    /// The requested kind is shorter than the trap instruction.
    UnsupportedKind,
    /// The code could not be read or patched.
    Fault(BusFault),
}

impl From<BusFault> for BreakpointError {
    fn from(e: BusFault) -> Self {
        BreakpointError::Fault(e)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Breakpoint {
    addr: u32,
    original: [u8; PATCH_LEN],
}

impl Breakpoint {
    /// Offset into `[start, start + len)` of each patched byte in that range,
    /// paired with the byte's index in the patch.
    fn overlap(&self, start: u32, len: usize) -> impl Iterator<Item = (usize, usize)> {
        let bp = u64::from(self.addr);
        let start = u64::from(start);
        let end = start + len as u64;
        (0..PATCH_LEN).filter_map(move |i| {
            let a = bp + i as u64;
            if a >= start && a < end {
                Some(((a - start) as usize, i))
            } else {
                None
            }
        })
    }
}

/// Fixed-capacity table of software breakpoints.
///
/// A breakpoint replaces the instruction word at its address with `TRAP #9`
/// and remembers the bytes it displaced. Patches never overlap.
#[derive(Debug)]
pub struct BreakpointTable {
    slots: [Option<Breakpoint>; BREAKPOINT_CAPACITY],
}

impl Default for BreakpointTable {
    fn default() -> Self {
        BreakpointTable::new()
    }
}

impl BreakpointTable {
    /// An empty table.
    pub fn new() -> BreakpointTable {
        BreakpointTable {
            slots: [None; BREAKPOINT_CAPACITY],
        }
    }

    /// Number of active breakpoints.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Whether no breakpoints are set.
    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// Whether a breakpoint is set at exactly `addr`.
    pub fn contains(&self, addr: u32) -> bool {
        self.iter().any(|bp| bp.addr == addr)
    }

    fn iter(&self) -> impl Iterator<Item = &Breakpoint> {
        self.slots.iter().filter_map(|s| s.as_ref())
    }

    /// Patch a breakpoint in at `addr`. `kind` is the client's idea of the
    /// instruction length. Setting an existing breakpoint again succeeds
    /// without touching memory.
    pub fn set<B: Bus + ?Sized>(
        &mut self,
        bus: &mut B,
        addr: u32,
        kind: usize,
    ) -> Result<(), BreakpointError> {
        if kind < PATCH_LEN {
            return Err(BreakpointError::UnsupportedKind);
        }
        if self.contains(addr) {
            return Ok(());
        }
        if self.iter().any(|bp| bp.overlap(addr, PATCH_LEN).next().is_some()) {
            return Err(BreakpointError::Overlap);
        }

        let slot = self
            .slots
            .iter_mut()
            .find(|s| s.is_none())
            .ok_or(BreakpointError::TableFull)?;

        let mut original = [0; PATCH_LEN];
        bus.read_bytes(addr, &mut original)?;
        bus.write_bytes(addr, &BREAKPOINT_INSTRUCTION)?;
        *slot = Some(Breakpoint { addr, original });

        debug!("breakpoint set at {:#010x} (was {:02x?})", addr, original);
        Ok(())
    }

    /// Restore the original bytes at `addr` and free the slot.
    pub fn remove<B: Bus + ?Sized>(
        &mut self,
        bus: &mut B,
        addr: u32,
        kind: usize,
    ) -> Result<(), BreakpointError> {
        if kind < PATCH_LEN {
            return Err(BreakpointError::UnsupportedKind);
        }
        let slot = self
            .slots
            .iter_mut()
            .find(|s| matches!(s, Some(bp) if bp.addr == addr))
            .ok_or(BreakpointError::NotFound)?;

        if let Some(bp) = slot {
            bus.write_bytes(bp.addr, &bp.original)?;
        }
        *slot = None;

        debug!("breakpoint removed at {:#010x}", addr);
        Ok(())
    }

    /// Overlay the displaced original bytes onto `buf`, which holds memory
    /// read from `addr`, so readers never see a trap instruction.
    pub fn unshadow(&self, addr: u32, buf: &mut [u8]) {
        // reversed so that the earliest slot wins any (impossible) overlap
        for bp in self.slots.iter().rev().filter_map(|s| s.as_ref()) {
            for (off, i) in bp.overlap(addr, buf.len()) {
                buf[off] = bp.original[i];
            }
        }
    }

    /// Fix up breakpoints after `data` was written to `addr`: the written
    /// bytes become the new originals and the trap is patched back in.
    pub fn reshadow<B: Bus + ?Sized>(
        &mut self,
        bus: &mut B,
        addr: u32,
        data: &[u8],
    ) -> Result<(), BusFault> {
        for bp in self.slots.iter_mut().filter_map(|s| s.as_mut()) {
            let mut touched = false;
            for (off, i) in bp.overlap(addr, data.len()) {
                bp.original[i] = data[off];
                touched = true;
            }
            if touched {
                bus.write_bytes(bp.addr, &BREAKPOINT_INSTRUCTION)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::mock::MockBus;

    fn bus() -> MockBus {
        let mut bus = MockBus::new(0x1000);
        for (i, b) in bus.mem.iter_mut().enumerate() {
            *b = i as u8;
        }
        bus
    }

    #[test]
    fn set_hides_trap_from_reads() {
        let mut bus = bus();
        let mut table = BreakpointTable::new();

        let mut before = [0; 8];
        bus.read_bytes(0x100, &mut before).unwrap();

        table.set(&mut bus, 0x104, 2).unwrap();
        assert_eq!(&bus.mem[0x104..0x106], &BREAKPOINT_INSTRUCTION);

        let mut buf = [0; 8];
        bus.read_bytes(0x100, &mut buf).unwrap();
        table.unshadow(0x100, &mut buf);
        assert_eq!(buf, before);

        table.remove(&mut bus, 0x104, 2).unwrap();
        let mut after = [0; 8];
        bus.read_bytes(0x100, &mut after).unwrap();
        assert_eq!(after, before);
        assert!(table.is_empty());
    }

    #[test]
    fn unshadow_partial_overlap() {
        let mut bus = bus();
        let mut table = BreakpointTable::new();
        table.set(&mut bus, 0x200, 2).unwrap();

        // read window starts in the middle of the patch
        let mut buf = [0; 3];
        bus.read_bytes(0x201, &mut buf).unwrap();
        assert_eq!(buf[0], BREAKPOINT_INSTRUCTION[1]);
        table.unshadow(0x201, &mut buf);
        assert_eq!(buf, [0x01, 0x02, 0x03]);
    }

    #[test]
    fn set_is_idempotent() {
        let mut bus = bus();
        let mut table = BreakpointTable::new();
        table.set(&mut bus, 0x300, 2).unwrap();
        table.set(&mut bus, 0x300, 4).unwrap();
        assert_eq!(table.len(), 1);

        // the second set must not have captured the trap as the original
        table.remove(&mut bus, 0x300, 2).unwrap();
        assert_eq!(&bus.mem[0x300..0x302], &[0x00, 0x01]);
    }

    #[test]
    fn capacity() {
        let mut bus = bus();
        let mut table = BreakpointTable::new();
        for i in 0..BREAKPOINT_CAPACITY as u32 {
            table.set(&mut bus, 0x400 + i * 4, 2).unwrap();
        }
        let extra = 0x400 + BREAKPOINT_CAPACITY as u32 * 4;
        assert_eq!(
            table.set(&mut bus, extra, 2),
            Err(BreakpointError::TableFull)
        );
        assert_eq!(&bus.mem[extra as usize..][..2], &[0x00, 0x01]);
        assert_eq!(table.len(), BREAKPOINT_CAPACITY);
        for i in 0..BREAKPOINT_CAPACITY {
            let a = 0x400 + i * 4;
            assert_eq!(&bus.mem[a..a + 2], &BREAKPOINT_INSTRUCTION);
        }
    }

    #[test]
    fn overlap_rejected() {
        let mut bus = bus();
        let mut table = BreakpointTable::new();
        table.set(&mut bus, 0x500, 2).unwrap();
        assert_eq!(table.set(&mut bus, 0x501, 2), Err(BreakpointError::Overlap));
        assert_eq!(table.set(&mut bus, 0x4ff, 2), Err(BreakpointError::Overlap));
        table.set(&mut bus, 0x502, 2).unwrap();
    }

    #[test]
    fn remove_miss_and_bad_kind() {
        let mut bus = bus();
        let mut table = BreakpointTable::new();
        assert_eq!(table.remove(&mut bus, 0x600, 2), Err(BreakpointError::NotFound));
        assert_eq!(
            table.set(&mut bus, 0x600, 1),
            Err(BreakpointError::UnsupportedKind)
        );
    }

    #[test]
    fn fault_leaves_slot_free() {
        let mut bus = MockBus::new(0x100);
        let mut table = BreakpointTable::new();
        assert_eq!(
            table.set(&mut bus, 0x1000, 2),
            Err(BreakpointError::Fault(BusFault { addr: 0x1000 }))
        );
        assert!(table.is_empty());
    }

    #[test]
    fn write_over_breakpoint_keeps_trap() {
        let mut bus = bus();
        let mut table = BreakpointTable::new();
        table.set(&mut bus, 0x702, 2).unwrap();

        let data = [0xaa, 0xbb, 0xcc, 0xdd];
        bus.write_bytes(0x701, &data).unwrap();
        table.reshadow(&mut bus, 0x701, &data).unwrap();

        assert_eq!(&bus.mem[0x702..0x704], &BREAKPOINT_INSTRUCTION);
        let mut buf = [0; 4];
        bus.read_bytes(0x701, &mut buf).unwrap();
        table.unshadow(0x701, &mut buf);
        assert_eq!(buf, data);

        table.remove(&mut bus, 0x702, 2).unwrap();
        assert_eq!(&bus.mem[0x701..0x705], &data);
    }
}
