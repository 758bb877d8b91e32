//! Fault-safe memory access built on single [`Bus`] accesses.

use crate::hal::{Bus, BusFault, Width};

/// Multi-byte and unaligned access on top of a [`Bus`].
///
/// Every operation is a sequence of single accesses. The first fault ends
/// the operation and is returned; accesses before it have already happened.
pub trait BusExt: Bus {
    /// Read one byte.
    fn read_u8(&mut self, addr: u32) -> Result<u8, BusFault> {
        Ok(self.read(addr, Width::Byte)? as u8)
    }

    /// Read a big-endian word. Odd addresses are read bytewise.
    fn read_u16(&mut self, addr: u32) -> Result<u16, BusFault> {
        if addr & 1 == 0 {
            return Ok(self.read(addr, Width::Word)? as u16);
        }
        let hi = self.read_u8(addr)?;
        let lo = self.read_u8(addr.wrapping_add(1))?;
        Ok(u16::from_be_bytes([hi, lo]))
    }

    /// Read a big-endian long word.
    ///
    /// An even address is a single long access. An odd one becomes four byte
    /// accesses, any of which may fail the whole read.
    fn read_u32(&mut self, addr: u32) -> Result<u32, BusFault> {
        if addr & 1 == 0 {
            return self.read(addr, Width::Long);
        }
        let mut bytes = [0; 4];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = self.read_u8(addr.wrapping_add(i as u32))?;
        }
        Ok(u32::from_be_bytes(bytes))
    }

    /// Write one byte.
    fn write_u8(&mut self, addr: u32, val: u8) -> Result<(), BusFault> {
        self.write(addr, Width::Byte, u32::from(val))
    }

    /// Write a big-endian word. Odd addresses are written bytewise.
    fn write_u16(&mut self, addr: u32, val: u16) -> Result<(), BusFault> {
        if addr & 1 == 0 {
            return self.write(addr, Width::Word, u32::from(val));
        }
        let [hi, lo] = val.to_be_bytes();
        self.write_u8(addr, hi)?;
        self.write_u8(addr.wrapping_add(1), lo)
    }

    /// Write a big-endian long word, bytewise at odd addresses.
    fn write_u32(&mut self, addr: u32, val: u32) -> Result<(), BusFault> {
        if addr & 1 == 0 {
            return self.write(addr, Width::Long, val);
        }
        for (i, b) in val.to_be_bytes().iter().enumerate() {
            self.write_u8(addr.wrapping_add(i as u32), *b)?;
        }
        Ok(())
    }

    /// Fill `buf` from memory at `addr`: long words first, then single
    /// bytes for the tail.
    fn read_bytes(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), BusFault> {
        let mut chunks = buf.chunks_exact_mut(4);
        let mut cursor = addr;
        for chunk in &mut chunks {
            chunk.copy_from_slice(&self.read_u32(cursor)?.to_be_bytes());
            cursor = cursor.wrapping_add(4);
        }
        for b in chunks.into_remainder() {
            *b = self.read_u8(cursor)?;
            cursor = cursor.wrapping_add(1);
        }
        Ok(())
    }

    /// Write `data` to memory at `addr`, long words first.
    fn write_bytes(&mut self, addr: u32, data: &[u8]) -> Result<(), BusFault> {
        let mut chunks = data.chunks_exact(4);
        let mut cursor = addr;
        for chunk in &mut chunks {
            let val = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            self.write_u32(cursor, val)?;
            cursor = cursor.wrapping_add(4);
        }
        for b in chunks.remainder() {
            self.write_u8(cursor, *b)?;
            cursor = cursor.wrapping_add(1);
        }
        Ok(())
    }
}

impl<B: Bus + ?Sized> BusExt for B {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::mock::MockBus;

    #[test]
    fn even_long_is_one_access() {
        let mut bus = MockBus::new(0x100);
        bus.load_u32(0x10, 0xdead_beef);
        assert_eq!(bus.read_u32(0x10).unwrap(), 0xdead_beef);
        assert_eq!(bus.accesses, 1);
    }

    #[test]
    fn odd_long_is_four_byte_accesses() {
        let mut bus = MockBus::new(0x100);
        bus.load(0x11, &[0x12, 0x34, 0x56, 0x78]);
        assert_eq!(bus.read_u32(0x11).unwrap(), 0x1234_5678);
        assert_eq!(bus.accesses, 4);

        bus.write_u32(0x21, 0xcafe_f00d).unwrap();
        assert_eq!(&bus.mem[0x21..0x25], &[0xca, 0xfe, 0xf0, 0x0d]);
    }

    #[test]
    fn any_byte_faulting_fails_the_access() {
        let mut bus = MockBus::new(0x100);
        // the last byte of the long word is past the end of memory
        assert_eq!(bus.read_u32(0xfd), Err(BusFault { addr: 0x100 }));
        assert_eq!(bus.write_u32(0xfd, 0), Err(BusFault { addr: 0x100 }));
    }

    #[test]
    fn byte_runs_with_tails() {
        let mut bus = MockBus::new(0x100);
        let data = [1, 2, 3, 4, 5, 6, 7];
        bus.write_bytes(0x41, &data).unwrap();

        let mut buf = [0; 7];
        bus.read_bytes(0x41, &mut buf).unwrap();
        assert_eq!(buf, data);
        assert_eq!(bus.mem[0x40], 0);
        assert_eq!(bus.mem[0x48], 0);
    }

    #[test]
    fn fault_in_tail() {
        let mut bus = MockBus::new(0x100);
        let mut buf = [0; 6];
        assert_eq!(bus.read_bytes(0xfc, &mut buf), Err(BusFault { addr: 0x100 }));
    }
}
