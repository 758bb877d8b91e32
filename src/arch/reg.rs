use super::Registers;

/// The 18 registers GDB knows about for `m68k:68000`, in `g` packet order:
/// d0-d7, a0-a7, ps, pc. Each is 32 bits, big-endian on the wire.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct M68kCoreRegs {
    /// Data registers
    pub d: [u32; 8],
    /// Address registers. `a[7]` is whichever stack pointer is live.
    pub a: [u32; 8],
    /// Status register, zero-extended
    pub sr: u32,
    /// Program counter
    pub pc: u32,
}

const NUM_REGS: usize = 18;

impl Registers for M68kCoreRegs {
    fn pc(&self) -> u32 {
        self.pc
    }

    fn gdb_serialize(&self, mut write_byte: impl FnMut(Option<u8>)) {
        let tail = [self.sr, self.pc];
        for reg in self.d.iter().chain(self.a.iter()).chain(tail.iter()) {
            for b in reg.to_be_bytes().iter() {
                write_byte(Some(*b));
            }
        }
    }

    fn gdb_deserialize(&mut self, bytes: &[u8]) -> Result<(), ()> {
        if bytes.len() != NUM_REGS * 4 {
            return Err(());
        }

        let mut words = bytes
            .chunks_exact(4)
            .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]));

        for reg in self.d.iter_mut().chain(self.a.iter_mut()) {
            *reg = words.next().ok_or(())?;
        }
        self.sr = words.next().ok_or(())?;
        self.pc = words.next().ok_or(())?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> M68kCoreRegs {
        let mut regs = M68kCoreRegs::default();
        for i in 0..8 {
            regs.d[i] = 0x1000_0000 + i as u32;
            regs.a[i] = 0x2000_0000 + i as u32;
        }
        regs.sr = 0x2700;
        regs.pc = 0x0000_6800;
        regs
    }

    #[test]
    fn serialize_layout() {
        let mut out = Vec::new();
        sample().gdb_serialize(|b| out.push(b.unwrap()));

        assert_eq!(out.len(), 72);
        assert_eq!(&out[0..4], &[0x10, 0x00, 0x00, 0x00]);
        assert_eq!(&out[60..64], &[0x20, 0x00, 0x00, 0x07]);
        assert_eq!(&out[64..68], &[0x00, 0x00, 0x27, 0x00]);
        assert_eq!(&out[68..72], &[0x00, 0x00, 0x68, 0x00]);
    }

    #[test]
    fn round_trip() {
        let mut out = Vec::new();
        sample().gdb_serialize(|b| out.push(b.unwrap()));

        let mut regs = M68kCoreRegs::default();
        regs.gdb_deserialize(&out).unwrap();
        assert_eq!(regs, sample());
    }

    #[test]
    fn wrong_length_rejected() {
        let mut regs = M68kCoreRegs::default();
        assert!(regs.gdb_deserialize(&[0; 71]).is_err());
        assert!(regs.gdb_deserialize(&[0; 76]).is_err());
    }
}
