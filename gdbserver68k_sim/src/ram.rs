use std::cell::RefCell;
use std::rc::Rc;

use gdbserver68k::hal::{Bus, BusFault, Width};

/// The machine's RAM, shared by the CPU, the vector table and the debugger.
/// Anything past the end of RAM raises a bus error.
#[derive(Clone)]
pub struct SimBus(Rc<RefCell<Vec<u8>>>);

impl SimBus {
    pub(crate) fn new(size: usize) -> SimBus {
        SimBus(Rc::new(RefCell::new(vec![0; size])))
    }

    /// Copy `data` into RAM at `addr`.
    pub fn load(&self, addr: u32, data: &[u8]) -> Result<(), BusFault> {
        let mut mem = self.0.borrow_mut();
        let start = addr as usize;
        let end = start
            .checked_add(data.len())
            .filter(|&end| end <= mem.len())
            .ok_or(BusFault { addr })?;
        mem[start..end].copy_from_slice(data);
        Ok(())
    }

    /// Copy RAM at `addr` into `buf`.
    pub fn dump(&self, addr: u32, buf: &mut [u8]) -> Result<(), BusFault> {
        let mem = self.0.borrow();
        let start = addr as usize;
        let end = start
            .checked_add(buf.len())
            .filter(|&end| end <= mem.len())
            .ok_or(BusFault { addr })?;
        buf.copy_from_slice(&mem[start..end]);
        Ok(())
    }
}

impl Bus for SimBus {
    fn read(&mut self, addr: u32, width: Width) -> Result<u32, BusFault> {
        let mut bytes = [0; 4];
        let n = width.bytes() as usize;
        self.dump(addr, &mut bytes[4 - n..])?;
        Ok(u32::from_be_bytes(bytes))
    }

    fn write(&mut self, addr: u32, width: Width, value: u32) -> Result<(), BusFault> {
        let n = width.bytes() as usize;
        self.load(addr, &value.to_be_bytes()[4 - n..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn big_endian_access() {
        let mut ram = SimBus::new(0x100);
        ram.write(0x10, Width::Long, 0x1122_3344).unwrap();
        assert_eq!(ram.read(0x10, Width::Word).unwrap(), 0x1122);
        assert_eq!(ram.read(0x13, Width::Byte).unwrap(), 0x44);
    }

    #[test]
    fn past_the_end_faults() {
        let mut ram = SimBus::new(0x100);
        assert_eq!(ram.read(0xfe, Width::Long), Err(BusFault { addr: 0xfe }));
        assert!(ram.read(0xfc, Width::Long).is_ok());
        assert_eq!(ram.load(u32::MAX, &[0]), Err(BusFault { addr: u32::MAX }));
    }
}
