//! The instruction interpreter.

use gdbserver68k::arch::{CpuRevision, StatusRegister};
use gdbserver68k::engine::BusExt;

use crate::ram::SimBus;

const CCR_N: u16 = 0x08;
const CCR_Z: u16 = 0x04;
const CCR_V: u16 = 0x02;
const CCR_C: u16 = 0x01;

/// How an instruction ended, other than by completing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Trap {
    /// Take the exception at `offset`, stacking `pc`.
    Exception { offset: u16, pc: u32 },
    /// A bus (offset 0x08) or address (0x0c) error.
    Fault {
        offset: u16,
        addr: u32,
        read: bool,
        pc: u32,
    },
    /// A line-F Human68k DOS call, serviced by the machine.
    Dos(u16),
}

const BUS_ERROR: u16 = 0x08;
const ADDRESS_ERROR: u16 = 0x0c;
const ILLEGAL: u16 = 0x10;
const ZERO_DIVIDE: u16 = 0x14;
const TRAPV: u16 = 0x1c;
const PRIVILEGE: u16 = 0x20;
/// Trace.
pub(crate) const TRACE: u16 = 0x24;
/// Level 7 interrupt autovector.
pub(crate) const NMI: u16 = 0x7c;
const TRAP_0: u16 = 0x80;

/// Programmer-visible CPU state. `a7` lives in `usp` or `ssp` depending on
/// the supervisor bit.
#[derive(Debug, Clone, Default)]
pub(crate) struct Cpu {
    pub d: [u32; 8],
    pub a: [u32; 7],
    pub usp: u32,
    pub ssp: u32,
    pub sr: u16,
    pub pc: u32,
}

impl Cpu {
    fn supervisor(&self) -> bool {
        self.sr & StatusRegister::SUPERVISOR.bits() != 0
    }

    pub fn tracing(&self) -> bool {
        self.sr & StatusRegister::TRACE.bits() != 0
    }

    pub fn sp(&self) -> u32 {
        if self.supervisor() {
            self.ssp
        } else {
            self.usp
        }
    }

    fn set_sp(&mut self, val: u32) {
        if self.supervisor() {
            self.ssp = val
        } else {
            self.usp = val
        }
    }

    fn areg(&self, n: usize) -> u32 {
        if n == 7 {
            self.sp()
        } else {
            self.a[n]
        }
    }

    fn set_areg(&mut self, n: usize, val: u32) {
        if n == 7 {
            self.set_sp(val)
        } else {
            self.a[n] = val
        }
    }

    fn set_nz(&mut self, val: u32, sign_bit: u32) {
        self.sr &= !(CCR_N | CCR_Z | CCR_V | CCR_C);
        if val & sign_bit != 0 {
            self.sr |= CCR_N;
        }
        if val & (sign_bit | (sign_bit - 1)) == 0 {
            self.sr |= CCR_Z;
        }
    }

    fn read_u16(&self, bus: &mut SimBus, addr: u32, pc: u32) -> Result<u16, Trap> {
        if addr & 1 != 0 {
            return Err(fault(ADDRESS_ERROR, addr, true, pc));
        }
        bus.read_u16(addr).map_err(|e| fault(BUS_ERROR, e.addr, true, pc))
    }

    fn read_u32(&self, bus: &mut SimBus, addr: u32, pc: u32) -> Result<u32, Trap> {
        if addr & 1 != 0 {
            return Err(fault(ADDRESS_ERROR, addr, true, pc));
        }
        bus.read_u32(addr).map_err(|e| fault(BUS_ERROR, e.addr, true, pc))
    }

    fn write_u16(&self, bus: &mut SimBus, addr: u32, val: u16, pc: u32) -> Result<(), Trap> {
        if addr & 1 != 0 {
            return Err(fault(ADDRESS_ERROR, addr, false, pc));
        }
        bus.write_u16(addr, val)
            .map_err(|e| fault(BUS_ERROR, e.addr, false, pc))
    }

    fn write_u32(&self, bus: &mut SimBus, addr: u32, val: u32, pc: u32) -> Result<(), Trap> {
        if addr & 1 != 0 {
            return Err(fault(ADDRESS_ERROR, addr, false, pc));
        }
        bus.write_u32(addr, val)
            .map_err(|e| fault(BUS_ERROR, e.addr, false, pc))
    }

    fn fetch16(&mut self, bus: &mut SimBus) -> Result<u16, Trap> {
        let val = self.read_u16(bus, self.pc, self.pc)?;
        self.pc = self.pc.wrapping_add(2);
        Ok(val)
    }

    fn fetch32(&mut self, bus: &mut SimBus) -> Result<u32, Trap> {
        let hi = self.fetch16(bus)?;
        let lo = self.fetch16(bus)?;
        Ok(u32::from(hi) << 16 | u32::from(lo))
    }

    pub fn push16(&mut self, bus: &mut SimBus, val: u16) -> Result<(), Trap> {
        let sp = self.sp().wrapping_sub(2);
        self.write_u16(bus, sp, val, self.pc)?;
        self.set_sp(sp);
        Ok(())
    }

    fn push32(&mut self, bus: &mut SimBus, val: u32) -> Result<(), Trap> {
        let sp = self.sp().wrapping_sub(4);
        self.write_u32(bus, sp, val, self.pc)?;
        self.set_sp(sp);
        Ok(())
    }

    pub fn pop16(&mut self, bus: &mut SimBus) -> Result<u16, Trap> {
        let sp = self.sp();
        let val = self.read_u16(bus, sp, self.pc)?;
        self.set_sp(sp.wrapping_add(2));
        Ok(val)
    }

    fn pop32(&mut self, bus: &mut SimBus) -> Result<u32, Trap> {
        let sp = self.sp();
        let val = self.read_u32(bus, sp, self.pc)?;
        self.set_sp(sp.wrapping_add(4));
        Ok(val)
    }

    /// Execute one instruction.
    pub fn execute(&mut self, bus: &mut SimBus, cpu: CpuRevision) -> Result<(), Trap> {
        let start = self.pc;
        let op = self.fetch16(bus)?;
        let reg_hi = usize::from((op >> 9) & 7);
        let reg_lo = usize::from(op & 7);

        match op {
            // nop
            0x4e71 => {}
            // rts
            0x4e75 => self.pc = self.pop32(bus)?,
            // rte
            0x4e73 => {
                if !self.supervisor() {
                    return Err(exception(PRIVILEGE, start));
                }
                let sr = self.pop16(bus)?;
                let pc = self.pop32(bus)?;
                if cpu.has_format_word() {
                    self.pop16(bus)?;
                }
                self.sr = sr;
                self.pc = pc;
            }
            // illegal
            0x4afc => return Err(exception(ILLEGAL, start)),
            // trapv
            0x4e76 => {
                if self.sr & CCR_V != 0 {
                    return Err(exception(TRAPV, self.pc));
                }
            }
            // trap #n
            op if op & 0xfff0 == 0x4e40 => {
                return Err(exception(TRAP_0 + (op & 0xf) * 4, self.pc));
            }
            // move.w #imm,-(sp)
            0x3f3c => {
                let val = self.fetch16(bus)?;
                self.push16(bus, val)?;
            }
            // jmp (xxx).l
            0x4ef9 => self.pc = self.fetch32(bus)?,
            // jsr (xxx).l
            0x4eb9 => {
                let target = self.fetch32(bus)?;
                self.push32(bus, self.pc)?;
                self.pc = target;
            }
            // move #imm,sr
            0x46fc => {
                let val = self.fetch16(bus)?;
                if !self.supervisor() {
                    return Err(exception(PRIVILEGE, start));
                }
                self.sr = val;
            }
            // moveq #imm,dn
            op if op & 0xf100 == 0x7000 => {
                let val = op as u8 as i8 as i32 as u32;
                self.d[reg_hi] = val;
                self.set_nz(val, 0x8000_0000);
            }
            // addq.l #q,dn
            op if op & 0xf1f8 == 0x5080 => {
                let val = self.d[reg_lo].wrapping_add(quick(op));
                self.d[reg_lo] = val;
                self.set_nz(val, 0x8000_0000);
            }
            // subq.l #q,dn
            op if op & 0xf1f8 == 0x5180 => {
                let val = self.d[reg_lo].wrapping_sub(quick(op));
                self.d[reg_lo] = val;
                self.set_nz(val, 0x8000_0000);
            }
            // dbf dn,label
            op if op & 0xfff8 == 0x51c8 => {
                let disp = self.fetch16(bus)? as i16;
                let count = (self.d[reg_lo] as u16).wrapping_sub(1);
                self.d[reg_lo] = (self.d[reg_lo] & 0xffff_0000) | u32::from(count);
                if count != 0xffff {
                    self.pc = start.wrapping_add(2).wrapping_add(disp as i32 as u32);
                }
            }
            // movea.l #imm,an
            op if op & 0xf1ff == 0x207c => {
                let val = self.fetch32(bus)?;
                self.set_areg(reg_hi, val);
            }
            // move.l #imm,dn
            op if op & 0xf1ff == 0x203c => {
                let val = self.fetch32(bus)?;
                self.d[reg_hi] = val;
                self.set_nz(val, 0x8000_0000);
            }
            // move.b (an),dn
            op if op & 0xf1f8 == 0x1010 => {
                let addr = self.areg(reg_lo);
                let val = bus
                    .read_u8(addr)
                    .map_err(|e| fault(BUS_ERROR, e.addr, true, self.pc))?;
                self.d[reg_hi] = (self.d[reg_hi] & 0xffff_ff00) | u32::from(val);
                self.set_nz(u32::from(val), 0x80);
            }
            // move.l (an),dn
            op if op & 0xf1f8 == 0x2010 => {
                let val = self.read_u32(bus, self.areg(reg_lo), self.pc)?;
                self.d[reg_hi] = val;
                self.set_nz(val, 0x8000_0000);
            }
            // move.l dn,(an)
            op if op & 0xf1f8 == 0x2080 => {
                let val = self.d[reg_lo];
                self.write_u32(bus, self.areg(reg_hi), val, self.pc)?;
                self.set_nz(val, 0x8000_0000);
            }
            // divu.w #imm,dn
            op if op & 0xf1ff == 0x80fc => {
                let divisor = u32::from(self.fetch16(bus)?);
                if divisor == 0 {
                    return Err(exception(ZERO_DIVIDE, self.pc));
                }
                let dividend = self.d[reg_hi];
                let quotient = dividend / divisor;
                if quotient > 0xffff {
                    self.sr |= CCR_V;
                } else {
                    let remainder = dividend % divisor;
                    let val = remainder << 16 | quotient;
                    self.d[reg_hi] = val;
                    self.set_nz(quotient, 0x8000);
                }
            }
            // bra / bsr / bcc
            op if op & 0xf000 == 0x6000 => {
                let disp = match op as u8 {
                    0 => self.fetch16(bus)? as i16 as i32,
                    d => d as i8 as i32,
                };
                let target = start.wrapping_add(2).wrapping_add(disp as u32);
                let taken = match (op >> 8) & 0xf {
                    0x0 => true,
                    0x1 => {
                        self.push32(bus, self.pc)?;
                        true
                    }
                    0x6 => self.sr & CCR_Z == 0,
                    0x7 => self.sr & CCR_Z != 0,
                    _ => return Err(exception(ILLEGAL, start)),
                };
                if taken {
                    self.pc = target;
                }
            }
            op if op & 0xff00 == 0xff00 => return Err(Trap::Dos(op)),
            _ => return Err(exception(ILLEGAL, start)),
        }

        Ok(())
    }

    /// Take an exception: switch to supervisor mode, push the frame the
    /// CPU model pushes and jump through the vector table.
    ///
    /// A fault while pushing the frame is a double fault, which halts a
    /// real 68000; it is returned as the fault address.
    pub fn take_exception(
        &mut self,
        bus: &mut SimBus,
        cpu: CpuRevision,
        trap: Trap,
        opcode: u16,
    ) -> Result<(), u32> {
        let (offset, pc, access) = match trap {
            Trap::Exception { offset, pc } => (offset, pc, None),
            Trap::Fault {
                offset,
                addr,
                read,
                pc,
            } => (offset, pc, Some((addr, read))),
            Trap::Dos(_) => return Ok(()),
        };

        let old_sr = self.sr;
        self.sr = (self.sr | StatusRegister::SUPERVISOR.bits()) & !StatusRegister::TRACE.bits();

        let mut frame = Vec::with_capacity(58);
        match (cpu.has_format_word(), access) {
            (false, None) => {
                frame.extend_from_slice(&old_sr.to_be_bytes());
                frame.extend_from_slice(&pc.to_be_bytes());
            }
            (false, Some((addr, read))) => {
                let function: u16 = if read { 0x15 } else { 0x05 };
                frame.extend_from_slice(&function.to_be_bytes());
                frame.extend_from_slice(&addr.to_be_bytes());
                frame.extend_from_slice(&opcode.to_be_bytes());
                frame.extend_from_slice(&old_sr.to_be_bytes());
                frame.extend_from_slice(&pc.to_be_bytes());
            }
            (true, None) => {
                frame.extend_from_slice(&old_sr.to_be_bytes());
                frame.extend_from_slice(&pc.to_be_bytes());
                frame.extend_from_slice(&offset.to_be_bytes());
            }
            // 68010 format 8: special status word, then the fault address
            (true, Some((addr, read))) => {
                let ssw: u16 = if read { 0x0100 } else { 0x0000 };
                frame.extend_from_slice(&old_sr.to_be_bytes());
                frame.extend_from_slice(&pc.to_be_bytes());
                frame.extend_from_slice(&(0x8000 | offset).to_be_bytes());
                frame.extend_from_slice(&ssw.to_be_bytes());
                frame.extend_from_slice(&addr.to_be_bytes());
                frame.resize(58, 0);
            }
        }

        let sp = self.ssp.wrapping_sub(frame.len() as u32);
        bus.load(sp, &frame).map_err(|e| e.addr)?;
        self.ssp = sp;
        self.pc = bus.read_u32(u32::from(offset)).map_err(|e| e.addr)?;
        Ok(())
    }
}

fn quick(op: u16) -> u32 {
    match (op >> 9) & 7 {
        0 => 8,
        q => u32::from(q),
    }
}

fn exception(offset: u16, pc: u32) -> Trap {
    Trap::Exception { offset, pc }
}

fn fault(offset: u16, addr: u32, read: bool, pc: u32) -> Trap {
    Trap::Fault {
        offset,
        addr,
        read,
        pc,
    }
}
