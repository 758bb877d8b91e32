//! Exception stack frames, for every CPU revision the engine supports.

use core::fmt;

use crate::arch::CpuRevision;
use crate::common::Signal;
use crate::hal::{Bus, BusFault};

use super::{BusExt, VectorClass};

/// Direction of a faulted memory access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// The CPU was reading.
    Read,
    /// The CPU was writing.
    Write,
}

/// What a bus or address error frame says about the access that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultInfo {
    /// `true` for an address error, `false` for a bus error.
    pub address_error: bool,
    /// Read or write.
    pub access: Access,
    /// The address the CPU was accessing.
    pub address: u32,
}

impl fmt::Display for FaultInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} error by {} memory access of 0x{:08x}.",
            if self.address_error { "Address" } else { "Bus" },
            match self.access {
                Access::Read => "READ",
                Access::Write => "WRITE",
            },
            self.address
        )
    }
}

/// The format-specific part of a 68010+ exception frame (the high nibble of
/// the format/vector word).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFormat {
    /// 0: four-word frame.
    Normal,
    /// 1: throwaway four-word frame.
    Throwaway,
    /// 2: six-word frame carrying an instruction address.
    Instruction {
        /// Address of the instruction that caused the exception.
        address: u32,
    },
    /// 3: 68040 floating-point post-instruction frame.
    FloatingPost {
        /// Effective address of the operand.
        effective_address: u32,
    },
    /// 4: 68040/68060 eight-word frame.
    EightWord,
    /// 7: 68040 access error frame.
    AccessError040 {
        /// Special status word.
        ssw: u16,
        /// Faulted address.
        fault_address: u32,
    },
    /// 8: 68010 bus and address error frame.
    BusError010 {
        /// Special status word.
        ssw: u16,
        /// Faulted address.
        fault_address: u32,
    },
    /// 9: coprocessor mid-instruction frame.
    CoprocessorMid,
    /// A: 68020/68030 short bus cycle fault frame.
    ShortBusCycle {
        /// Special status word.
        ssw: u16,
        /// Data cycle fault address.
        fault_address: u32,
    },
    /// B: 68020/68030 long bus cycle fault frame.
    LongBusCycle {
        /// Special status word.
        ssw: u16,
        /// Data cycle fault address.
        fault_address: u32,
    },
    /// C: CPU32 bus error frame.
    Cpu32BusError,
    /// A format the CPU never generates. Treated as a four-word frame.
    Invalid(u8),
}

impl FrameFormat {
    /// Frame length in bytes, by format code. Zero marks formats no
    /// supported CPU produces.
    const SIZES: [u32; 16] = [8, 8, 12, 12, 16, 0, 0, 60, 58, 20, 32, 92, 24, 0, 0, 0];

    /// Decode the format-specific fields of a frame at `sp`.
    fn read<B: Bus + ?Sized>(bus: &mut B, code: u8, sp: u32) -> Result<FrameFormat, BusFault> {
        let at = |off: u32| sp.wrapping_add(off);
        Ok(match code {
            0x0 => FrameFormat::Normal,
            0x1 => FrameFormat::Throwaway,
            0x2 => FrameFormat::Instruction {
                address: bus.read_u32(at(0x08))?,
            },
            0x3 => FrameFormat::FloatingPost {
                effective_address: bus.read_u32(at(0x08))?,
            },
            0x4 => FrameFormat::EightWord,
            0x7 => FrameFormat::AccessError040 {
                ssw: bus.read_u16(at(0x0c))?,
                fault_address: bus.read_u32(at(0x14))?,
            },
            0x8 => FrameFormat::BusError010 {
                ssw: bus.read_u16(at(0x08))?,
                fault_address: bus.read_u32(at(0x0a))?,
            },
            0x9 => FrameFormat::CoprocessorMid,
            0xa => FrameFormat::ShortBusCycle {
                ssw: bus.read_u16(at(0x0a))?,
                fault_address: bus.read_u32(at(0x10))?,
            },
            0xb => FrameFormat::LongBusCycle {
                ssw: bus.read_u16(at(0x0a))?,
                fault_address: bus.read_u32(at(0x10))?,
            },
            0xc => FrameFormat::Cpu32BusError,
            other => FrameFormat::Invalid(other),
        })
    }

    /// The format code.
    pub fn code(&self) -> u8 {
        match self {
            FrameFormat::Normal => 0x0,
            FrameFormat::Throwaway => 0x1,
            FrameFormat::Instruction { .. } => 0x2,
            FrameFormat::FloatingPost { .. } => 0x3,
            FrameFormat::EightWord => 0x4,
            FrameFormat::AccessError040 { .. } => 0x7,
            FrameFormat::BusError010 { .. } => 0x8,
            FrameFormat::CoprocessorMid => 0x9,
            FrameFormat::ShortBusCycle { .. } => 0xa,
            FrameFormat::LongBusCycle { .. } => 0xb,
            FrameFormat::Cpu32BusError => 0xc,
            FrameFormat::Invalid(code) => *code,
        }
    }

    /// Total frame length in bytes, including sr, pc and the format word.
    pub fn len(&self) -> u32 {
        match Self::SIZES[usize::from(self.code() & 0xf)] {
            0 => 8,
            n => n,
        }
    }

    /// Address and direction of the faulted access, for formats that
    /// record one.
    pub fn fault(&self) -> Option<(u32, Access)> {
        let (rw_bit, ssw, addr) = match *self {
            FrameFormat::AccessError040 { ssw, fault_address } => (0x0100, ssw, fault_address),
            FrameFormat::BusError010 { ssw, fault_address } => (0x0100, ssw, fault_address),
            FrameFormat::ShortBusCycle { ssw, fault_address }
            | FrameFormat::LongBusCycle { ssw, fault_address } => (0x0040, ssw, fault_address),
            _ => return None,
        };
        let access = if ssw & rw_bit != 0 {
            Access::Read
        } else {
            Access::Write
        };
        Some((addr, access))
    }
}

/// An exception frame as the CPU pushed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionFrame {
    /// 68000 frame for everything except bus and address errors.
    Short {
        /// Status register at the exception.
        sr: u16,
        /// Return address.
        pc: u32,
    },
    /// 68000 bus or address error frame.
    Group0 {
        /// Function code word; bit 4 is set for reads.
        function: u16,
        /// The faulted address.
        access_address: u32,
        /// Instruction register.
        instruction: u16,
        /// Status register at the exception.
        sr: u16,
        /// Return address.
        pc: u32,
    },
    /// 68010+ frame.
    Formatted {
        /// Status register at the exception.
        sr: u16,
        /// Return address.
        pc: u32,
        /// Vector offset from the format word.
        vector_offset: u16,
        /// The format-specific remainder.
        format: FrameFormat,
    },
}

impl ExceptionFrame {
    /// Read the frame the CPU pushed at `sp` when it took vector `offset`.
    pub fn read<B: Bus + ?Sized>(
        bus: &mut B,
        cpu: CpuRevision,
        offset: u16,
        sp: u32,
    ) -> Result<ExceptionFrame, BusFault> {
        let at = |off: u32| sp.wrapping_add(off);

        if !cpu.has_format_word() {
            let group0 = VectorClass::from_offset(offset).map_or(false, |c| c.is_access_fault());
            if group0 {
                return Ok(ExceptionFrame::Group0 {
                    function: bus.read_u16(at(0))?,
                    access_address: bus.read_u32(at(2))?,
                    instruction: bus.read_u16(at(6))?,
                    sr: bus.read_u16(at(8))?,
                    pc: bus.read_u32(at(10))?,
                });
            }
            return Ok(ExceptionFrame::Short {
                sr: bus.read_u16(at(0))?,
                pc: bus.read_u32(at(2))?,
            });
        }

        let sr = bus.read_u16(at(0))?;
        let pc = bus.read_u32(at(2))?;
        let format_word = bus.read_u16(at(6))?;
        let format = FrameFormat::read(bus, (format_word >> 12) as u8, sp)?;
        if let FrameFormat::Invalid(code) = format {
            warn!("invalid exception frame format {:#x} at {:#010x}", code, sp);
        }

        Ok(ExceptionFrame::Formatted {
            sr,
            pc,
            vector_offset: format_word & 0x0fff,
            format,
        })
    }

    /// Status register at the exception.
    pub fn sr(&self) -> u16 {
        match *self {
            ExceptionFrame::Short { sr, .. }
            | ExceptionFrame::Group0 { sr, .. }
            | ExceptionFrame::Formatted { sr, .. } => sr,
        }
    }

    /// Return address.
    pub fn pc(&self) -> u32 {
        match *self {
            ExceptionFrame::Short { pc, .. }
            | ExceptionFrame::Group0 { pc, .. }
            | ExceptionFrame::Formatted { pc, .. } => pc,
        }
    }

    /// Bytes to pop to discard the frame.
    pub fn len(&self) -> u32 {
        match self {
            ExceptionFrame::Short { .. } => 6,
            ExceptionFrame::Group0 { .. } => 14,
            ExceptionFrame::Formatted { format, .. } => format.len(),
        }
    }

    /// Address and direction of the faulted access, if the frame has them.
    pub fn fault(&self) -> Option<(u32, Access)> {
        match self {
            ExceptionFrame::Short { .. } => None,
            ExceptionFrame::Group0 {
                function,
                access_address,
                ..
            } => {
                let access = if function & 0x10 != 0 {
                    Access::Read
                } else {
                    Access::Write
                };
                Some((*access_address, access))
            }
            ExceptionFrame::Formatted { format, .. } => format.fault(),
        }
    }
}

/// A trap, decoded into what the engine and the client need.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoded {
    /// The hooked class, `None` if the vector is not one the engine hooks.
    pub class: Option<VectorClass>,
    /// The signal to report.
    pub signal: Signal,
    /// The target's status register, trace bit cleared.
    pub sr: u32,
    /// Where the target resumes (backed up over a breakpoint trap).
    pub pc: u32,
    /// Supervisor stack pointer with the frame popped.
    pub ssp: u32,
    /// For bus and address errors, the failed access.
    pub fault: Option<FaultInfo>,
    /// The raw frame.
    pub frame: ExceptionFrame,
}

/// Decode the frame at `ssp` that vector `offset` pushed.
pub fn decode<B: Bus + ?Sized>(
    bus: &mut B,
    cpu: CpuRevision,
    offset: u16,
    ssp: u32,
) -> Result<Decoded, BusFault> {
    let frame = ExceptionFrame::read(bus, cpu, offset, ssp)?;
    let class = VectorClass::from_offset(offset);
    debug!(
        "trap {:#04x} ({:?}): sr={:#06x} pc={:#010x} ssp={:#010x} {:x?}",
        offset,
        class,
        frame.sr(),
        frame.pc(),
        ssp,
        frame
    );

    let signal = match class {
        Some(class) => class.signal(),
        None => {
            warn!("trap through unexpected vector {:#x}", offset);
            Signal::SIGTRAP
        }
    };

    let mut pc = frame.pc();
    if class == Some(VectorClass::Breakpoint) {
        pc = pc.wrapping_sub(crate::arch::BREAKPOINT_INSTRUCTION.len() as u32);
    }

    let fault = match class {
        Some(c) if c.is_access_fault() => {
            frame.fault().map(|(address, access)| FaultInfo {
                address_error: c == VectorClass::AddressError,
                access,
                address,
            })
        }
        _ => None,
    };

    Ok(Decoded {
        class,
        signal,
        sr: u32::from(frame.sr() & 0x7fff),
        pc,
        ssp: ssp.wrapping_add(frame.len()),
        fault,
        frame,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::mock::MockBus;

    const SP: u32 = 0x100;

    fn short_frame(sr: u16, pc: u32) -> MockBus {
        let mut bus = MockBus::new(0x200);
        bus.load_u16(SP, sr);
        bus.load_u32(SP + 2, pc);
        bus
    }

    fn formatted(sr: u16, pc: u32, format: u8, offset: u16) -> MockBus {
        let mut bus = short_frame(sr, pc);
        bus.load_u16(SP + 6, (u16::from(format) << 12) | offset);
        bus
    }

    #[test]
    fn every_class_maps_to_its_signal() {
        let expected = [
            (VectorClass::BusError, Signal::SIGBUS),
            (VectorClass::AddressError, Signal::SIGBUS),
            (VectorClass::IllegalInstruction, Signal::SIGILL),
            (VectorClass::ZeroDivide, Signal::SIGFPE),
            (VectorClass::Chk, Signal::SIGFPE),
            (VectorClass::Trapv, Signal::SIGFPE),
            (VectorClass::PrivilegeViolation, Signal::SIGSEGV),
            (VectorClass::Trace, Signal::SIGTRAP),
            (VectorClass::Nmi, Signal::SIGINT),
            (VectorClass::Breakpoint, Signal::SIGTRAP),
        ];
        for &(class, signal) in expected.iter() {
            let mut bus = formatted(0x0000, 0x6800, 0, class.offset());
            let d = decode(&mut bus, CpuRevision::Mc68030, class.offset(), SP).unwrap();
            assert_eq!(d.class, Some(class));
            assert_eq!(d.signal, signal, "{:?}", class);
        }
    }

    #[test]
    fn short_68000_frame() {
        let mut bus = short_frame(0xa704, 0x6810);
        let d = decode(&mut bus, CpuRevision::Mc68000, 0x24, SP).unwrap();
        assert_eq!(d.sr, 0x2704);
        assert_eq!(d.pc, 0x6810);
        assert_eq!(d.ssp, SP + 6);
        assert_eq!(d.fault, None);
    }

    #[test]
    fn breakpoint_backs_up_pc() {
        let mut bus = short_frame(0x0000, 0x6812);
        let d = decode(&mut bus, CpuRevision::Mc68000, 0xa4, SP).unwrap();
        assert_eq!(d.pc, 0x6810);
        assert_eq!(d.signal, Signal::SIGTRAP);
    }

    #[test]
    fn group0_68000_frame() {
        let mut bus = MockBus::new(0x200);
        bus.load_u16(SP, 0x0015);
        bus.load_u32(SP + 2, 0x00fe_0000);
        bus.load_u16(SP + 6, 0x2039);
        bus.load_u16(SP + 8, 0x0000);
        bus.load_u32(SP + 10, 0x6820);

        let d = decode(&mut bus, CpuRevision::Mc68000, 0x08, SP).unwrap();
        assert_eq!(d.signal, Signal::SIGBUS);
        assert_eq!(d.pc, 0x6820);
        assert_eq!(d.ssp, SP + 14);
        let fault = d.fault.unwrap();
        assert_eq!(fault.access, Access::Read);
        assert_eq!(
            alloc::format!("{}", fault),
            "Bus error by READ memory access of 0x00fe0000."
        );
    }

    #[test]
    fn format_8_bus_error() {
        let mut bus = formatted(0x2000, 0x6830, 0x8, 0x08);
        bus.load_u16(SP + 0x08, 0x0000);
        bus.load_u32(SP + 0x0a, 0x0012_3456);
        let d = decode(&mut bus, CpuRevision::Mc68010, 0x08, SP).unwrap();
        assert_eq!(d.ssp, SP + 58);
        assert_eq!(
            alloc::format!("{}", d.fault.unwrap()),
            "Bus error by WRITE memory access of 0x00123456."
        );
    }

    #[test]
    fn format_7_access_error() {
        let mut bus = formatted(0x2000, 0x6830, 0x7, 0x0c);
        bus.load_u16(SP + 0x0c, 0x0100);
        bus.load_u32(SP + 0x14, 0x0000_0001);
        let d = decode(&mut bus, CpuRevision::Mc68040, 0x0c, SP).unwrap();
        assert_eq!(d.ssp, SP + 60);
        assert_eq!(
            alloc::format!("{}", d.fault.unwrap()),
            "Address error by READ memory access of 0x00000001."
        );
    }

    #[test]
    fn formats_a_and_b() {
        for &(format, len) in &[(0xa, 32), (0xb, 92)] {
            let mut bus = formatted(0x2000, 0x6830, format, 0x08);
            bus.load_u16(SP + 0x0a, 0x0040);
            bus.load_u32(SP + 0x10, 0x00e0_0000);
            let d = decode(&mut bus, CpuRevision::Mc68030, 0x08, SP).unwrap();
            assert_eq!(d.ssp, SP + len);
            let fault = d.fault.unwrap();
            assert_eq!(fault.access, Access::Read);
            assert_eq!(fault.address, 0x00e0_0000);
        }
    }

    #[test]
    fn frame_sizes() {
        for &(format, len) in &[
            (0x0, 8),
            (0x1, 8),
            (0x2, 12),
            (0x3, 12),
            (0x4, 16),
            (0x9, 20),
            (0xc, 24),
            (0x5, 8),
            (0xf, 8),
        ] {
            let mut bus = formatted(0x0000, 0x6800, format, 0x10);
            let d = decode(&mut bus, CpuRevision::Mc68020, 0x10, SP).unwrap();
            assert_eq!(d.ssp, SP + len, "format {:#x}", format);
            assert_eq!(d.fault, None);
        }
    }

    #[test]
    fn format_2_instruction_address() {
        let mut bus = formatted(0x0000, 0x6804, 0x2, 0x14);
        bus.load_u32(SP + 8, 0x6802);
        let frame = ExceptionFrame::read(&mut bus, CpuRevision::Mc68020, 0x14, SP).unwrap();
        match frame {
            ExceptionFrame::Formatted {
                vector_offset,
                format: FrameFormat::Instruction { address },
                ..
            } => {
                assert_eq!(vector_offset, 0x14);
                assert_eq!(address, 0x6802);
            }
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[test]
    fn unreadable_frame() {
        let mut bus = MockBus::new(0x80);
        assert_eq!(
            decode(&mut bus, CpuRevision::Mc68000, 0x24, SP),
            Err(BusFault { addr: SP })
        );
    }
}
