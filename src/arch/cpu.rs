use bitflags::bitflags;

/// CPU model, as reported by the host (Human68k keeps it at `0xcbc`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CpuRevision {
    /// MC68000
    Mc68000,
    /// MC68010
    Mc68010,
    /// MC68020
    Mc68020,
    /// MC68030
    Mc68030,
    /// MC68040
    Mc68040,
    /// MC68060
    Mc68060,
}

impl CpuRevision {
    /// Decode the host's CPU type byte.
    pub fn from_u8(n: u8) -> Option<CpuRevision> {
        use self::CpuRevision::*;
        Some(match n {
            0 => Mc68000,
            1 => Mc68010,
            2 => Mc68020,
            3 => Mc68030,
            4 => Mc68040,
            6 => Mc68060,
            _ => return None,
        })
    }

    /// Everything after the 68000 pushes a format/vector word below the
    /// pc in every exception frame, and expects one on `rte`.
    pub fn has_format_word(self) -> bool {
        self > CpuRevision::Mc68000
    }

    /// The 68020 and later have an instruction cache which must be flushed
    /// after code is patched.
    pub fn has_icache(self) -> bool {
        self > CpuRevision::Mc68010
    }
}

bitflags! {
    /// The bits of the status register the engine cares about.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StatusRegister: u16 {
        /// Trace on every instruction
        const TRACE = 0x8000;
        /// Supervisor state; selects ssp (set) or usp (clear) as `a7`
        const SUPERVISOR = 0x2000;
        /// Interrupt priority mask
        const IPL = 0x0700;
        /// Condition codes
        const CCR = 0x001f;
    }
}

impl StatusRegister {
    /// Interpret the low 16 bits of a stored 32-bit status register value.
    pub fn from_raw(sr: u32) -> StatusRegister {
        StatusRegister::from_bits_retain(sr as u16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revision_capabilities() {
        assert_eq!(CpuRevision::from_u8(0), Some(CpuRevision::Mc68000));
        assert_eq!(CpuRevision::from_u8(3), Some(CpuRevision::Mc68030));
        assert_eq!(CpuRevision::from_u8(5), None);

        assert!(!CpuRevision::Mc68000.has_format_word());
        assert!(CpuRevision::Mc68010.has_format_word());
        assert!(!CpuRevision::Mc68010.has_icache());
        assert!(CpuRevision::Mc68020.has_icache());
    }

    #[test]
    fn status_register_bits() {
        let sr = StatusRegister::from_raw(0x0000_a704);
        assert!(sr.contains(StatusRegister::TRACE | StatusRegister::SUPERVISOR));
        assert_eq!((sr & StatusRegister::IPL).bits(), 0x0700);
        assert!(!StatusRegister::from_raw(0x0000).contains(StatusRegister::SUPERVISOR));
    }
}
