//! Motorola 68000-family definitions shared by the engine and the protocol
//! layer.

mod cpu;
mod reg;

pub use cpu::{CpuRevision, StatusRegister};
pub use reg::M68kCoreRegs;

/// Registers which can be converted to and from the byte stream used by the
/// `g` and `G` packets.
pub trait Registers: Default {
    /// Serialize `self` into a GDB register bytestream.
    ///
    /// Missing registers are serialized by passing `None` to `write_byte`.
    fn gdb_serialize(&self, write_byte: impl FnMut(Option<u8>));

    /// Deserialize a GDB register bytestream into `self`.
    #[allow(clippy::result_unit_err)]
    fn gdb_deserialize(&mut self, bytes: &[u8]) -> Result<(), ()>;

    /// Return the value of the program counter register.
    fn pc(&self) -> u32;
}

/// `TRAP #9`, the instruction patched in for a software breakpoint.
pub const BREAKPOINT_INSTRUCTION: [u8; 2] = [0x4e, 0x49];

/// Target description sent in reply to `qXfer:features:read`.
pub const TARGET_XML: &str = r#"<target version="1.0">
  <architecture>m68k:68000</architecture>
  <osabi>none</osabi>
  <feature name="org.gnu.gdb.m68k.core">
    <reg name="d0" bitsize="32"/>
    <reg name="d1" bitsize="32"/>
    <reg name="d2" bitsize="32"/>
    <reg name="d3" bitsize="32"/>
    <reg name="d4" bitsize="32"/>
    <reg name="d5" bitsize="32"/>
    <reg name="d6" bitsize="32"/>
    <reg name="d7" bitsize="32"/>
    <reg name="a0" bitsize="32" type="data_ptr"/>
    <reg name="a1" bitsize="32" type="data_ptr"/>
    <reg name="a2" bitsize="32" type="data_ptr"/>
    <reg name="a3" bitsize="32" type="data_ptr"/>
    <reg name="a4" bitsize="32" type="data_ptr"/>
    <reg name="a5" bitsize="32" type="data_ptr"/>
    <reg name="fp" bitsize="32" type="data_ptr"/>
    <reg name="sp" bitsize="32" type="data_ptr"/>
    <reg name="ps" bitsize="32"/>
    <reg name="pc" bitsize="32" type="code_ptr"/>
  </feature>
</target>"#;
