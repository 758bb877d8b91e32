//! Serve a program running on the simulated 68010 to `m68k-elf-gdb`.
//!
//! ```text
//! cargo run --example sim_server [program.elf | program.bin] [--68000]
//! (gdb) target remote :9001
//! ```
//!
//! Raw images are loaded at the usual Human68k load address. Without a
//! program, a small built-in counting loop is served.

use std::net::{TcpListener, TcpStream};

use gdbserver68k::arch::CpuRevision;
use gdbserver68k::engine::EngineConfig;
use gdbserver68k::{DisconnectReason, GdbStub};
use gdbserver68k_sim::layout::LOAD_ADDR;
use gdbserver68k_sim::Simulator;

pub type DynResult<T> = Result<T, Box<dyn std::error::Error>>;

/// moveq #0,d0 ; loop: addq.l #1,d0 ; nop ; bra.s loop
static COUNTING_LOOP: &[u8] = &[0x70, 0x00, 0x52, 0x80, 0x4e, 0x71, 0x60, 0xfa];

/// Copy every allocated section of an ELF file into RAM, returning the
/// entry point.
fn load_elf(sim: &mut Simulator, program_elf: &[u8]) -> DynResult<u32> {
    let elf_header = goblin::elf::Elf::parse(program_elf)?;

    let sections = elf_header
        .section_headers
        .iter()
        .filter(|h| h.is_alloc() && h.sh_type != goblin::elf::section_header::SHT_NOBITS);

    for h in sections {
        eprintln!(
            "loading section {:?} into memory from [{:#010x?}..{:#010x?}]",
            elf_header.shdr_strtab.get_at(h.sh_name).unwrap_or("?"),
            h.sh_addr,
            h.sh_addr + h.sh_size,
        );
        let range = h.file_range().ok_or("section has no file data")?;
        sim.load(h.sh_addr as u32, &program_elf[range])
            .map_err(|e| format!("section does not fit in RAM: {:x?}", e))?;
    }

    Ok(elf_header.entry as u32)
}

fn wait_for_tcp(port: u16) -> DynResult<TcpStream> {
    let sockaddr = format!("127.0.0.1:{}", port);
    eprintln!("Waiting for a GDB connection on {:?}...", sockaddr);

    let sock = TcpListener::bind(sockaddr)?;
    let (stream, addr) = sock.accept()?;
    eprintln!("Debugger connected from {}", addr);

    Ok(stream)
}

fn main() -> DynResult<()> {
    pretty_env_logger::init();

    let mut revision = CpuRevision::Mc68010;
    let mut program = None;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--68000" => revision = CpuRevision::Mc68000,
            _ => program = Some(arg),
        }
    }

    let mut sim = Simulator::new(revision);
    let entry = match program {
        None => {
            sim.load(LOAD_ADDR, COUNTING_LOOP)
                .map_err(|e| format!("{:x?}", e))?;
            LOAD_ADDR
        }
        Some(path) => {
            let image = std::fs::read(&path)?;
            if image.starts_with(b"\x7fELF") {
                load_elf(&mut sim, &image)?
            } else {
                sim.load(LOAD_ADDR, &image)
                    .map_err(|e| format!("{} does not fit in RAM: {:x?}", path, e))?;
                LOAD_ADDR
            }
        }
    };

    let mut engine = sim.into_engine(entry, EngineConfig::default());
    let mut debugger = GdbStub::new(wait_for_tcp(9001)?);

    match debugger.run(&mut engine) {
        Ok(DisconnectReason::TargetExited(code)) => println!("Target exited with code {}!", code),
        Ok(DisconnectReason::Kill) => println!("GDB sent a kill command!"),
        Ok(DisconnectReason::Aborted) => println!("Interrupted before the session started!"),
        Err(e) => return Err(format!("gdbstub error: {:?}", e).into()),
    }

    Ok(())
}
