//! Whole sessions: scripted client bytes in, replies out, with the engine
//! driving a simulated 68k.

use std::collections::VecDeque;

use gdbserver68k::arch::CpuRevision;
use gdbserver68k::engine::{DebugEngine, EngineConfig, EngineError};
use gdbserver68k::{Connection, DisconnectReason, GdbStub, GdbStubError};
use gdbserver68k_sim::layout::LOAD_ADDR;
use gdbserver68k_sim::Simulator;

#[derive(Debug)]
struct Hangup;

/// A client that has already typed everything it is going to say.
struct ScriptedConn {
    input: VecDeque<u8>,
    output: Vec<u8>,
}

impl ScriptedConn {
    fn new(script: &[&[u8]]) -> ScriptedConn {
        ScriptedConn {
            input: script.iter().flat_map(|s| s.iter().copied()).collect(),
            output: Vec::new(),
        }
    }
}

impl Connection for ScriptedConn {
    type Error = Hangup;

    fn read(&mut self) -> Result<u8, Hangup> {
        self.input.pop_front().ok_or(Hangup)
    }

    fn write(&mut self, byte: u8) -> Result<(), Hangup> {
        self.output.push(byte);
        Ok(())
    }

    fn peek(&mut self) -> Result<Option<u8>, Hangup> {
        Ok(self.input.front().copied())
    }
}

type Outcome = Result<DisconnectReason, GdbStubError<EngineError, Hangup>>;

fn packet(body: &str) -> Vec<u8> {
    let sum = body.bytes().fold(0u8, |acc, b| acc.wrapping_add(b));
    format!("${}#{:02x}", body, sum).into_bytes()
}

fn engine(code: &[u8], revision: CpuRevision) -> DebugEngine<Simulator> {
    let mut sim = Simulator::new(revision);
    sim.load(LOAD_ADDR, code).unwrap();
    sim.into_engine(LOAD_ADDR, EngineConfig::default())
}

fn session(engine: &mut DebugEngine<Simulator>, script: &[&[u8]]) -> (Outcome, ScriptedConn) {
    let mut stub = GdbStub::new(ScriptedConn::new(script));
    let outcome = stub.run(engine);
    let conn = std::mem::replace(stub.borrow_conn(), ScriptedConn::new(&[]));
    (outcome, conn)
}

/// Bodies of the packets the stub sent, with acks dropped and checksums
/// verified.
fn replies(output: &[u8]) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest = output;
    while let Some(start) = rest.iter().position(|&b| b == b'$') {
        let end = start + rest[start..].iter().position(|&b| b == b'#').unwrap();
        let body = &rest[start + 1..end];
        let sum = std::str::from_utf8(&rest[end + 1..end + 3]).unwrap();
        let expected = body.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
        assert_eq!(u8::from_str_radix(sum, 16).unwrap(), expected);
        out.push(String::from_utf8(body.to_vec()).unwrap());
        rest = &rest[end + 3..];
    }
    out
}

fn unhex(s: &str) -> Vec<u8> {
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
        .collect()
}

const NOPS: &[u8] = &[0x4e, 0x71, 0x4e, 0x71, 0x4e, 0x71, 0x4e, 0x71];

#[test]
fn handshake() {
    let mut engine = engine(NOPS, CpuRevision::Mc68010);
    let (outcome, conn) = session(
        &mut engine,
        &[
            &packet("qSupported:multiprocess+;swbreak+"),
            &packet("vCont?"),
            &packet("qAttached"),
            &packet("?"),
            &packet("qC"),
            &packet("qfThreadInfo"),
            &packet("qsThreadInfo"),
            &packet("qOffsets"),
            &packet("qSymbol::"),
            &packet("qTStatus"),
            &packet("vMustReplyEmpty"),
        ],
    );
    assert!(matches!(outcome, Err(GdbStubError::ConnectionRead(Hangup))));
    assert_eq!(
        replies(&conn.output),
        [
            "PacketSize=8000;qXfer:features:read+",
            "vCont;c;C;s;S",
            "0",
            "S05",
            "QC01",
            "m01",
            "l",
            "Text=00;Data=00;Bss=00",
            "OK",
            "",
            "",
        ]
    );
    // acked before the reply
    assert!(conn.output.starts_with(b"+$"));
}

#[test]
fn target_description() {
    let mut engine = engine(NOPS, CpuRevision::Mc68000);
    let (_, conn) = session(
        &mut engine,
        &[
            &packet("qXfer:features:read:target.xml:0,10"),
            &packet("qXfer:features:read:target.xml:0,1000"),
        ],
    );
    let replies = replies(&conn.output);
    assert_eq!(replies[0], "m<target version=");
    assert!(replies[1].starts_with("l<target"));
    assert!(replies[1].contains("m68k"));
}

#[test]
fn step_and_read_registers() {
    let mut engine = engine(NOPS, CpuRevision::Mc68010);
    let (_, conn) = session(&mut engine, &[&packet("vCont;s"), &packet("g")]);
    let replies = replies(&conn.output);
    assert_eq!(replies[0], "S05");

    let regs = unhex(&replies[1]);
    assert_eq!(regs.len(), 18 * 4);
    let pc = u32::from_be_bytes([regs[68], regs[69], regs[70], regs[71]]);
    assert_eq!(pc, LOAD_ADDR + 2);
    // a7 is the user stack pointer
    let a7 = u32::from_be_bytes([regs[60], regs[61], regs[62], regs[63]]);
    assert_eq!(a7, gdbserver68k_sim::layout::USER_STACK);
}

#[test]
fn breakpoint_hit() {
    let mut engine = engine(NOPS, CpuRevision::Mc68000);
    let (_, conn) = session(
        &mut engine,
        &[
            &packet("Z0,6804,2"),
            &packet("m6804,2"),
            &packet("vCont;c"),
            &packet("g"),
            &packet("z0,6804,2"),
            &packet("z0,6804,2"),
            &packet("Z1,6804,2"),
        ],
    );
    let replies = replies(&conn.output);
    assert_eq!(replies[0], "OK");
    // the client never sees the breakpoint instruction
    assert_eq!(replies[1], "4e71");
    assert_eq!(replies[2], "S05");
    let regs = unhex(&replies[3]);
    assert_eq!(&regs[68..72], &(LOAD_ADDR + 4).to_be_bytes());
    assert_eq!(replies[4], "OK");
    assert_eq!(replies[5], "E01");
    // hardware breakpoints are not supported
    assert_eq!(replies[6], "");
}

#[test]
fn memory_access() {
    let mut engine = engine(NOPS, CpuRevision::Mc68010);
    let (_, conn) = session(
        &mut engine,
        &[
            &packet("M7000,4:deadbeef"),
            &packet("m7000,4"),
            &packet("m7001,2"),
            &packet("mfffffe,2"),
            &packet("M7000,4:dead"),
            &packet("m7000,100000"),
        ],
    );
    assert_eq!(
        replies(&conn.output),
        ["OK", "deadbeef", "adbe", "E0e", "E16", "E16"]
    );
}

#[test]
fn program_exit_code() {
    // move.w #7,-(sp) ; _EXIT2
    let code = [0x3f, 0x3c, 0x00, 0x07, 0xff, 0x4c];
    let mut engine = engine(&code, CpuRevision::Mc68010);
    let (outcome, conn) = session(&mut engine, &[&packet("vCont;c")]);
    assert_eq!(outcome.unwrap(), DisconnectReason::TargetExited(7));
    assert_eq!(replies(&conn.output), ["W07"]);
}

#[test]
fn bus_error_is_explained() {
    for &revision in &[CpuRevision::Mc68000, CpuRevision::Mc68010] {
        // movea.l #$ff0000,a0 ; move.b (a0),d0
        let code = [0x20, 0x7c, 0x00, 0xff, 0x00, 0x00, 0x10, 0x10];
        let mut engine = engine(&code, revision);
        let (_, conn) = session(&mut engine, &[&packet("vCont;c")]);
        let replies = replies(&conn.output);
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0].as_bytes()[0], b'O');
        let message = String::from_utf8(unhex(&replies[0][1..])).unwrap();
        assert_eq!(
            message,
            "Bus error by READ memory access of 0x00ff0000.\n"
        );
        assert_eq!(replies[1], "S0a");
    }
}

#[test]
fn kill() {
    let mut engine = engine(NOPS, CpuRevision::Mc68000);
    let (outcome, conn) = session(&mut engine, &[&packet("vCont;s"), &packet("vKill;1")]);
    assert_eq!(outcome.unwrap(), DisconnectReason::Kill);
    assert_eq!(replies(&conn.output), ["S05", "OK"]);
}

#[test]
fn interrupt_while_running() {
    // bra.s *
    let mut engine = engine(&[0x60, 0xfe], CpuRevision::Mc68010);
    let (outcome, conn) = session(&mut engine, &[&packet("vCont;c"), &[0x03], &packet("g")]);
    // the interrupt byte is left for the dispatcher, which ignores it
    assert!(matches!(outcome, Err(GdbStubError::ConnectionRead(Hangup))));
    let replies = replies(&conn.output);
    assert_eq!(replies[0], "S02");
    let regs = unhex(&replies[1]);
    assert_eq!(&regs[68..72], &LOAD_ADDR.to_be_bytes());
}

#[test]
fn interrupt_before_first_packet_aborts() {
    let mut engine = engine(NOPS, CpuRevision::Mc68000);
    let (outcome, conn) = session(&mut engine, &[&[0x03], &packet("g")]);
    assert_eq!(outcome.unwrap(), DisconnectReason::Aborted);
    assert!(conn.output.is_empty());
}

#[test]
fn bad_checksum_is_nacked() {
    let mut engine = engine(NOPS, CpuRevision::Mc68000);
    let (_, conn) = session(&mut engine, &[b"$g#00", &packet("qAttached")]);
    assert_eq!(conn.output[0], b'-');
    assert_eq!(replies(&conn.output), ["0"]);
}

#[test]
fn threads() {
    let mut sim = Simulator::new(CpuRevision::Mc68010);
    sim.load(LOAD_ADDR, NOPS).unwrap();
    sim.spawn_threads(&["main", "worker", "idle"], 1, LOAD_ADDR)
        .unwrap();
    let mut engine = sim.into_engine(LOAD_ADDR, EngineConfig::default());

    let (_, conn) = session(
        &mut engine,
        &[
            &packet("qfThreadInfo"),
            &packet("qC"),
            &packet("qThreadExtraInfo,2"),
            &packet("Hg3"),
            &packet("g"),
            &packet("G00"),
            &packet("vCont;s"),
        ],
    );
    let replies = replies(&conn.output);
    assert_eq!(replies[0], "m01,02,03");
    assert_eq!(replies[1], "QC02");
    assert_eq!(unhex(&replies[2]), b"worker");
    assert_eq!(replies[3], "OK");
    // the sibling's saved registers
    let regs = unhex(&replies[4]);
    assert_eq!(&regs[0..4], &2u32.to_be_bytes());
    assert_eq!(&regs[68..72], &LOAD_ADDR.to_be_bytes());
    assert_eq!(replies[5], "E16");
    assert_eq!(replies[6], "S05");

    // the other threads were held while the current one stepped
    let blocked = engine.host().blocked_during_run().to_vec();
    assert_eq!(blocked.len(), 2);
}
