use super::prelude::*;

/// Arguments shared by `Z` and `z`: `<type>,<addr>,<kind>[;cond...]`.
///
/// Only type 0 (software breakpoint) is ever acted on; the rest are parsed so
/// they can be answered with an empty "unsupported" reply.
#[derive(Debug, PartialEq, Eq)]
pub struct BasicBreakpoint {
    pub type_: u8,
    pub addr: u32,
    /// Length in bytes of the breakpoint instruction the client expects.
    pub kind: usize,
}

impl BasicBreakpoint {
    pub fn from_slice(body: &[u8]) -> Option<BasicBreakpoint> {
        let body = body.split(|b| *b == b';').next()?;
        let mut body = body.split(|b| *b == b',');
        let type_ = decode_hex(body.next()?).ok()?;
        let addr = decode_hex(body.next()?).ok()?;
        let kind = decode_hex(body.next()?).ok()?;

        Some(BasicBreakpoint { type_, addr, kind })
    }
}
