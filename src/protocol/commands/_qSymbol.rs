use super::prelude::*;

/// `qSymbol::` (and symbol lookups that follow it). This debugger never asks
/// the client for symbol values, so the payload is ignored.
#[derive(Debug)]
pub struct qSymbol;

impl<'a> ParseCommand<'a> for qSymbol {
    fn from_packet(_buf: PacketBuf<'a>) -> Option<Self> {
        Some(qSymbol)
    }
}
