use super::prelude::*;

#[derive(Debug)]
pub struct qOffsets;

impl<'a> ParseCommand<'a> for qOffsets {
    fn from_packet(buf: PacketBuf<'a>) -> Option<Self> {
        super::parse_empty(buf, qOffsets)
    }
}
