use super::prelude::*;

#[derive(Debug)]
pub struct qC;

impl<'a> ParseCommand<'a> for qC {
    fn from_packet(buf: PacketBuf<'a>) -> Option<Self> {
        super::parse_empty(buf, qC)
    }
}
