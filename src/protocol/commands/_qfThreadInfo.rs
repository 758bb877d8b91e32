use super::prelude::*;

#[derive(Debug)]
pub struct qfThreadInfo;

impl<'a> ParseCommand<'a> for qfThreadInfo {
    fn from_packet(buf: PacketBuf<'a>) -> Option<Self> {
        super::parse_empty(buf, qfThreadInfo)
    }
}
