use super::prelude::*;

#[derive(Debug)]
pub struct qsThreadInfo;

impl<'a> ParseCommand<'a> for qsThreadInfo {
    fn from_packet(buf: PacketBuf<'a>) -> Option<Self> {
        super::parse_empty(buf, qsThreadInfo)
    }
}
