use super::prelude::*;

#[derive(Debug)]
pub struct qTStatus;

impl<'a> ParseCommand<'a> for qTStatus {
    fn from_packet(buf: PacketBuf<'a>) -> Option<Self> {
        super::parse_empty(buf, qTStatus)
    }
}
