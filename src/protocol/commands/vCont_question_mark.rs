use super::prelude::*;

#[derive(Debug)]
pub struct vContQuestionMark;

impl<'a> ParseCommand<'a> for vContQuestionMark {
    fn from_packet(buf: PacketBuf<'a>) -> Option<Self> {
        super::parse_empty(buf, vContQuestionMark)
    }
}
