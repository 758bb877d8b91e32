use super::prelude::*;

#[derive(Debug)]
pub struct g;

impl<'a> ParseCommand<'a> for g {
    fn from_packet(buf: PacketBuf<'a>) -> Option<Self> {
        super::parse_empty(buf, g)
    }
}
