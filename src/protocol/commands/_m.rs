use super::prelude::*;

#[derive(Debug)]
pub struct m<'a> {
    pub addr: u32,
    pub len: usize,

    /// The whole packet buffer, free to be used as scratch space once the
    /// arguments have been decoded.
    pub buf: &'a mut [u8],
}

impl<'a> ParseCommand<'a> for m<'a> {
    fn from_packet(buf: PacketBuf<'a>) -> Option<Self> {
        let (buf, body_range) = buf.into_raw_buf();
        let body = buf.get(body_range)?;

        let mut body = body.split(|b| *b == b',');
        let addr = decode_hex(body.next()?).ok()?;
        let len = decode_hex(body.next()?).ok()?;
        if body.next().is_some() {
            return None;
        }

        Some(m { addr, len, buf })
    }
}
