use super::prelude::*;

/// Like `M`, but the data is sent as escaped binary.
#[derive(Debug)]
pub struct X<'a> {
    pub addr: u32,
    pub len: usize,
    pub val: &'a [u8],
}

impl<'a> ParseCommand<'a> for X<'a> {
    fn from_packet(buf: PacketBuf<'a>) -> Option<Self> {
        let body = buf.into_body();

        let mut body = body.splitn_mut(2, |b| *b == b':');
        let header = body.next()?;
        let val = body.next()?;

        let mut header = header.split(|b| *b == b',');
        let addr = decode_hex(header.next()?).ok()?;
        let len = decode_hex(header.next()?).ok()?;

        Some(X {
            addr,
            len,
            val: decode_bin_buf(val).ok()?,
        })
    }
}
