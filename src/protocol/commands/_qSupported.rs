use super::prelude::*;

/// `qSupported[:feature;feature...]`. The client's feature list is kept for
/// logging only; the reply does not depend on it.
#[derive(Debug)]
pub struct qSupported<'a> {
    pub features: &'a [u8],
}

impl<'a> ParseCommand<'a> for qSupported<'a> {
    fn from_packet(buf: PacketBuf<'a>) -> Option<Self> {
        let body = buf.into_body();
        let features = match body {
            [] => &[][..],
            [b':', features @ ..] => &*features,
            _ => return None,
        };
        Some(qSupported { features })
    }
}
