use super::prelude::*;

use crate::common::Tid;

#[derive(Debug)]
pub struct qThreadExtraInfo {
    pub tid: Tid,
}

impl<'a> ParseCommand<'a> for qThreadExtraInfo {
    fn from_packet(buf: PacketBuf<'a>) -> Option<Self> {
        match buf.as_body() {
            [b',', body @ ..] => match ThreadId::try_from(body).ok()?.tid {
                IdKind::WithId(tid) => Some(qThreadExtraInfo { tid }),
                _ => None,
            },
            _ => None,
        }
    }
}
