use super::prelude::*;

/// `qAttached[:pid]`. The answer does not depend on the pid.
#[derive(Debug)]
pub struct qAttached;

impl<'a> ParseCommand<'a> for qAttached {
    fn from_packet(buf: PacketBuf<'a>) -> Option<Self> {
        match buf.as_body() {
            [] => Some(qAttached),
            [b':', pid @ ..] => match decode_hex::<usize>(pid).ok()? {
                0 => None,
                _ => Some(qAttached),
            },
            _ => None,
        }
    }
}
