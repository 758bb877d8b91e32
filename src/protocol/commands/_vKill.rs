use super::prelude::*;

/// `vKill[;pid]`. There is only ever one process, so a pid is checked and
/// then dropped.
#[derive(Debug)]
pub struct vKill;

impl<'a> ParseCommand<'a> for vKill {
    fn from_packet(buf: PacketBuf<'a>) -> Option<Self> {
        match buf.as_body() {
            [] => Some(vKill),
            [b';', pid @ ..] => match decode_hex::<usize>(pid).ok()? {
                0 => None,
                _ => Some(vKill),
            },
            _ => None,
        }
    }
}
