use super::prelude::*;

#[derive(Debug, PartialEq, Eq)]
pub enum Op {
    /// `Hc`: thread for step and continue (deprecated in favor of vCont)
    StepContinue,
    /// `Hg`: thread for register and memory access
    Other,
}

#[derive(Debug)]
pub struct H {
    pub kind: Op,
    pub thread: ThreadId,
}

impl<'a> ParseCommand<'a> for H {
    fn from_packet(buf: PacketBuf<'a>) -> Option<Self> {
        let body = buf.into_body();
        let (kind, thread) = body.split_first()?;

        let kind = match kind {
            b'g' => Op::Other,
            b'c' => Op::StepContinue,
            _ => return None,
        };

        Some(H {
            kind,
            thread: ThreadId::try_from(&*thread).ok()?,
        })
    }
}
