use super::prelude::*;

/// `vCont;action[:thread-id][;action...]`, parsed lazily.
#[derive(Debug)]
pub struct vCont<'a> {
    actions: &'a [u8],
}

impl<'a> ParseCommand<'a> for vCont<'a> {
    fn from_packet(buf: PacketBuf<'a>) -> Option<Self> {
        let body = buf.into_body();
        match body {
            [b';', ..] => Some(vCont { actions: body }),
            _ => None,
        }
    }
}

impl<'a> vCont<'a> {
    /// Iterate over the actions. `None` items are actions that failed to
    /// parse.
    pub fn actions(&self) -> impl Iterator<Item = Option<VContAction>> + 'a {
        self.actions.split(|b| *b == b';').skip(1).map(|act| {
            let mut s = act.split(|b| *b == b':');
            let kind = VContKind::from_slice(s.next()?)?;
            let thread = match s.next() {
                Some(s) => Some(ThreadId::try_from(s).ok()?),
                None => None,
            };

            Some(VContAction { kind, thread })
        })
    }
}

#[derive(PartialEq, Eq, Debug)]
pub struct VContAction {
    pub kind: VContKind,
    pub thread: Option<ThreadId>,
}

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum VContKind {
    Continue,
    ContinueWithSig(u8),
    Step,
    StepWithSig(u8),
}

impl VContKind {
    fn from_slice(s: &[u8]) -> Option<VContKind> {
        use self::VContKind::*;

        let (kind, sig) = s.split_first()?;
        let res = match kind {
            b'c' if sig.is_empty() => Continue,
            b'C' => ContinueWithSig(decode_hex(sig).ok()?),
            b's' if sig.is_empty() => Step,
            b'S' => StepWithSig(decode_hex(sig).ok()?),
            _ => return None,
        };

        Some(res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_actions_with_threads() {
        let cmd = vCont {
            actions: b";s:1;c",
        };
        let actions: Vec<_> = cmd.actions().collect();
        assert_eq!(
            actions,
            vec![
                Some(VContAction {
                    kind: VContKind::Step,
                    thread: Some(ThreadId {
                        pid: None,
                        tid: IdKind::WithId(crate::SINGLE_THREAD_TID)
                    })
                }),
                Some(VContAction {
                    kind: VContKind::Continue,
                    thread: None
                }),
            ]
        );
    }

    #[test]
    fn signal_actions() {
        let cmd = vCont { actions: b";C0b" };
        assert_eq!(
            cmd.actions().next(),
            Some(Some(VContAction {
                kind: VContKind::ContinueWithSig(0x0b),
                thread: None
            }))
        );

        let cmd = vCont { actions: b";q" };
        assert_eq!(cmd.actions().next(), Some(None));
    }
}
