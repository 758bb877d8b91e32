//! Pausing the target's sibling threads around a resume.

use alloc::vec::Vec;

use crate::hal::{BusFault, SchedState, ThreadHandle, ThreadRegistry};

/// Scheduler state of every sibling [`suspend_others`] blocked, to be put
/// back by [`SuspendedSiblings::resume`].
#[derive(Debug, Default)]
#[must_use = "suspended threads stay blocked until resumed"]
pub struct SuspendedSiblings {
    saved: Vec<(ThreadHandle, SchedState)>,
}

impl SuspendedSiblings {
    /// Number of threads that were suspended.
    pub fn len(&self) -> usize {
        self.saved.len()
    }

    /// Whether no thread was suspended.
    pub fn is_empty(&self) -> bool {
        self.saved.is_empty()
    }

    /// Restore every saved scheduler state verbatim.
    pub fn resume<R: ThreadRegistry + ?Sized>(self, registry: &mut R) -> Result<(), BusFault> {
        let mut res = Ok(());
        for (thread, state) in self.saved {
            // keep going, so one bad slot doesn't leave the rest frozen
            if let Err(e) = registry.set_sched_state(thread, state) {
                warn!("failed to resume thread {}: {:?}", thread.0, e);
                res = Err(e);
            }
        }
        res
    }
}

/// Block every thread of the target except the current one, so that only
/// it advances while the target runs.
///
/// A no-op when the target has no thread facility active. If any thread
/// cannot be suspended, the ones already suspended are resumed again.
pub fn suspend_others<R: ThreadRegistry + ?Sized>(
    registry: &mut R,
) -> Result<SuspendedSiblings, BusFault> {
    let mut suspended = SuspendedSiblings::default();
    if !registry.is_active()? {
        return Ok(suspended);
    }

    let current = registry.current()?;
    let mut threads = Vec::new();
    registry.list(&mut |t| threads.push(t))?;

    for thread in threads.into_iter().filter(|t| *t != current) {
        let res = registry
            .sched_state(thread)
            .and_then(|state| registry.set_sched_state(thread, state.blocked()).map(|_| state));
        match res {
            Ok(state) => suspended.saved.push((thread, state)),
            Err(e) => {
                let _ = suspended.resume(registry);
                return Err(e);
            }
        }
    }

    if !suspended.is_empty() {
        debug!("suspended {} sibling thread(s)", suspended.len());
    }
    Ok(suspended)
}

/// Leave only the main thread runnable, ahead of killing the process.
pub fn terminate_all<R: ThreadRegistry + ?Sized>(registry: &mut R) -> Result<(), BusFault> {
    if !registry.is_active()? {
        return Ok(());
    }

    let main = registry.main_thread()?;
    let mut threads = Vec::new();
    registry.list(&mut |t| threads.push(t))?;

    for thread in threads {
        let state = registry.sched_state(thread)?;
        let state = if thread == main {
            state.runnable()
        } else {
            state.blocked()
        };
        registry.set_sched_state(thread, state)?;
    }
    Ok(())
}
