use core::convert::TryFrom;

use crate::engine::{BusExt, TargetContext};
use crate::hal::{Bus, BusFault, SchedState, ThreadHandle, ThreadRegistry};

use super::{prc, pth, work_area};

/// [`ThreadRegistry`] over the Human68k process table.
///
/// Threads created by libpthread each own a process table slot whose
/// communication buffer points at a `'Pth1'`-tagged block. Those blocks
/// form a list headed by the main thread's block. A thread's handle is its
/// slot index in the process table.
///
/// Nothing is cached: the table is walked again on every call, since the
/// target may have created or reaped threads since the last stop.
pub struct Human68kThreads<B: Bus> {
    bus: B,
}

impl<B: Bus> Human68kThreads<B> {
    /// Walk the process table through `bus`.
    pub fn new(bus: B) -> Self {
        Human68kThreads { bus }
    }

    fn table(&mut self) -> Result<u32, BusFault> {
        self.bus.read_u32(work_area::PRC_TABLE)
    }

    fn slot_count(&mut self) -> Result<u32, BusFault> {
        Ok(u32::from(self.bus.read_u16(work_area::PRC_COUNT)?) + 1)
    }

    fn slot(&mut self, thread: ThreadHandle) -> Result<u32, BusFault> {
        let table = self.table()?;
        Ok(table.wrapping_add(u32::from(thread.0) * work_area::PRC_SIZE))
    }

    /// Find the main thread's `'Pth1'` block, if any slot carries one.
    fn list_head(&mut self) -> Result<Option<u32>, BusFault> {
        let table = self.table()?;
        for i in 0..self.slot_count()? {
            let slot = table.wrapping_add(i * work_area::PRC_SIZE);
            let buf = self.bus.read_u32(slot + prc::BUF_PTR)?;
            if buf == 0 || buf & 1 != 0 {
                continue;
            }
            // a stale buffer pointer may well point into the void
            match self.bus.read_u32(buf + pth::MAGIC_OFF) {
                Ok(pth::MAGIC) => {}
                _ => continue,
            }
            let main = self.bus.read_u32(buf + pth::MAIN)?;
            if main != 0 {
                return Ok(Some(main));
            }
        }
        Ok(None)
    }

    fn handle_of(&mut self, block: u32) -> Result<ThreadHandle, BusFault> {
        let tid = self.bus.read_u32(block + pth::TID)?;
        let tid = u16::try_from(tid).map_err(|_| BusFault { addr: block + pth::TID })?;
        Ok(ThreadHandle(tid))
    }
}

impl<B: Bus> ThreadRegistry for Human68kThreads<B> {
    fn is_active(&mut self) -> Result<bool, BusFault> {
        Ok(self.list_head()?.is_some())
    }

    fn list(&mut self, thread: &mut dyn FnMut(ThreadHandle)) -> Result<(), BusFault> {
        let mut block = match self.list_head()? {
            Some(head) => head,
            None => return Ok(()),
        };
        // bounded by the table size in case the list is corrupt
        for _ in 0..self.slot_count()? {
            thread(self.handle_of(block)?);
            block = self.bus.read_u32(block + pth::NEXT)?;
            if block == 0 {
                return Ok(());
            }
        }
        warn!("thread list longer than the process table, truncating");
        Ok(())
    }

    fn current(&mut self) -> Result<ThreadHandle, BusFault> {
        let table = self.table()?;
        let current = self.bus.read_u32(work_area::PRC_CURRENT)?;
        let index = current.wrapping_sub(table) / work_area::PRC_SIZE;
        let index = u16::try_from(index).map_err(|_| BusFault {
            addr: work_area::PRC_CURRENT,
        })?;
        Ok(ThreadHandle(index))
    }

    fn main_thread(&mut self) -> Result<ThreadHandle, BusFault> {
        match self.list_head()? {
            Some(head) => self.handle_of(head),
            None => Ok(ThreadHandle(0)),
        }
    }

    fn sched_state(&mut self, thread: ThreadHandle) -> Result<SchedState, BusFault> {
        let slot = self.slot(thread)?;
        Ok(SchedState {
            wait_flag: self.bus.read_u8(slot + prc::WAIT_FLAG)?,
            counter: self.bus.read_u8(slot + prc::COUNTER)?,
            wait_time: self.bus.read_u32(slot + prc::WAIT_TIME)?,
        })
    }

    fn set_sched_state(&mut self, thread: ThreadHandle, state: SchedState) -> Result<(), BusFault> {
        let slot = self.slot(thread)?;
        self.bus.write_u8(slot + prc::WAIT_FLAG, state.wait_flag)?;
        self.bus.write_u8(slot + prc::COUNTER, state.counter)?;
        self.bus.write_u32(slot + prc::WAIT_TIME, state.wait_time)
    }

    fn saved_context(&mut self, thread: ThreadHandle) -> Result<TargetContext, BusFault> {
        let slot = self.slot(thread)?;
        let mut ctx = TargetContext::default();
        for (i, d) in ctx.d.iter_mut().enumerate() {
            *d = self.bus.read_u32(slot + prc::D + 4 * i as u32)?;
        }
        for (i, a) in ctx.a.iter_mut().take(7).enumerate() {
            *a = self.bus.read_u32(slot + prc::A + 4 * i as u32)?;
        }
        ctx.sr = u32::from(self.bus.read_u16(slot + prc::SR)?);
        ctx.pc = self.bus.read_u32(slot + prc::PC)?;
        ctx.usp = self.bus.read_u32(slot + prc::USP)?;
        ctx.ssp = self.bus.read_u32(slot + prc::SSP)?;
        ctx.update_sp();
        Ok(ctx)
    }

    fn name(&mut self, thread: ThreadHandle, buf: &mut [u8]) -> Result<usize, BusFault> {
        let slot = self.slot(thread)?;
        let mut name = [0; prc::NAME_LEN];
        self.bus.read_bytes(slot + prc::NAME, &mut name)?;
        let len = name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(name.len())
            .min(buf.len());
        buf[..len].copy_from_slice(&name[..len]);
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::mock::MockBus;

    const TABLE: u32 = 0x10000;

    fn slot(i: u32) -> u32 {
        TABLE + i * work_area::PRC_SIZE
    }

    /// Three slots: the main thread in slot 0, a worker in slot 2, slot 1
    /// unused. The worker is current.
    fn machine() -> MockBus {
        let mut bus = MockBus::new(0x20000);
        bus.load_u32(work_area::PRC_TABLE, TABLE);
        bus.load_u32(work_area::PRC_CURRENT, slot(2));
        bus.load_u16(work_area::PRC_COUNT, 2);

        let main_pi = 0x18000;
        let worker_pi = 0x18100;
        for &(pi, tid, next) in &[(main_pi, 0, worker_pi), (worker_pi, 2, 0)] {
            bus.load_u32(pi + pth::MAGIC_OFF, pth::MAGIC);
            bus.load_u32(pi + pth::TID, tid);
            bus.load_u32(pi + pth::MAIN, main_pi);
            bus.load_u32(pi + pth::NEXT, next);
            bus.load_u32(slot(tid) + prc::BUF_PTR, pi);
        }

        bus.load(slot(0) + prc::NAME, b"main\0");
        bus.load(slot(2) + prc::NAME, b"worker-with-a-long-name");
        bus.load(slot(2) + prc::WAIT_FLAG, &[0x00, 0x07]);
        bus.load_u32(slot(2) + prc::WAIT_TIME, 100);
        bus
    }

    #[test]
    fn walks_thread_list() {
        let mut threads = Human68kThreads::new(machine());
        assert!(threads.is_active().unwrap());

        let mut seen = alloc::vec::Vec::new();
        threads.list(&mut |h| seen.push(h)).unwrap();
        assert_eq!(seen, [ThreadHandle(0), ThreadHandle(2)]);

        assert_eq!(threads.current().unwrap(), ThreadHandle(2));
        assert_eq!(threads.main_thread().unwrap(), ThreadHandle(0));
    }

    #[test]
    fn inactive_without_magic() {
        let mut bus = MockBus::new(0x20000);
        bus.load_u32(work_area::PRC_TABLE, TABLE);
        bus.load_u32(work_area::PRC_CURRENT, TABLE);
        bus.load_u16(work_area::PRC_COUNT, 3);
        // buffer pointer past the end of RAM is skipped, not an error
        bus.load_u32(slot(1) + prc::BUF_PTR, 0x00f0_0000);

        let mut threads = Human68kThreads::new(bus);
        assert!(!threads.is_active().unwrap());
        let mut count = 0;
        threads.list(&mut |_| count += 1).unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn sched_state_round_trip() {
        let mut threads = Human68kThreads::new(machine());
        let state = threads.sched_state(ThreadHandle(2)).unwrap();
        assert_eq!(
            state,
            SchedState {
                wait_flag: 0,
                counter: 7,
                wait_time: 100
            }
        );

        threads
            .set_sched_state(ThreadHandle(2), state.blocked())
            .unwrap();
        let blocked = threads.sched_state(ThreadHandle(2)).unwrap();
        assert_eq!(blocked.wait_flag, SchedState::WAITING);
        assert_eq!(blocked.wait_time, 0);
        assert_eq!(blocked.counter, 7);
    }

    #[test]
    fn names_are_truncated() {
        let mut threads = Human68kThreads::new(machine());
        let mut buf = [0; 32];
        let n = threads.name(ThreadHandle(0), &mut buf).unwrap();
        assert_eq!(&buf[..n], b"main");
        let n = threads.name(ThreadHandle(2), &mut buf).unwrap();
        assert_eq!(&buf[..n], b"worker-with-a-lo");
    }

    #[test]
    fn saved_context_projects_stack_pointer() {
        let mut bus = machine();
        let s = slot(2);
        bus.load_u32(s + prc::D, 0x1111_1111);
        bus.load_u32(s + prc::A + 4 * 6, 0x6666_6666);
        bus.load_u16(s + prc::SR, 0x0004);
        bus.load_u32(s + prc::PC, 0x6802);
        bus.load_u32(s + prc::USP, 0xa000);
        bus.load_u32(s + prc::SSP, 0xb000);

        let mut threads = Human68kThreads::new(bus);
        let ctx = threads.saved_context(ThreadHandle(2)).unwrap();
        assert_eq!(ctx.d[0], 0x1111_1111);
        assert_eq!(ctx.a[6], 0x6666_6666);
        assert_eq!(ctx.a[7], 0xa000);
        assert_eq!(ctx.sr, 0x0004);
        assert_eq!(ctx.pc, 0x6802);
    }
}
