// Copyright 2022 Ryan Seipp
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The admission/dispatch core: one mutex, two condition variables, two lists.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::SystemTime;

use crate::list::ConnectionList;
use crate::policy::{Admission, Policy};
use crate::record::{ConnectionRecord, Ticket};
use crate::socket::Socket;

/// The two lists the dispatch lock protects.
///
/// `waiting` holds full records (sockets included) that have been admitted but not yet picked
/// up. `in_flight` holds only the bookkeeping [`Ticket`] for a job a worker is serving — the
/// socket itself has already moved out to the worker's stack via [`DispatchState::take_work`].
/// This split is what lets the Rust version model "the record is in the in-flight list while
/// the worker has it" without aliasing: the full record is in exactly one place (the worker),
/// and the list only ever holds a `Copy` receipt.
#[derive(Debug, Default)]
pub struct Lists<S> {
    pub(crate) waiting: ConnectionList<ConnectionRecord<S>>,
    pub(crate) in_flight: ConnectionList<Ticket>,
}

/// Shared state between the acceptor thread and the worker pool.
///
/// Exposes exactly the three operations the admission model is specified in terms of:
/// [`try_admit`](Self::try_admit), [`take_work`](Self::take_work), and
/// [`complete`](Self::complete). All three acquire the internal lock; none are ever called
/// while already holding it.
#[derive(Debug)]
pub struct DispatchState<S> {
    capacity: usize,
    policy: Policy,
    lists: Mutex<Lists<S>>,
    c_work: Condvar,
    c_slot: Condvar,
    next_job_id: AtomicU64,
}

impl<S: Socket> DispatchState<S> {
    /// A fresh dispatch core with no admitted work, enforcing `capacity` under `policy`.
    pub fn new(capacity: usize, policy: Policy) -> Self {
        DispatchState {
            capacity,
            policy,
            lists: Mutex::new(Lists { waiting: ConnectionList::new(), in_flight: ConnectionList::new() }),
            c_work: Condvar::new(),
            c_slot: Condvar::new(),
            next_job_id: AtomicU64::new(0),
        }
    }

    /// Allocates the next job id. Called by the acceptor before acquiring the dispatch lock,
    /// so ids are assigned in acceptance order without contending on `M`.
    pub fn next_job_id(&self) -> u64 {
        self.next_job_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Attempts to admit `record`. If admitting it would exceed capacity, the configured
    /// policy decides whether to admit anyway (evicting something else), drop `record`, or
    /// block until a slot frees.
    pub fn try_admit(&self, record: ConnectionRecord<S>) -> Admission {
        let lists = self.lists.lock().expect("dispatch mutex poisoned");

        let (lists, admission) = if lists.waiting.size() + lists.in_flight.size() + 1 > self.capacity {
            self.policy.apply(lists, self.capacity, &self.c_slot, record)
        } else {
            let mut lists = lists;
            lists.waiting.push_tail(record);
            (lists, Admission::Admitted)
        };

        drop(lists);
        if admission == Admission::Admitted {
            self.c_work.notify_one();
        }
        admission
    }

    /// Blocks until a waiting job is available, then dequeues it and moves its bookkeeping
    /// into `in_flight`. Returns the full record — socket included — to the caller.
    pub fn take_work(&self) -> ConnectionRecord<S> {
        let mut lists = self.lists.lock().expect("dispatch mutex poisoned");
        loop {
            if let Some(mut record) = lists.waiting.pop_head() {
                record.ticket.stamp_dispatch(SystemTime::now());
                lists.in_flight.push_head(record.ticket);
                return record;
            }
            lists = self.c_work.wait(lists).expect("dispatch mutex poisoned");
        }
    }

    /// Marks `job_id` as finished: removes its ticket from `in_flight` and wakes one acceptor
    /// blocked waiting for a slot.
    pub fn complete(&self, job_id: u64) {
        let mut lists = self.lists.lock().expect("dispatch mutex poisoned");
        lists.in_flight.remove_by_id(job_id);
        drop(lists);
        self.c_slot.notify_one();
    }

    /// Current `size(waiting) + size(in_flight)`. Exposed for tests and observability only;
    /// no part of the dispatch core reads it outside the lock it returns it under.
    #[cfg(test)]
    pub fn occupancy(&self) -> usize {
        let lists = self.lists.lock().expect("dispatch mutex poisoned");
        lists.waiting.size() + lists.in_flight.size()
    }
}

#[cfg(test)]
mod test {
    use std::fmt;
    use std::io::{self, Read, Write};
    use std::process::Stdio;
    use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, SystemTime};

    use super::DispatchState;
    use crate::policy::{Admission, Policy};
    use crate::record::ConnectionRecord;
    use crate::socket::Socket;

    #[derive(Debug)]
    struct FakeSocket {
        closed: Arc<AtomicBool>,
    }

    impl FakeSocket {
        fn new() -> (Self, Arc<AtomicBool>) {
            let closed = Arc::new(AtomicBool::new(false));
            (FakeSocket { closed: closed.clone() }, closed)
        }
    }

    impl Read for FakeSocket {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Ok(0)
        }
    }

    impl Write for FakeSocket {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Socket for FakeSocket {
        fn shutdown(&self) -> io::Result<()> {
            self.closed.store(true, AtomicOrdering::SeqCst);
            Ok(())
        }

        fn try_clone_stdio(&self) -> io::Result<Stdio> {
            Err(io::Error::new(io::ErrorKind::Unsupported, "FakeSocket has no fd"))
        }
    }

    impl fmt::Display for FakeSocket {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "FakeSocket")
        }
    }

    fn record(state: &DispatchState<FakeSocket>) -> (ConnectionRecord<FakeSocket>, Arc<AtomicBool>) {
        let (socket, closed) = FakeSocket::new();
        (ConnectionRecord::new(socket, state.next_job_id(), SystemTime::now()), closed)
    }

    #[test]
    fn admits_up_to_capacity() {
        let state = DispatchState::new(2, Policy::DropTail);
        let (r1, _) = record(&state);
        let (r2, _) = record(&state);
        assert_eq!(Admission::Admitted, state.try_admit(r1));
        assert_eq!(Admission::Admitted, state.try_admit(r2));
        assert_eq!(2, state.occupancy());
    }

    #[test]
    fn drop_tail_closes_the_new_connection_over_capacity() {
        let state = DispatchState::new(1, Policy::DropTail);
        let (r1, _) = record(&state);
        let (r2, closed2) = record(&state);
        assert_eq!(Admission::Admitted, state.try_admit(r1));
        assert_eq!(Admission::Dropped, state.try_admit(r2));
        assert!(closed2.load(AtomicOrdering::SeqCst));
        assert_eq!(1, state.occupancy());
    }

    #[test]
    fn drop_head_evicts_tail_of_waiting_and_admits_new() {
        // waiting holds only records never taken by a worker, so capacity 1 here means the
        // worker never calls take_work; everything stays in `waiting`.
        let state = DispatchState::new(2, Policy::DropHead);
        let (a, _closed_a) = record(&state);
        let (b, closed_b) = record(&state);
        let (c, _closed_c) = record(&state);
        assert_eq!(Admission::Admitted, state.try_admit(a));
        assert_eq!(Admission::Admitted, state.try_admit(b));
        // third push exceeds capacity 2; dh evicts tail of waiting (b) then admits c
        assert_eq!(Admission::Admitted, state.try_admit(c));
        assert!(closed_b.load(AtomicOrdering::SeqCst));
        assert_eq!(2, state.occupancy());
    }

    #[test]
    fn take_work_moves_ticket_into_in_flight() {
        let state = DispatchState::new(2, Policy::DropTail);
        let (r1, _) = record(&state);
        state.try_admit(r1);
        let taken = state.take_work();
        assert_eq!(1, state.occupancy());
        state.complete(taken.ticket.job_id());
        assert_eq!(0, state.occupancy());
    }

    #[test]
    fn random_drop_removes_exactly_ceil_quarter_of_waiting() {
        // Mirrors the documented scenario: Q=9, one job in flight, 8 in waiting, an
        // 11th-overall connection arrives. ceil(8/4) = 2 waiting jobs get evicted.
        let state = DispatchState::new(9, Policy::Random);

        let (busy, _busy_closed) = record(&state);
        state.try_admit(busy);
        let in_flight_record = state.take_work();

        let mut closed_flags = Vec::new();
        for _ in 0..8 {
            let (r, closed) = record(&state);
            state.try_admit(r);
            closed_flags.push(closed);
        }
        assert_eq!(9, state.occupancy());

        let (overflow, _overflow_closed) = record(&state);
        state.try_admit(overflow);

        let closed_count = closed_flags.iter().filter(|c| c.load(AtomicOrdering::SeqCst)).count();
        assert_eq!(2, closed_count);
        assert_eq!(8, state.occupancy());

        state.complete(in_flight_record.ticket.job_id());
        assert_eq!(7, state.occupancy());
    }

    #[test]
    fn block_policy_waits_for_a_freed_slot_then_admits() {
        // S3/S7: with Q=1 and one job already in flight, a second admission attempt under
        // `block` must not return until the in-flight job completes, and must then succeed.
        let state = Arc::new(DispatchState::new(1, Policy::Block));
        let (busy, _busy_closed) = record(&state);
        state.try_admit(busy);
        let in_flight = state.take_work();

        let (blocked, blocked_closed) = record(&state);
        let blocker = {
            let state = Arc::clone(&state);
            thread::spawn(move || state.try_admit(blocked))
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!blocker.is_finished(), "try_admit should still be blocked on c_slot");
        assert!(!blocked_closed.load(AtomicOrdering::SeqCst));

        state.complete(in_flight.ticket.job_id());

        let admission = blocker.join().expect("blocked admitter thread panicked");
        assert_eq!(Admission::Admitted, admission);
        assert_eq!(1, state.occupancy());
    }
}
