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

//! Overload policies: what `try_admit` does when the new connection would push
//! `waiting + in_flight` past capacity.

use std::sync::{Condvar, MutexGuard};

use rand::Rng;

use crate::dispatch::Lists;
use crate::record::ConnectionRecord;
use crate::socket::Socket;

/// The outcome of an admission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The new connection was pushed onto `waiting`.
    Admitted,
    /// The new connection was closed without being queued.
    Dropped,
}

/// One of the four overload strategies a deployment can select at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Block the acceptor until a slot frees up, then admit.
    Block,
    /// Drop the newly arrived connection (drop tail).
    DropTail,
    /// Evict the most recently queued waiting job, then admit the new one.
    DropHead,
    /// Evict `ceil(waiting/4)` waiting jobs chosen at random, then admit the new one.
    Random,
}

impl std::str::FromStr for Policy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "block" => Ok(Policy::Block),
            "dt" => Ok(Policy::DropTail),
            "dh" => Ok(Policy::DropHead),
            "random" => Ok(Policy::Random),
            other => Err(other.to_string()),
        }
    }
}

impl std::fmt::Display for Policy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Policy::Block => "block",
            Policy::DropTail => "dt",
            Policy::DropHead => "dh",
            Policy::Random => "random",
        };
        f.write_str(s)
    }
}

impl Policy {
    /// Applies this policy to `record` under the already-held dispatch lock.
    ///
    /// Called only when `size(waiting) + size(in_flight) + 1 > capacity`. `block` is the only
    /// variant that releases the lock (via `c_slot.wait`); every other variant runs entirely
    /// under `lists` and returns immediately. Returns the guard back to the caller, since
    /// `Condvar::wait` consumes and re-issues it.
    pub fn apply<'a, S: Socket>(
        &self,
        mut lists: MutexGuard<'a, Lists<S>>,
        capacity: usize,
        c_slot: &Condvar,
        record: ConnectionRecord<S>,
    ) -> (MutexGuard<'a, Lists<S>>, Admission) {
        match self {
            Policy::Block => {
                let mut record = Some(record);
                loop {
                    if lists.waiting.size() + lists.in_flight.size() + 1 <= capacity {
                        lists.waiting.push_tail(record.take().expect("taken once"));
                        return (lists, Admission::Admitted);
                    }
                    lists = c_slot.wait(lists).expect("dispatch mutex poisoned");
                }
            }
            Policy::DropTail => {
                record.close();
                (lists, Admission::Dropped)
            }
            Policy::DropHead => {
                if lists.waiting.is_empty() {
                    record.close();
                    return (lists, Admission::Dropped);
                }
                if let Some(evicted) = lists.waiting.pop_tail() {
                    evicted.close();
                }
                lists.waiting.push_tail(record);
                (lists, Admission::Admitted)
            }
            Policy::Random => {
                if lists.waiting.is_empty() {
                    record.close();
                    return (lists, Admission::Dropped);
                }

                // ceil(n/4) <= n for every n >= 1, so each of the k draws below always has a
                // shrinking-but-nonempty list to index into.
                let k = lists.waiting.size().div_ceil(4);
                let mut rng = rand::thread_rng();
                for _ in 0..k {
                    let idx = rng.gen_range(0..lists.waiting.size());
                    if let Some(evicted) = lists.waiting.remove_by_index(idx) {
                        evicted.close();
                    }
                }

                lists.waiting.push_tail(record);
                (lists, Admission::Admitted)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::Policy;

    #[test]
    fn parses_all_four_names() {
        assert_eq!(Policy::Block, "block".parse().unwrap());
        assert_eq!(Policy::DropTail, "dt".parse().unwrap());
        assert_eq!(Policy::DropHead, "dh".parse().unwrap());
        assert_eq!(Policy::Random, "random".parse().unwrap());
    }

    #[test]
    fn rejects_unknown_names() {
        assert!("frob".parse::<Policy>().is_err());
    }

    #[test]
    fn display_round_trips_through_from_str() {
        for p in [Policy::Block, Policy::DropTail, Policy::DropHead, Policy::Random] {
            assert_eq!(p, p.to_string().parse().unwrap());
        }
    }
}
