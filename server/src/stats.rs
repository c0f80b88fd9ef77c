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

//! Per-worker counters and the `Stat-*` header block every response carries.

use std::fmt::Write as _;
use std::time::SystemTime;

use crate::record::Ticket;

/// Counters owned by a single worker thread. Never shared across threads, so every field can
/// be a plain integer rather than an atomic.
#[derive(Debug, Clone, Copy)]
pub struct WorkerStats {
    thread_id: usize,
    total: u64,
    static_count: u64,
    dynamic_count: u64,
}

impl WorkerStats {
    /// A fresh, zeroed counter block for the worker assigned index `thread_id`.
    pub fn new(thread_id: usize) -> Self {
        WorkerStats { thread_id, total: 0, static_count: 0, dynamic_count: 0 }
    }

    /// Increments `total` and `static_count`. Call immediately before writing the response
    /// headers for a served static file.
    pub fn record_static(&mut self) {
        self.total += 1;
        self.static_count += 1;
    }

    /// Increments `total` and `dynamic_count`. Call immediately before writing the response
    /// headers for a served CGI program.
    pub fn record_dynamic(&mut self) {
        self.total += 1;
        self.dynamic_count += 1;
    }

    /// Increments `total` only. Call immediately before writing an error response; neither
    /// `static_count` nor `dynamic_count` reflects a request that never resolved to content.
    pub fn record_error(&mut self) {
        self.total += 1;
    }

    /// Renders the six `Stat-*` headers for `ticket`, in the fixed order every response uses.
    ///
    /// Panics only if `ticket` has no dispatch timestamp yet, which would indicate the worker
    /// invoked the handler before calling `take_work` — a programming error, not a runtime
    /// condition.
    pub fn header_block(&self, ticket: &Ticket) -> String {
        let dispatch = ticket.dispatch().expect("ticket dispatched before handler runs");
        let mut out = String::with_capacity(192);
        let _ = writeln!(out, "Stat-Req-Arrival:: {}\r", format_timestamp(ticket.arrival()));
        let _ = writeln!(out, "Stat-Req-Dispatch:: {}\r", format_elapsed(ticket.arrival(), dispatch));
        let _ = writeln!(out, "Stat-Thread-Id:: {}\r", self.thread_id);
        let _ = writeln!(out, "Stat-Thread-Count:: {}\r", self.total);
        let _ = writeln!(out, "Stat-Thread-Static:: {}\r", self.static_count);
        let _ = writeln!(out, "Stat-Thread-Dynamic:: {}\r", self.dynamic_count);
        out
    }
}

/// Formats `at`, relative to the Unix epoch, as `<sec>.<usec>` with zero-padded microseconds.
fn format_timestamp(at: SystemTime) -> String {
    let since_epoch = at.duration_since(std::time::UNIX_EPOCH).unwrap_or_default();
    format!("{}.{:06}", since_epoch.as_secs(), since_epoch.subsec_micros())
}

/// Formats `later - earlier` as `<sec>.<usec>` with zero-padded microseconds.
fn format_elapsed(earlier: SystemTime, later: SystemTime) -> String {
    let elapsed = later.duration_since(earlier).unwrap_or_default();
    format!("{}.{:06}", elapsed.as_secs(), elapsed.subsec_micros())
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::*;

    #[test]
    fn record_static_increments_total_and_static_count() {
        let mut stats = WorkerStats::new(0);
        stats.record_static();
        assert_eq!(1, stats.total);
        assert_eq!(1, stats.static_count);
        assert_eq!(0, stats.dynamic_count);
    }

    #[test]
    fn record_error_increments_only_total() {
        let mut stats = WorkerStats::new(0);
        stats.record_static();
        stats.record_error();
        assert_eq!(2, stats.total);
        assert_eq!(1, stats.static_count);
        assert_eq!(0, stats.dynamic_count);
    }

    #[test]
    fn stats_sequence_matches_the_documented_scenario() {
        let mut stats = WorkerStats::new(0);
        stats.record_static();
        assert_eq!((1, 1, 0), (stats.total, stats.static_count, stats.dynamic_count));
        stats.record_dynamic();
        assert_eq!((2, 1, 1), (stats.total, stats.static_count, stats.dynamic_count));
        stats.record_error();
        assert_eq!((3, 1, 1), (stats.total, stats.static_count, stats.dynamic_count));
        stats.record_static();
        assert_eq!((4, 2, 1), (stats.total, stats.static_count, stats.dynamic_count));
    }

    #[test]
    fn header_block_reports_elapsed_dispatch_wait() {
        let arrival = std::time::UNIX_EPOCH + Duration::from_secs(1);
        let mut ticket = Ticket::new(7, arrival);
        ticket.stamp_dispatch(arrival + Duration::from_millis(250));

        let stats = WorkerStats::new(3);
        let block = stats.header_block(&ticket);

        assert!(block.contains("Stat-Req-Arrival:: 1.000000\r\n"));
        assert!(block.contains("Stat-Req-Dispatch:: 0.250000\r\n"));
        assert!(block.contains("Stat-Thread-Id:: 3\r\n"));
    }
}
