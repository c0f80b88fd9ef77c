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

//! The per-connection record and its lightweight bookkeeping twin.
//!
//! A record never lives in two lists at once, but its *socket* and its *accounting* do end up
//! in different places while a job is in flight: the worker holds the socket to serve the
//! request, while `DispatchState` keeps a [`Ticket`] in `in_flight` so `complete` can find and
//! remove it by job id. `Ticket` is `Copy` and carries no ownership, so this split costs
//! nothing and sidesteps the aliasing the original design describes ("lives in two places").

use std::time::SystemTime;

use crate::list::Identified;
use crate::socket::Socket;

/// Bookkeeping for one job: its id and the timestamps that bracket admission and dispatch.
///
/// Held standalone in `in_flight`, and embedded in [`ConnectionRecord`] while the job is in
/// `waiting`.
#[derive(Debug, Clone, Copy)]
pub struct Ticket {
    job_id: u64,
    arrival: SystemTime,
    dispatch: Option<SystemTime>,
}

impl Ticket {
    /// A new ticket stamped with the current time as its arrival.
    pub fn new(job_id: u64, arrival: SystemTime) -> Self {
        Ticket { job_id, arrival, dispatch: None }
    }

    /// The job id assigned at acceptance.
    pub fn job_id(&self) -> u64 {
        self.job_id
    }

    /// Wall-clock time the connection was accepted.
    pub fn arrival(&self) -> SystemTime {
        self.arrival
    }

    /// Wall-clock time the job was picked up by a worker, if it has been.
    pub fn dispatch(&self) -> Option<SystemTime> {
        self.dispatch
    }

    /// Stamps the dispatch time. Called exactly once, by `DispatchState::take_work`.
    pub fn stamp_dispatch(&mut self, at: SystemTime) {
        self.dispatch = Some(at);
    }
}

impl Identified for Ticket {
    fn job_id(&self) -> u64 {
        self.job_id
    }
}

/// A connection together with the bookkeeping needed to track it through the waiting list.
#[derive(Debug)]
pub struct ConnectionRecord<S> {
    /// The connection handle. Owned here until the record is consumed.
    pub socket: S,
    /// Job id and timestamps.
    pub ticket: Ticket,
}

impl<S> ConnectionRecord<S> {
    /// Wraps `socket` with a freshly minted ticket.
    pub fn new(socket: S, job_id: u64, arrival: SystemTime) -> Self {
        ConnectionRecord { socket, ticket: Ticket::new(job_id, arrival) }
    }
}

impl<S> Identified for ConnectionRecord<S> {
    fn job_id(&self) -> u64 {
        self.ticket.job_id
    }
}

impl<S: Socket> ConnectionRecord<S> {
    /// Closes the underlying socket and consumes the record. Used by the acceptor and by
    /// overload policies to drop a connection without ever serving it.
    pub fn close(self) {
        let _ = self.socket.shutdown();
    }
}
