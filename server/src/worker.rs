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

//! A fixed worker thread: dequeues waiting jobs and serves them.

use std::net::TcpStream;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::warn;

use crate::dispatch::DispatchState;
use crate::handler;
use crate::stats::WorkerStats;

/// Runs forever on its own thread: takes the next waiting job, serves it, closes the
/// connection, then reports completion back to `dispatch`. Never returns.
pub fn run(thread_id: usize, dispatch: Arc<DispatchState<TcpStream>>, document_root: PathBuf) -> ! {
    let mut stats = WorkerStats::new(thread_id);

    loop {
        let mut record = dispatch.take_work();
        let job_id = record.ticket.job_id();

        if let Err(e) = handler::serve_request(&mut record.socket, &mut stats, &record.ticket, &document_root) {
            warn!(thread_id, job_id, error = %e, "request handling failed");
        }

        record.close();
        dispatch.complete(job_id);
    }
}
