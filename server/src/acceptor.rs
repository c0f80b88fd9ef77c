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

//! The single acceptor thread: accepts connections and admits them into the dispatch core.

use std::net::TcpListener;
use std::sync::Arc;
use std::time::SystemTime;

use tracing::{info, warn};

use crate::dispatch::DispatchState;
use crate::record::ConnectionRecord;

/// Runs forever: `accept`s a connection, stamps its arrival time and job id, and hands it to
/// `dispatch`. Never returns; there is no graceful shutdown path.
pub fn run(listener: TcpListener, dispatch: Arc<DispatchState<std::net::TcpStream>>) -> ! {
    info!(local_addr = ?listener.local_addr().ok(), "acceptor listening");

    loop {
        let (socket, peer) = match listener.accept() {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "accept failed, continuing");
                continue;
            }
        };

        let arrival = SystemTime::now();
        let job_id = dispatch.next_job_id();
        let record = ConnectionRecord::new(socket, job_id, arrival);

        match dispatch.try_admit(record) {
            crate::policy::Admission::Admitted => {
                tracing::debug!(job_id, %peer, "admitted");
            }
            crate::policy::Admission::Dropped => {
                tracing::debug!(job_id, %peer, "dropped under overload policy");
            }
        }
    }
}
