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

//! Startup-time failures.
//!
//! Nothing past startup uses this type: a bad `accept`, a request that can't be served, or
//! an overloaded queue are all handled locally (closed socket, error response, or policy
//! decision) rather than propagated as an `Error`.

use thiserror::Error;

/// Fatal configuration or startup failure. Every variant here corresponds to an exit code
/// of 1, per §6 of the admission model this server implements.
#[derive(Debug, Error)]
pub enum ServerError {
    /// `port` was not an integer greater than 1024.
    #[error("port must be an integer greater than 1024, got `{0}`")]
    InvalidPort(String),

    /// `threads` was not a positive integer.
    #[error("threads must be a positive integer, got `{0}`")]
    InvalidThreadCount(String),

    /// `queue-size` was not a positive integer.
    #[error("queue-size must be a positive integer, got `{0}`")]
    InvalidQueueSize(String),

    /// `schedalg` was not one of `block`, `dt`, `dh`, `random`.
    #[error("schedalg must be one of block, dt, dh, random, got `{0}`")]
    InvalidSchedAlg(String),

    /// The listening socket could not be created.
    #[error("failed to bind listening socket on port {port}: {source}")]
    Bind {
        /// The port that failed to bind.
        port: u16,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Every worker thread failed to spawn; there is nobody left to serve requests.
    #[error("failed to spawn any worker thread out of {requested} requested")]
    NoWorkersSurvived {
        /// The number of worker threads the operator asked for.
        requested: usize,
    },

    /// The acceptor thread itself could not be spawned.
    #[error("failed to spawn the acceptor thread: {source}")]
    AcceptorSpawnFailed {
        /// The underlying I/O error from `thread::Builder::spawn`.
        #[source]
        source: std::io::Error,
    },
}
