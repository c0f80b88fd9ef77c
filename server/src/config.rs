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

//! Command-line configuration.
//!
//! Positional arguments are accepted as raw strings rather than typed via `clap`'s own
//! `value_parser`, and validated by hand: the specification requires every out-of-range value
//! (not just malformed ones) to exit with status 1, whereas a `value_parser` failure in clap
//! exits with its own usage-error code. Missing or extra positional arguments still go through
//! clap's own usage path — that one case is an accepted deviation, noted alongside this module.

use std::path::PathBuf;

use clap::Parser;

use crate::error::ServerError;
use crate::policy::Policy;

#[derive(Parser, Debug)]
#[command(name = "server", about = "A bounded-admission HTTP/1.0 server")]
struct Cli {
    /// TCP port to listen on. Must be an integer greater than 1024.
    port: String,
    /// Number of worker threads to start. Must be a positive integer.
    threads: String,
    /// Maximum number of waiting + in-flight jobs. Must be a positive integer.
    queue_size: String,
    /// Overload policy: one of `block`, `dt`, `dh`, `random`.
    schedalg: String,
}

/// Fully validated startup configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listening port.
    pub port: u16,
    /// Number of worker threads to start.
    pub threads: usize,
    /// `waiting + in_flight` capacity.
    pub queue_size: usize,
    /// Overload policy to apply once the queue is full.
    pub policy: Policy,
    /// Directory static and dynamic content resolve under.
    pub document_root: PathBuf,
}

impl ServerConfig {
    /// Parses and validates `std::env::args()`.
    pub fn from_args() -> Result<Self, ServerError> {
        let cli = Cli::parse();
        Self::from_parts(&cli.port, &cli.threads, &cli.queue_size, &cli.schedalg)
    }

    fn from_parts(port: &str, threads: &str, queue_size: &str, schedalg: &str) -> Result<Self, ServerError> {
        let parsed_port: u16 = port.parse().map_err(|_| ServerError::InvalidPort(port.to_string()))?;
        if parsed_port <= 1024 {
            return Err(ServerError::InvalidPort(port.to_string()));
        }

        let parsed_threads: usize =
            threads.parse().map_err(|_| ServerError::InvalidThreadCount(threads.to_string()))?;
        if parsed_threads == 0 {
            return Err(ServerError::InvalidThreadCount(threads.to_string()));
        }

        let parsed_queue_size: usize =
            queue_size.parse().map_err(|_| ServerError::InvalidQueueSize(queue_size.to_string()))?;
        if parsed_queue_size == 0 {
            return Err(ServerError::InvalidQueueSize(queue_size.to_string()));
        }

        let policy: Policy = schedalg.parse().map_err(|_| ServerError::InvalidSchedAlg(schedalg.to_string()))?;

        Ok(ServerConfig {
            port: parsed_port,
            threads: parsed_threads,
            queue_size: parsed_queue_size,
            policy,
            document_root: PathBuf::from("public"),
        })
    }
}
