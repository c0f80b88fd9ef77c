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

//! Entry point: parses configuration, binds the listener, and starts the acceptor plus the
//! fixed worker pool.

use std::net::TcpListener;
use std::sync::Arc;
use std::thread;

use server::config::ServerConfig;
use server::dispatch::DispatchState;
use server::error::ServerError;
use server::{acceptor, worker};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = match ServerConfig::from_args() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("usage error: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(config) {
        eprintln!("fatal error: {e}");
        std::process::exit(1);
    }
}

fn run(config: ServerConfig) -> Result<(), ServerError> {
    let listener = TcpListener::bind(("0.0.0.0", config.port))
        .map_err(|source| ServerError::Bind { port: config.port, source })?;

    let dispatch = Arc::new(DispatchState::new(config.queue_size, config.policy));

    let mut handles = Vec::with_capacity(config.threads);
    for thread_id in 0..config.threads {
        let dispatch = Arc::clone(&dispatch);
        let document_root = config.document_root.clone();
        match thread::Builder::new()
            .name(format!("worker-{thread_id}"))
            .spawn(move || worker::run(thread_id, dispatch, document_root))
        {
            Ok(handle) => handles.push(handle),
            Err(e) => {
                tracing::warn!(thread_id, error = %e, "failed to spawn worker thread, continuing with fewer workers")
            }
        }
    }

    if handles.is_empty() {
        return Err(ServerError::NoWorkersSurvived { requested: config.threads });
    }

    let acceptor_dispatch = Arc::clone(&dispatch);
    let acceptor_handle = thread::Builder::new()
        .name("acceptor".to_string())
        .spawn(move || acceptor::run(listener, acceptor_dispatch))
        .map_err(|source| ServerError::AcceptorSpawnFailed { source })?;

    let _ = acceptor_handle.join();
    for handle in handles {
        let _ = handle.join();
    }

    Ok(())
}
