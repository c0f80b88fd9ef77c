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

#![deny(missing_docs, missing_debug_implementations, rust_2018_idioms, unused_imports)]
#![doc(test(attr(deny(warnings))))]

//! A bounded-admission HTTP/1.0 server.
//!
//! The interesting part of this crate is the admission/dispatch core in [`dispatch`]: one
//! mutex, two condition variables, two lists, and a pluggable [`policy::Policy`] that decides
//! what happens when the queue is full. [`acceptor`] and [`worker`] are the two thread roles
//! built on top of it; [`handler`] is the HTTP/1.0 request/response logic they call into.

pub mod acceptor;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod handler;
pub mod list;
pub mod policy;
pub mod record;
pub mod socket;
pub mod stats;
pub mod worker;
