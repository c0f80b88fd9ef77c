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

#![deny(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unused_imports
)]
#![doc(test(attr(deny(warnings))))]

//! Request-line and status-line parsing for HTTP/1.0.
//!
//! This crate understands exactly as much of the wire format as a server that speaks
//! HTTP/1.0 and nothing else needs to: the request line (method, target, version) and
//! where the header block ends. It does not attempt to model HTTP/1.1 framing.

mod method;
mod raw_request;
mod status;
mod version;

pub mod h1;

pub use method::Method;
pub use status::Status;
pub use version::Version;
