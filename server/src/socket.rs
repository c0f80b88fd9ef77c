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

//! Abstraction over the connection handle, so the dispatch core and the request handler can
//! be exercised against something other than a live `TcpStream`.

use std::fmt::Debug;
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::process::Stdio;

/// Everything the dispatch core and request handler need from a connection.
///
/// Implemented for [`std::net::TcpStream`] for production use; test code implements it for an
/// in-memory double to exercise admission, policy, and handler logic without binding a real
/// socket.
pub trait Socket: Read + Write + Send + Debug {
    /// Closes both halves of the connection. Called exactly once per connection, by whichever
    /// code path ends up owning it: the worker after a served request, or the policy that
    /// dropped it.
    fn shutdown(&self) -> io::Result<()>;

    /// Produces a [`Stdio`] the CGI child's stdout can be redirected into. Returns an error
    /// for sockets that have no underlying file descriptor to hand off, which static-only
    /// test doubles are free to do.
    fn try_clone_stdio(&self) -> io::Result<Stdio>;
}

impl Socket for TcpStream {
    fn shutdown(&self) -> io::Result<()> {
        TcpStream::shutdown(self, Shutdown::Both)
    }

    fn try_clone_stdio(&self) -> io::Result<Stdio> {
        Ok(Stdio::from(self.try_clone()?))
    }
}
