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

//! HTTP/1.0 request-line parsing.

use core::fmt::Display;

mod request;

pub use request::Request;

/// Possible failures while parsing a request line.
#[derive(Debug, PartialEq, Eq)]
pub enum ParseError {
    /// Invalid or unrecognized byte in the method token.
    Method,
    /// Invalid byte, or missing whitespace, in the request target.
    Target,
    /// Invalid or missing HTTP version token.
    Version,
}

impl ParseError {
    fn description_str(&self) -> &'static str {
        match self {
            ParseError::Method => "invalid token in method",
            ParseError::Target => "invalid token in target",
            ParseError::Version => "invalid version",
        }
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description_str())
    }
}

impl std::error::Error for ParseError {}

/// Result whose `Err` variant is [`ParseError`].
pub type ParseResult<T> = std::result::Result<T, ParseError>;

/// Locates the end of the header block (the first blank line) in a buffer accumulated from
/// the socket.
///
/// Returns the offset of the first byte *after* the terminating `\r\n\r\n`, or `None` if the
/// buffer does not yet contain a complete header block. Callers use this to know when they
/// have read enough to hand the buffer to [`Request::parse`].
pub fn find_header_terminator(buf: &[u8]) -> Option<usize> {
    buf.windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|pos| pos + 4)
}
