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

//! The request line: `Method SP Request-Target SP HTTP-Version CRLF`.

use core::str::from_utf8_unchecked;

use super::ParseError;
use crate::raw_request::RawRequest;
use crate::{Method, Version};

/// A parsed request line.
///
/// Borrows `target` out of the buffer it was parsed from, so it is valid only as long as
/// that buffer is. Everything past the request line (the header block) is ignored; the
/// caller is expected to already know where the header block ends, via
/// [`super::find_header_terminator`].
#[derive(Debug, PartialEq, Eq)]
pub struct Request<'a> {
    /// The request method.
    pub method: Method,
    /// The request target, e.g. `/index.html` or `/cgi-bin/count.cgi?a=1`.
    pub target: &'a str,
    /// The protocol version the client declared.
    pub version: Version,
}

impl<'a> Request<'a> {
    /// Parses the request line at the start of `buf`.
    ///
    /// # Example
    /// ```
    /// # use parser::h1::Request;
    /// # use parser::{Method, Version};
    /// let req = Request::parse(b"GET /home.html HTTP/1.0\r\n\r\n").unwrap();
    /// assert_eq!(Method::Get, req.method);
    /// assert_eq!("/home.html", req.target);
    /// assert_eq!(Version::H1_0, req.version);
    /// ```
    pub fn parse(buf: &'a [u8]) -> Result<Self, ParseError> {
        let mut cursor = RawRequest::new(buf);

        let method = Self::parse_method(&mut cursor)?;
        let target = Self::parse_target(&mut cursor)?;
        let version = Self::parse_version(&mut cursor)?;

        Ok(Request { method, target, version })
    }

    fn parse_method(cursor: &mut RawRequest<'a>) -> Result<Method, ParseError> {
        let token = cursor.take_until(|b| b == b' ');
        if token.is_empty() {
            return Err(ParseError::Method);
        }
        cursor.next(); // consume the separating space
        cursor.slice();
        Method::parse(token).ok_or(ParseError::Method)
    }

    fn parse_target(cursor: &mut RawRequest<'a>) -> Result<&'a str, ParseError> {
        let token = cursor.take_until(|b| b == b' ');
        if token.is_empty() || token.iter().any(u8::is_ascii_whitespace) {
            return Err(ParseError::Target);
        }
        cursor.next(); // consume the separating space
        cursor.slice();

        // SAFETY: token contains no bytes outside the printable ASCII range checked above,
        // which is a subset of valid UTF-8.
        Ok(unsafe { from_utf8_unchecked(token) })
    }

    fn parse_version(cursor: &mut RawRequest<'a>) -> Result<Version, ParseError> {
        let token = cursor.take_until(|b| b == b'\r');
        let version = match token {
            b"HTTP/1.0" => Version::H1_0,
            b"HTTP/1.1" => Version::H1_1,
            _ => return Err(ParseError::Version),
        };

        if cursor.next() != Some(b'\r') || cursor.next() != Some(b'\n') {
            return Err(ParseError::Version);
        }

        Ok(version)
    }
}

#[cfg(test)]
mod test {
    use super::Request;
    use crate::h1::ParseError;
    use crate::{Method, Version};

    #[test]
    fn parses_a_well_formed_get() {
        let req = Request::parse(b"GET /home.html HTTP/1.0\r\n\r\n").unwrap();
        assert_eq!(Method::Get, req.method);
        assert_eq!("/home.html", req.target);
        assert_eq!(Version::H1_0, req.version);
    }

    #[test]
    fn parses_a_target_with_query_string() {
        let req = Request::parse(b"GET /cgi-bin/adder?a=1&b=2 HTTP/1.0\r\n\r\n").unwrap();
        assert_eq!("/cgi-bin/adder?a=1&b=2", req.target);
    }

    #[test]
    fn rejects_unknown_method() {
        let err = Request::parse(b"FROB / HTTP/1.0\r\n\r\n").unwrap_err();
        assert_eq!(ParseError::Method, err);
    }

    #[test]
    fn rejects_missing_version() {
        let err = Request::parse(b"GET /\r\n\r\n").unwrap_err();
        assert_eq!(ParseError::Version, err);
    }
}
