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

//! Parses one HTTP/1.0 request and serves it, static file or CGI program alike.

use std::io::{self, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;

use memmap2::Mmap;
use parser::h1::{find_header_terminator, Request};
use parser::{Method, Status};
use tracing::warn;

use crate::record::Ticket;
use crate::socket::Socket;
use crate::stats::WorkerStats;

const MAX_HEADER_BYTES: usize = 8 * 1024;
const READ_CHUNK: usize = 512;
const DEFAULT_FILE: &str = "home.html";
const SERVER_HEADER: &str = "Server: bounded-http/0.1\r\n";

/// A short `text/html` body for an error response.
fn error_body(status: Status, cause: &str) -> String {
    format!(
        "<html><body bgcolor=\"ffffff\">\r\n{status}\r\n<p>{cause}</p>\r\n<hr>bounded-http\r\n</body></html>\r\n"
    )
}

/// The `Content-Type` to advertise for a static file, guessed from its extension. Unknown
/// extensions fall back to `text/plain`, matching how an unconfigured static file server
/// behaves rather than guessing wrong.
fn mime_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html") | Some("htm") => "text/html",
        Some("gif") => "image/gif",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        _ => "text/plain",
    }
}

/// Reads, parses, and answers one request on `socket`.
///
/// `stats` is mutated to reflect however this request resolved (served static, served
/// dynamic, or errored) before the corresponding response headers go out, so the counters in
/// the response always match what the caller can observe afterward.
pub fn serve_request<S: Socket>(
    socket: &mut S,
    stats: &mut WorkerStats,
    ticket: &Ticket,
    document_root: &Path,
) -> io::Result<()> {
    let header_bytes = match read_request_headers(socket) {
        Ok(buf) => buf,
        Err(_) => return respond_error(socket, stats, ticket, Status::NotImplemented, "bad request"),
    };

    let request = match Request::parse(&header_bytes) {
        Ok(r) => r,
        Err(_) => return respond_error(socket, stats, ticket, Status::NotImplemented, "unparseable request line"),
    };

    if request.method != Method::Get {
        return respond_error(socket, stats, ticket, Status::NotImplemented, "method not implemented");
    }

    let (is_dynamic, relative_path, query_string) = classify_target(request.target);
    let resolved = document_root.join(&relative_path);

    if is_dynamic {
        serve_dynamic(socket, stats, ticket, &resolved, &query_string)
    } else {
        serve_static(socket, stats, ticket, &resolved)
    }
}

/// Accumulates bytes from `socket` until the header block's terminating blank line appears.
/// Gives up once `MAX_HEADER_BYTES` is exceeded without finding one.
fn read_request_headers<S: Socket>(socket: &mut S) -> io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(READ_CHUNK);
    let mut chunk = [0u8; READ_CHUNK];

    loop {
        if let Some(end) = find_header_terminator(&buf) {
            buf.truncate(end);
            return Ok(buf);
        }
        if buf.len() >= MAX_HEADER_BYTES {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "request headers too large"));
        }

        let n = socket.read(&mut chunk)?;
        if n == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed before headers completed"));
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

/// Splits `target` into a dynamic/static flag, the path to resolve under the document root,
/// and the query string (empty if absent).
///
/// `cgi` anywhere in the path marks the request dynamic; `..` anywhere forces the safe
/// default page rather than being rejected; a trailing `/` appends the default file name.
fn classify_target(target: &str) -> (bool, PathBuf, String) {
    let (path_part, query) = match target.split_once('?') {
        Some((p, q)) => (p, q.to_string()),
        None => (target, String::new()),
    };

    // A ".." anywhere forces the safe default page, which is always served statically —
    // even if the rejected path also contained "cgi" — since the rewrite exists precisely
    // to avoid acting on an untrusted path.
    if path_part.contains("..") {
        return (false, PathBuf::from(DEFAULT_FILE), query);
    }

    let is_dynamic = path_part.contains("cgi");

    let mut relative = path_part.trim_start_matches('/').to_string();
    if relative.is_empty() || relative.ends_with('/') {
        relative.push_str(DEFAULT_FILE);
    }

    (is_dynamic, PathBuf::from(relative), query)
}

fn serve_static<S: Socket>(
    socket: &mut S,
    stats: &mut WorkerStats,
    ticket: &Ticket,
    path: &Path,
) -> io::Result<()> {
    let metadata = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return respond_error(socket, stats, ticket, Status::NotFound, "not found")
        }
        Err(_) => return respond_error(socket, stats, ticket, Status::Forbidden, "could not stat file"),
    };
    if !metadata.is_file() || metadata.permissions().mode() & 0o444 == 0 {
        return respond_error(socket, stats, ticket, Status::Forbidden, "not a readable regular file");
    }

    let file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(_) => return respond_error(socket, stats, ticket, Status::Forbidden, "could not open file"),
    };

    let content_type = mime_type(path);

    if metadata.len() == 0 {
        stats.record_static();
        return write_response(socket, stats, ticket, Status::Ok, content_type, b"");
    }

    // SAFETY: the mapping is read-only and this process does not truncate files under the
    // document root while serving them; external mutation during the mapping's lifetime is
    // the one hazard mmap-based serving accepts.
    let mmap = match unsafe { Mmap::map(&file) } {
        Ok(m) => m,
        Err(_) => return respond_error(socket, stats, ticket, Status::Forbidden, "could not map file"),
    };

    stats.record_static();
    write_response(socket, stats, ticket, Status::Ok, content_type, &mmap)
}

fn serve_dynamic<S: Socket>(
    socket: &mut S,
    stats: &mut WorkerStats,
    ticket: &Ticket,
    path: &Path,
    query_string: &str,
) -> io::Result<()> {
    let metadata = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(_) => return respond_error(socket, stats, ticket, Status::NotFound, "not found"),
    };

    if !metadata.is_file() || metadata.permissions().mode() & 0o111 == 0 {
        return respond_error(socket, stats, ticket, Status::Forbidden, "not executable");
    }

    let stdout = match socket.try_clone_stdio() {
        Ok(s) => s,
        Err(_) => return respond_error(socket, stats, ticket, Status::Forbidden, "cgi unsupported here"),
    };

    stats.record_dynamic();
    write_status_and_headers(socket, stats, ticket, Status::Ok)?;

    // Whatever the child writes to its stdout lands on the socket directly; a CGI script
    // that crashes mid-output is not surfaced as a server-side error, per the handler's
    // error-handling contract.
    match Command::new(path).env("QUERY_STRING", query_string).stdout(stdout).spawn() {
        Ok(mut child) => {
            let _ = child.wait();
        }
        Err(e) => warn!(path = %path.display(), error = %e, "cgi program failed to spawn"),
    }

    Ok(())
}

/// Writes the status line, the `Server` header, and the stats block, but no `Content-Length`
/// — used for dynamic responses, where the CGI child (not this server) owns the body and its
/// length is unknown up front.
fn write_status_and_headers<S: Socket>(
    socket: &mut S,
    stats: &WorkerStats,
    ticket: &Ticket,
    status: Status,
) -> io::Result<()> {
    let mut out = format!("HTTP/1.0 {status}\r\n{SERVER_HEADER}");
    out.push_str(&stats.header_block(ticket));
    out.push_str("\r\n");
    socket.write_all(out.as_bytes())
}

/// Writes a complete response this server controls end to end: status line, `Server`,
/// `Content-Length`, `Content-Type`, the stats block, then `body`.
fn write_response<S: Socket>(
    socket: &mut S,
    stats: &WorkerStats,
    ticket: &Ticket,
    status: Status,
    content_type: &str,
    body: &[u8],
) -> io::Result<()> {
    let mut out = format!(
        "HTTP/1.0 {status}\r\n{SERVER_HEADER}Content-Length: {}\r\nContent-Type: {content_type}\r\n",
        body.len()
    );
    out.push_str(&stats.header_block(ticket));
    out.push_str("\r\n");
    socket.write_all(out.as_bytes())?;
    socket.write_all(body)
}

fn respond_error<S: Socket>(
    socket: &mut S,
    stats: &mut WorkerStats,
    ticket: &Ticket,
    status: Status,
    cause: &str,
) -> io::Result<()> {
    stats.record_error();
    let body = error_body(status, cause);
    write_response(socket, stats, ticket, status, "text/html", body.as_bytes())
}

#[cfg(test)]
mod test {
    use std::io::{self, Cursor, Read, Write};
    use std::process::Stdio;
    use std::time::SystemTime;

    use tempfile::tempdir;

    use super::{classify_target, serve_request};
    use crate::record::Ticket;
    use crate::socket::Socket;
    use crate::stats::WorkerStats;

    #[derive(Debug)]
    struct LoopbackSocket {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl LoopbackSocket {
        fn new(request: &[u8]) -> Self {
            LoopbackSocket { input: Cursor::new(request.to_vec()), output: Vec::new() }
        }
    }

    impl Read for LoopbackSocket {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for LoopbackSocket {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.write(buf)
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Socket for LoopbackSocket {
        fn shutdown(&self) -> io::Result<()> {
            Ok(())
        }

        fn try_clone_stdio(&self) -> io::Result<Stdio> {
            Err(io::Error::new(io::ErrorKind::Unsupported, "no fd in tests"))
        }
    }

    fn ticket() -> Ticket {
        let mut t = Ticket::new(1, SystemTime::now());
        t.stamp_dispatch(SystemTime::now());
        t
    }

    #[test]
    fn classify_target_marks_cgi_paths_as_dynamic() {
        let (dynamic, path, query) = classify_target("/cgi-bin/adder?a=1&b=2");
        assert!(dynamic);
        assert_eq!("cgi-bin/adder", path.to_str().unwrap());
        assert_eq!("a=1&b=2", query);
    }

    #[test]
    fn classify_target_rewrites_dotdot_to_home() {
        let (dynamic, path, _) = classify_target("/../../etc/passwd");
        assert!(!dynamic);
        assert_eq!("home.html", path.to_str().unwrap());
    }

    #[test]
    fn classify_target_appends_default_file_for_directories() {
        let (_, path, _) = classify_target("/");
        assert_eq!("home.html", path.to_str().unwrap());
    }

    #[test]
    fn classify_target_dotdot_rewrite_wins_over_cgi_substring() {
        let (dynamic, path, _) = classify_target("/cgi-bin/../../etc/passwd");
        assert!(!dynamic);
        assert_eq!("home.html", path.to_str().unwrap());
    }

    #[test]
    fn serves_a_static_file() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("home.html"), b"<html>hi</html>").unwrap();

        let mut socket = LoopbackSocket::new(b"GET /home.html HTTP/1.0\r\n\r\n");
        let mut stats = WorkerStats::new(0);
        let ticket = ticket();

        serve_request(&mut socket, &mut stats, &ticket, dir.path()).unwrap();

        let response = String::from_utf8(socket.output).unwrap();
        assert!(response.starts_with("HTTP/1.0 200 OK\r\n"));
        assert!(response.contains("Stat-Thread-Static:: 1\r\n"));
        assert!(response.ends_with("<html>hi</html>"));
    }

    #[test]
    fn missing_file_yields_404() {
        let dir = tempdir().unwrap();
        let mut socket = LoopbackSocket::new(b"GET /nope.html HTTP/1.0\r\n\r\n");
        let mut stats = WorkerStats::new(0);
        let ticket = ticket();

        serve_request(&mut socket, &mut stats, &ticket, dir.path()).unwrap();

        let response = String::from_utf8(socket.output).unwrap();
        assert!(response.starts_with("HTTP/1.0 404 Not Found\r\n"));
        assert!(response.contains("Stat-Thread-Count:: 1\r\n"));
        assert!(response.contains("Stat-Thread-Static:: 0\r\n"));
    }

    #[test]
    fn non_get_method_yields_501() {
        let dir = tempdir().unwrap();
        let mut socket = LoopbackSocket::new(b"POST /home.html HTTP/1.0\r\n\r\n");
        let mut stats = WorkerStats::new(0);
        let ticket = ticket();

        serve_request(&mut socket, &mut stats, &ticket, dir.path()).unwrap();

        let response = String::from_utf8(socket.output).unwrap();
        assert!(response.starts_with("HTTP/1.0 501 Not Implemented\r\n"));
    }

    #[test]
    fn non_regular_file_yields_403() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("home.html")).unwrap();

        let mut socket = LoopbackSocket::new(b"GET /home.html HTTP/1.0\r\n\r\n");
        let mut stats = WorkerStats::new(0);
        let ticket = ticket();

        serve_request(&mut socket, &mut stats, &ticket, dir.path()).unwrap();

        let response = String::from_utf8(socket.output).unwrap();
        assert!(response.starts_with("HTTP/1.0 403 Forbidden\r\n"));
    }
}
