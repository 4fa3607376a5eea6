//! Minimal HTTP/1.1 framing for the upload request

use alloc::format;
use alloc::vec::Vec;

use super::NetError;

/// Frame a `POST` with a JSON body. The connection is closed after the
/// response.
pub fn build_post(host: &str, path: &str, body: &[u8]) -> Vec<u8> {
    let head = format!(
        "POST {path} HTTP/1.1\r\n\
         Host: {host}\r\n\
         Content-Type: application/json\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n",
        body.len()
    );
    let mut request = Vec::with_capacity(head.len() + body.len());
    request.extend_from_slice(head.as_bytes());
    request.extend_from_slice(body);
    request
}

/// Status code from the start of a response, e.g. `HTTP/1.1 302 Found`.
///
/// Only the status line needs to have arrived.
pub fn parse_status(response: &[u8]) -> Result<u16, NetError> {
    let end = response
        .iter()
        .position(|&b| b == b'\r' || b == b'\n')
        .unwrap_or(response.len());
    let line = core::str::from_utf8(&response[..end]).map_err(|_| NetError::Http)?;

    let mut parts = line.split_ascii_whitespace();
    match parts.next() {
        Some(version) if version.starts_with("HTTP/") => {}
        _ => return Err(NetError::Http),
    }
    let code = parts.next().ok_or(NetError::Http)?;
    if code.len() != 3 {
        return Err(NetError::Http);
    }
    code.parse().map_err(|_| NetError::Http)
}

/// Whether a status code is a clean success.
///
/// Redirects count: the sheet web app answers a successful POST with `302`.
/// Only consulted when `SyncConfig::strict_status` is set.
pub fn is_success(status: u16) -> bool {
    (200..400).contains(&status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_post_frames_headers_and_body() {
        let request = build_post("example.com", "/exec", b"{\"a\":1}");
        let text = core::str::from_utf8(&request).unwrap();
        assert_eq!(
            text,
            "POST /exec HTTP/1.1\r\nHost: example.com\r\nContent-Type: application/json\r\n\
             Content-Length: 7\r\nConnection: close\r\n\r\n{\"a\":1}"
        );
    }

    #[test]
    fn test_parse_status_line() {
        assert_eq!(parse_status(b"HTTP/1.1 200 OK\r\nContent-Length: 0"), Ok(200));
        assert_eq!(parse_status(b"HTTP/1.0 302 Moved Temporarily\r\n"), Ok(302));
        assert_eq!(parse_status(b"HTTP/1.1 500"), Ok(500));
    }

    #[test]
    fn test_parse_status_rejects_garbage() {
        assert_eq!(parse_status(b""), Err(NetError::Http));
        assert_eq!(parse_status(b"hello world"), Err(NetError::Http));
        assert_eq!(parse_status(b"HTTP/1.1 2000 OK"), Err(NetError::Http));
        assert_eq!(parse_status(b"HTTP/1.1 abc OK"), Err(NetError::Http));
    }

    #[test]
    fn test_success_range() {
        assert!(is_success(200));
        assert!(is_success(302));
        assert!(!is_success(404));
        assert!(!is_success(500));
    }
}
