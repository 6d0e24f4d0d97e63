use std::borrow::Cow;
use lazy_static::lazy_static;
use regex::bytes::Regex;
use super::{Decoded, Request, Response, Scheme};

pub const LIMIT: usize = 8 * 1024;

lazy_static! {
    static ref RESPONSE: Regex = Regex::new(r"^HTTP/1\.[01] ([1-5][0-9]{2})(?:[ \r\n]|$)").unwrap();
    static ref REQUEST:  Regex = Regex::new(r"^(GET|POST|HEAD|PUT|DELETE|OPTIONS|PATCH|CONNECT|TRACE) ([^ \r\n]+) HTTP/").unwrap();
    static ref HOST:     Regex = Regex::new(r"(?im)^host:[ \t]*([^\r\n]*)").unwrap();
    static ref ENCODING: Regex = Regex::new(r"(?im)^transfer-encoding:[ \t]*([^\r\n]*)").unwrap();
}

/// Classify the start of a byte stream as an HTTP response or request.
///
/// Only the header section within the first `LIMIT` bytes is examined, so
/// the result for a growing stream only changes while headers are still
/// arriving. Returns `None` for anything that does not match.
pub fn classify(data: &[u8], scheme: Scheme) -> Option<Decoded> {
    let head = headers(data);
    response(head).or_else(|| request(head, scheme))
}

pub fn response(head: &[u8]) -> Option<Decoded> {
    let caps   = RESPONSE.captures(head)?;
    let status = text(caps.get(1)?.as_bytes()).parse().ok()?;

    Some(Decoded::Response(Response {
        status:            status,
        transfer_encoding: header(&ENCODING, head),
    }))
}

pub fn request(head: &[u8], scheme: Scheme) -> Option<Decoded> {
    let caps   = REQUEST.captures(head)?;
    let method = text(caps.get(1)?.as_bytes()).into_owned();
    let path   = text(caps.get(2)?.as_bytes()).into_owned();
    let host   = header(&HOST, head);
    let url    = url(scheme, &method, &path, host.as_deref());

    Some(Decoded::Request(Request {
        method: method,
        path:   path,
        host:   host,
        url:    url,
    }))
}

fn url(scheme: Scheme, method: &str, path: &str, host: Option<&str>) -> Option<String> {
    if path.starts_with("http://") || path.starts_with("https://") {
        return Some(path.to_owned());
    }

    match (method, host) {
        ("CONNECT", _)                        => None,
        (_, Some(h)) if path.starts_with('/') => Some(format!("{}://{}{}", scheme, h, path)),
        _                                     => None,
    }
}

fn headers(data: &[u8]) -> &[u8] {
    let data = &data[..data.len().min(LIMIT)];
    match data.windows(4).position(|w| w == b"\r\n\r\n") {
        Some(n) => &data[..n + 2],
        None    => data,
    }
}

fn header(re: &Regex, head: &[u8]) -> Option<String> {
    let value = re.captures(head)?.get(1)?.as_bytes();
    let value = text(value).trim().to_owned();
    match value.is_empty() {
        true  => None,
        false => Some(value),
    }
}

fn text(bytes: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(bytes)
}
