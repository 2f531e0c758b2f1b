//! HTTP request representation and the wire-frame parser.

use crate::{errors::Error, limits::ConnLimits, query::Query, Result};
use memchr::memchr;
use percent_encoding::percent_decode_str;
use std::{collections::HashMap, fmt, io};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt},
    time::timeout,
};

/// A parsed HTTP request, immutable after construction.
///
/// # Input data requirements
///
/// The request head must match this template, with lines terminated by
/// `CRLF` (a partial final line before end-of-stream is tolerated):
///
/// ```text
/// [METHOD] SP [RESOURCE] SP "HTTP/" [VERSION] CRLF
/// [NAME]: SP [VALUE] CRLF
/// ...
/// CRLF
/// ```
///
/// - `[METHOD]` is any ASCII-alphabetic token and is kept verbatim; the
///   parser does not enforce upper case.
/// - `[RESOURCE]` is percent-decoded as a whole, then split at the first
///   `?` into [`resource`](Request::resource) and the query parameters.
///   Because decoding happens before the split, `&` and `=` that arrived
///   encoded take part in parameter splitting.
/// - `[VERSION]` is the token after `HTTP/`, digits and dots.
/// - Header values are everything after the first `:` with exactly one
///   following character skipped. The separator is assumed to be `": "`;
///   a header sent as `Key:Value` loses the first value character. This
///   matches what existing clients of this engine already get on the
///   wire.
/// - A duplicated header name or query parameter keeps the last value.
///
/// A `POST` request is body-bearing: the body itself stays on the
/// connection's input side and is read by the handler through
/// [`ResponseWriter::content`](crate::ResponseWriter::content) or
/// [`ResponseWriter::read_body`](crate::ResponseWriter::read_body). The
/// next request on the connection can only be parsed once the body has
/// been drained.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    method: String,
    resource: String,
    version: String,
    parameters: HashMap<String, String>,
    headers: HashMap<String, String>,
    has_body: bool,
}

impl Request {
    fn new(method: &str, raw_resource: &str, version: &str) -> Result<Self> {
        let decoded = percent_decode_str(raw_resource)
            .decode_utf8()
            .map_err(|_| Error::MalformedStartLine(raw_resource.to_owned()))?;

        let mut parameters = HashMap::new();
        let resource = match memchr(b'?', decoded.as_bytes()) {
            Some(index) => {
                Query::parse_into(&mut parameters, &decoded[index + 1..]);
                decoded[..index].to_owned()
            }
            None => decoded.into_owned(),
        };

        Ok(Request {
            has_body: method == "POST",
            method: method.to_owned(),
            resource,
            version: version.to_owned(),
            parameters,
            headers: HashMap::new(),
        })
    }
}

// Public API
impl Request {
    /// Request method token, verbatim from the start-line.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Percent-decoded request path with the query string stripped.
    /// Never contains `?`.
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Version token from the start-line, e.g. `"1.1"`.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Value of the `Host` header, when present.
    pub fn host(&self) -> Option<&str> {
        self.header("Host")
    }

    /// Query parameter by name.
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }

    /// All query parameters.
    pub fn parameters(&self) -> &HashMap<String, String> {
        &self.parameters
    }

    /// Header value by exact-case name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Whether the request carries a header with the given exact-case
    /// name.
    pub fn has_header(&self, name: &str) -> bool {
        self.headers.contains_key(name)
    }

    /// All request headers.
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Whether a request body follows the header section on the
    /// connection.
    pub fn has_body(&self) -> bool {
        self.has_body
    }

    /// Declared body length.
    ///
    /// Evaluated lazily from the `Content-Length` header; a missing or
    /// non-numeric header is [`Error::InvalidContentLength`].
    pub fn content_length(&self) -> Result<usize> {
        self.header("Content-Length")
            .and_then(|value| value.trim().parse().ok())
            .ok_or(Error::InvalidContentLength)
    }

    /// True iff the request announced `Expect: 100-continue`.
    pub fn expects_continue(&self) -> bool {
        self.header("Expect") == Some("100-continue")
    }

    /// True iff the request asks for a persistent connection
    /// (`Connection` header case-insensitively equal to `keep-alive`).
    pub fn is_keep_alive(&self) -> bool {
        self.header("Connection")
            .is_some_and(|value| value.eq_ignore_ascii_case("keep-alive"))
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", self.method)?;
        if let Some(host) = self.host() {
            write!(f, "{host}")?;
        }
        write!(f, "{}", self.resource)?;
        if !self.parameters.is_empty() {
            let query: Vec<String> = self
                .parameters
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect();
            write!(f, "?{}", query.join("&"))?;
        }
        Ok(())
    }
}

//

enum Line {
    Data(Vec<u8>),
    Eof,
    Overflow,
}

async fn next_line<R: AsyncBufRead + Unpin>(reader: &mut R, limits: &ConnLimits) -> Result<Line> {
    let mut raw = Vec::new();
    let mut limited = (&mut *reader).take(limits.max_line_length as u64);

    let count = timeout(limits.read_timeout, limited.read_until(b'\n', &mut raw))
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "read timed out"))??;

    if count == 0 {
        return Ok(Line::Eof);
    }
    if raw.last() != Some(&b'\n') {
        return match raw.len() >= limits.max_line_length {
            true => Ok(Line::Overflow),
            // partial final line before end-of-stream
            false => Ok(Line::Data(raw)),
        };
    }

    raw.pop();
    if raw.last() == Some(&b'\r') {
        raw.pop();
    }
    Ok(Line::Data(raw))
}

fn parse_start_line(line: &str) -> Result<(&str, &str, &str)> {
    let malformed = || Error::MalformedStartLine(line.to_owned());
    let bytes = line.as_bytes();

    let method_end = memchr(b' ', bytes).ok_or_else(malformed)?;
    let resource_end = memchr(b' ', &bytes[method_end + 1..])
        .map(|index| method_end + 1 + index)
        .ok_or_else(malformed)?;

    let method = &line[..method_end];
    let resource = &line[method_end + 1..resource_end];
    let version = line[resource_end + 1..]
        .strip_prefix("HTTP/")
        .ok_or_else(malformed)?;

    if method.is_empty() || !method.bytes().all(|b| b.is_ascii_alphabetic()) {
        return Err(malformed());
    }
    if resource.is_empty() {
        return Err(malformed());
    }
    if version.is_empty() || !version.bytes().all(|b| b.is_ascii_digit() || b == b'.') {
        return Err(malformed());
    }

    Ok((method, resource, version))
}

/// Reads exactly one request frame off the connection's input side.
///
/// Returns [`Error::NoRequestLine`] when nothing arrives before the
/// idle-read timeout, when the peer closed the stream, or when the first
/// line is empty — the expected end of a connection, not a protocol
/// violation.
pub(crate) async fn parse_request<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    limits: &ConnLimits,
) -> Result<Request> {
    let raw = match next_line(reader, limits).await {
        Ok(Line::Data(line)) if !line.is_empty() => line,
        Ok(Line::Data(_)) | Ok(Line::Eof) => return Err(Error::NoRequestLine),
        Ok(Line::Overflow) => {
            return Err(Error::MalformedStartLine(
                "start line exceeds size limit".to_owned(),
            ))
        }
        Err(Error::Io(err)) if err.kind() == io::ErrorKind::TimedOut => {
            return Err(Error::NoRequestLine)
        }
        Err(err) => return Err(err),
    };

    let line = simdutf8::basic::from_utf8(&raw)
        .map_err(|_| Error::MalformedStartLine(String::from_utf8_lossy(&raw).into_owned()))?;

    let (method, resource, version) = parse_start_line(line)?;
    let mut request = Request::new(method, resource, version)?;

    read_headers(reader, limits, &mut request).await?;
    Ok(request)
}

async fn read_headers<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    limits: &ConnLimits,
    request: &mut Request,
) -> Result<()> {
    let mut count = 0;
    loop {
        let raw = match next_line(reader, limits).await? {
            Line::Data(line) => line,
            // the peer stopped mid-header-section; treat as end of headers
            Line::Eof => return Ok(()),
            Line::Overflow => {
                return Err(Error::MalformedHeader(
                    "header line exceeds size limit".to_owned(),
                ))
            }
        };
        if raw.is_empty() {
            return Ok(());
        }

        if count >= limits.max_headers {
            return Err(Error::TooManyHeaders);
        }
        count += 1;

        let line = simdutf8::basic::from_utf8(&raw)
            .map_err(|_| Error::MalformedHeader(String::from_utf8_lossy(&raw).into_owned()))?;
        let colon =
            memchr(b':', line.as_bytes()).ok_or_else(|| Error::MalformedHeader(line.to_owned()))?;

        // value starts after the colon with exactly one separator
        // character skipped
        let after = &line[colon + 1..];
        let value = after
            .char_indices()
            .nth(1)
            .map(|(index, _)| &after[index..])
            .unwrap_or("");

        request
            .headers
            .insert(line[..colon].to_owned(), value.to_owned());
    }
}
