//! Response writing over a connection's output side.

use crate::{http::request::Request, mime, Result};
use chrono::Utc;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};

/// Buffered input side of a connection, as handed to handlers for body
/// and multipart reads.
pub type BodyStream = BufReader<Box<dyn AsyncRead + Send + Unpin>>;

type OutputStream = BufWriter<Box<dyn AsyncWrite + Send + Unpin>>;

/// Sequential, append-only writer over one accepted connection.
///
/// A `ResponseWriter` wraps the connection for the lifetime of possibly
/// many request/response exchanges and is the handler's view of it: the
/// output side for writing responses, the input side (through
/// [`content`](ResponseWriter::content)) for draining request bodies.
///
/// Per response the operations must be called in order:
/// [`write_status`](ResponseWriter::write_status) → zero or more
/// [`write_header`](ResponseWriter::write_header) →
/// [`end_header`](ResponseWriter::end_header) → zero or more
/// [`write_body`](ResponseWriter::write_body). Nothing may be skipped or
/// reordered. The writer computes no `Content-Length` on the caller's
/// behalf; handlers write a correct one themselves, except through the
/// serve conveniences which frame the whole response.
///
/// # Panics
/// Call-order violations panic in `debug` mode. In `release` mode the
/// checks are omitted and produce invalid HTTP framing instead.
pub struct ResponseWriter {
    reader: BodyStream,
    writer: OutputStream,
    server_name: Arc<str>,
    state: WriteState,
    continue_sent: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum WriteState {
    Clean,
    Headers,
    Body,
}

impl ResponseWriter {
    /// Wraps raw stream halves. The server calls this for every accepted
    /// socket; tests can drive a writer over in-memory pipes the same
    /// way.
    pub fn from_parts(
        input: Box<dyn AsyncRead + Send + Unpin>,
        output: Box<dyn AsyncWrite + Send + Unpin>,
        server_name: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            reader: BufReader::new(input),
            writer: BufWriter::new(output),
            server_name: server_name.into(),
            state: WriteState::Clean,
            continue_sent: false,
        }
    }

    /// Rearms the writer for the next exchange on the same connection.
    pub(crate) fn reset(&mut self) {
        self.state = WriteState::Clean;
        self.continue_sent = false;
    }

    pub(crate) fn reader_mut(&mut self) -> &mut BodyStream {
        &mut self.reader
    }

    pub(crate) async fn flush(&mut self) -> Result<()> {
        self.writer.flush().await?;
        Ok(())
    }
}

impl ResponseWriter {
    /// Writes the status line plus the two implicit headers every
    /// response carries: `Date` (current UTC time) and `Server` (the
    /// configured server name).
    ///
    /// # Panics
    /// In `debug` mode when called twice for one response or after
    /// [`end_header`](ResponseWriter::end_header).
    pub async fn write_status(&mut self, status: u16, text: &str) -> Result<()> {
        debug_assert!(
            self.state == WriteState::Clean,
            "Must be first and called only once"
        );

        self.writer
            .write_all(format!("HTTP/1.1 {status} {text}\r\n").as_bytes())
            .await?;
        self.state = WriteState::Headers;

        let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        self.write_header("Date", &date).await?;
        let server = self.server_name.clone();
        self.write_header("Server", &server).await?;
        Ok(())
    }

    /// Writes one `Name: Value` header line.
    ///
    /// # Panics
    /// In `debug` mode when called before
    /// [`write_status`](ResponseWriter::write_status) or after
    /// [`end_header`](ResponseWriter::end_header).
    pub async fn write_header(&mut self, key: &str, value: &str) -> Result<()> {
        debug_assert!(
            self.state == WriteState::Headers,
            "Must be called after write_status() and before end_header()"
        );

        self.writer
            .write_all(format!("{key}: {value}\r\n").as_bytes())
            .await?;
        Ok(())
    }

    /// Terminates the header section with a blank line and flushes.
    /// Afterwards the output side is in body-writing state.
    ///
    /// # Panics
    /// In `debug` mode when called out of order.
    pub async fn end_header(&mut self) -> Result<()> {
        debug_assert!(
            self.state == WriteState::Headers,
            "Must be called after write_status() and any write_header() calls"
        );

        self.writer.write_all(b"\r\n").await?;
        self.writer.flush().await?;
        self.state = WriteState::Body;
        Ok(())
    }

    /// Writes raw body bytes. The caller is responsible for having
    /// declared a matching `Content-Length`.
    ///
    /// # Panics
    /// In `debug` mode when called before
    /// [`end_header`](ResponseWriter::end_header).
    pub async fn write_body(&mut self, data: &[u8]) -> Result<()> {
        debug_assert!(
            self.state == WriteState::Body,
            "Must be called after end_header()"
        );

        self.writer.write_all(data).await?;
        Ok(())
    }
}

// Convenience operations
impl ResponseWriter {
    /// Serves a complete `200 OK` response for a byte payload:
    /// `Content-Type` from the [`mime`] lookup keyed by `mime_hint`,
    /// `Content-Length` from the payload's exact size, then the payload,
    /// flushed.
    pub async fn serve_data(&mut self, data: &[u8], mime_hint: Option<&str>) -> Result<()> {
        self.write_status(200, "OK").await?;
        self.write_header("Content-Type", mime::lookup(mime_hint))
            .await?;
        self.write_header("Content-Length", &data.len().to_string())
            .await?;
        self.end_header().await?;
        self.write_body(data).await?;
        self.flush().await
    }

    /// Serves a complete `200 OK` response from a length-known byte
    /// source, copying exactly `length` bytes.
    pub async fn serve_stream<R: AsyncRead + Unpin>(
        &mut self,
        resource: &mut R,
        length: u64,
        mime_hint: Option<&str>,
    ) -> Result<()> {
        self.write_status(200, "OK").await?;
        self.write_header("Content-Type", mime::lookup(mime_hint))
            .await?;
        self.write_header("Content-Length", &length.to_string())
            .await?;
        self.end_header().await?;

        debug_assert!(self.state == WriteState::Body);
        tokio::io::copy(&mut resource.take(length), &mut self.writer).await?;
        self.flush().await
    }

    /// Prepares the connection for a body read and returns the input
    /// side.
    ///
    /// When the request announced `Expect: 100-continue`, a bare
    /// `100 Continue` interim response (status line and blank line only)
    /// is written first, so the peer is unblocked before it streams the
    /// body. Sent at most once per exchange.
    pub async fn content(&mut self, request: &Request) -> Result<&mut BodyStream> {
        if request.has_body() && request.expects_continue() && !self.continue_sent {
            self.writer.write_all(b"HTTP/1.1 100 Continue\r\n\r\n").await?;
            self.writer.flush().await?;
            self.continue_sent = true;
        }

        Ok(&mut self.reader)
    }

    /// Drains the full body of a body-bearing request and returns it.
    ///
    /// Reads exactly [`content_length`](Request::content_length) bytes
    /// from the input side, unblocking a `100-continue` peer first.
    pub async fn read_body(&mut self, request: &Request) -> Result<Vec<u8>> {
        let length = request.content_length()?;
        let stream = self.content(request).await?;

        let mut data = vec![0; length];
        stream.read_exact(&mut data).await?;
        Ok(data)
    }

    /// Bare error response: status line, implicit headers, blank line.
    pub(crate) async fn write_error(&mut self, status: u16, text: &str) -> Result<()> {
        self.write_status(status, text).await?;
        self.end_header().await?;
        self.flush().await
    }
}
