//! Error taxonomy and the injected error sink.

use std::{io, sync::Arc};
use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the server engine.
///
/// Frame-level errors (`NoRequestLine`, `MalformedStartLine`,
/// `MalformedHeader`, `TooManyHeaders`) are handled per connection and
/// never cross into the accept loop. Lifecycle and configuration errors
/// (`NoBoundary`, `AlreadyStarted`, `NotRunning`) are returned
/// synchronously to the caller. Nothing is retried inside this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// No request line could be read before the idle-read timeout, or the
    /// peer closed the stream cleanly. Expected; ends the connection
    /// silently.
    #[error("no request line could be read from stream")]
    NoRequestLine,

    /// The start-line did not match `METHOD SP RESOURCE SP HTTP/VERSION`.
    #[error("malformed start line: {0:?}")]
    MalformedStartLine(String),

    /// A header line was missing its `:` separator or exceeded the
    /// configured size limit.
    #[error("malformed header line: {0:?}")]
    MalformedHeader(String),

    /// The request carried more header lines than
    /// [`ConnLimits::max_headers`](crate::limits::ConnLimits::max_headers).
    #[error("too many header lines in request")]
    TooManyHeaders,

    /// The `Content-Length` header was missing or not a number. Raised
    /// lazily by [`Request::content_length`](crate::Request::content_length),
    /// not at parse time.
    #[error("missing or non-numeric Content-Length header")]
    InvalidContentLength,

    /// A multipart content type carried no `boundary=` attribute.
    #[error("no boundary specifier found in content type")]
    NoBoundary,

    /// [`HttpServer::start`](crate::HttpServer::start) was called on a
    /// server that is already running.
    #[error("http server already started")]
    AlreadyStarted,

    /// [`HttpServer::stop`](crate::HttpServer::stop) was called on a
    /// server that is not running.
    #[error("http server not running")]
    NotRunning,

    /// Underlying socket failure.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Receiver for failures the engine cannot recover from on its own:
/// failed accepts, failed error-response writes, failed stops.
///
/// A sink is injected at construction through
/// [`ServerBuilder::error_sink`](crate::ServerBuilder::error_sink); the
/// default is [`LogSink`]. Implementations must not block.
pub trait ErrorSink: Send + Sync + 'static {
    /// Reports a failure from `source` (the component name) with a short
    /// `message` and the underlying error, when one exists.
    fn report(&self, source: &str, message: &str, error: Option<&Error>);
}

/// Default sink: forwards every report to the `log` facade at error
/// level.
pub struct LogSink;

impl ErrorSink for LogSink {
    fn report(&self, source: &str, message: &str, error: Option<&Error>) {
        match error {
            Some(err) => log::error!("{source}: {message}: {err}"),
            None => log::error!("{source}: {message}"),
        }
    }
}

/// One reported failure, as carried by the channel-backed sink.
#[derive(Debug, Clone)]
pub struct Fault {
    /// Component that reported the failure, e.g. `"server"`.
    pub source: String,
    /// Short human-readable description.
    pub message: String,
    /// Display form of the underlying error, when one exists.
    pub detail: Option<String>,
}

/// Channel-backed sink: every report becomes a [`Fault`] on the channel.
/// The receiving side decides what to do with them; a closed receiver
/// drops reports silently.
impl ErrorSink for crossbeam::channel::Sender<Fault> {
    fn report(&self, source: &str, message: &str, error: Option<&Error>) {
        let _ = self.send(Fault {
            source: source.to_owned(),
            message: message.to_owned(),
            detail: error.map(|e| e.to_string()),
        });
    }
}

impl<S: ErrorSink> ErrorSink for Arc<S> {
    fn report(&self, source: &str, message: &str, error: Option<&Error>) {
        S::report(self, source, message, error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        let cases: [(Error, &str); 4] = [
            (
                Error::NoRequestLine,
                "no request line could be read from stream",
            ),
            (
                Error::MalformedHeader("NoColon".into()),
                "malformed header line: \"NoColon\"",
            ),
            (Error::AlreadyStarted, "http server already started"),
            (Error::NotRunning, "http server not running"),
        ];

        for (err, expected) in cases {
            assert_eq!(err.to_string(), expected);
        }
    }

    #[test]
    fn channel_sink_carries_faults() {
        let (tx, rx) = crossbeam::channel::unbounded();

        tx.report("server", "error accepting connection", None);
        tx.report(
            "connection",
            "error parsing request",
            Some(&Error::TooManyHeaders),
        );

        let first = rx.try_recv().unwrap();
        assert_eq!(first.source, "server");
        assert_eq!(first.message, "error accepting connection");
        assert!(first.detail.is_none());

        let second = rx.try_recv().unwrap();
        assert_eq!(second.source, "connection");
        assert_eq!(
            second.detail.as_deref(),
            Some("too many header lines in request")
        );
    }

    #[test]
    fn from_io() {
        let err = Error::from(io::Error::new(io::ErrorKind::TimedOut, "read timeout"));
        assert!(matches!(err, Error::Io(_)));
    }
}
