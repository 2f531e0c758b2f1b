//! Server configuration limits and timeouts.
//!
//! Defaults are conservative enough for internal APIs while staying out of
//! the way of ordinary keep-alive clients. Every limit can be overridden
//! through [`ServerBuilder`](crate::ServerBuilder).

use std::time::Duration;

/// Per-connection parsing limits.
#[derive(Debug, Clone)]
pub struct ConnLimits {
    /// Maximum wait for the next request line on an open connection
    /// (default: `5s`).
    ///
    /// When nothing arrives within this window the connection is treated
    /// as having nothing more to offer and is closed without an error
    /// response. The same bound applies to every line read while a frame
    /// is being parsed.
    pub read_timeout: Duration,

    /// Maximum length of a single start-line or header line in bytes,
    /// line terminator included (default: `8192`).
    pub max_line_length: usize,

    /// Maximum number of header lines per request (default: `64`).
    pub max_headers: usize,
}

impl Default for ConnLimits {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(5),
            max_line_length: 8 * 1024,
            max_headers: 64,
        }
    }
}

/// Listener-level limits.
#[derive(Debug, Clone)]
pub struct ServerLimits {
    /// Accept backlog passed to the listening socket (default: `1024`).
    pub backlog: i32,
}

impl Default for ServerLimits {
    fn default() -> Self {
        Self { backlog: 1024 }
    }
}
