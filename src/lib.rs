//! bare_http - Minimal HTTP/1.1 server engine over raw TCP streams
//!
//! A small server core built directly on stream sockets, with no
//! higher-level HTTP stack underneath: it accepts TCP connections,
//! parses request framing byte-by-byte off the wire, hands parsed
//! requests to registered handlers and lets handlers write responses
//! directly onto the connection's output side.
//!
//! # What it does
//!
//! - **Streaming request parsing** — start-line and headers are read off
//!   the socket with a bounded idle-read timeout; request bodies stay on
//!   the wire until the handler drains them
//! - **Persistent connections** — keep-alive is an explicit per-request
//!   opt-in via the `Connection` header; each connection serves its
//!   requests strictly in order while separate connections run fully
//!   concurrently
//! - **Direct response writing** — handlers drive the output side
//!   themselves (`write_status` → `write_header`* → `end_header` → body),
//!   or use the serve conveniences for fixed payloads
//! - **Multipart decoding** — a byte-by-byte boundary scanner decodes
//!   `multipart/*` bodies from the non-seekable request stream
//! - **`100 Continue`** — clients that sent `Expect: 100-continue` are
//!   unblocked before the body is read
//!
//! Not covered: HTTP/2 or HTTP/3, TLS termination, chunked
//! transfer-encoding, header folding, response compression.
//!
//! # Examples
//!
//! ```no_run
//! use bare_http::{async_trait, Handler, HttpServer, Request, ResponseWriter, Result, Router};
//!
//! struct Hello;
//!
//! #[async_trait]
//! impl Handler for Hello {
//!     async fn handle(&self, _: &Request, client: &mut ResponseWriter) -> Result<()> {
//!         client.serve_data(b"Hello world!", Some("txt")).await
//!     }
//! }
//!
//! struct Greet;
//!
//! #[async_trait]
//! impl Handler for Greet {
//!     async fn handle(&self, req: &Request, client: &mut ResponseWriter) -> Result<()> {
//!         let name = req.parameter("name").unwrap_or("world");
//!         client.serve_data(format!("Hello, {name}!").as_bytes(), Some("txt")).await
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let mut server = HttpServer::builder()
//!         .address("127.0.0.1:8080".parse().unwrap())
//!         .router(Router::new().route("/", Hello).route("/greet", Greet))
//!         .build();
//!
//!     server.start().await?;
//!     std::future::pending::<()>().await;
//!     server.stop().await
//! }
//! ```
//!
//! Failures the engine cannot recover from on its own (failed accepts,
//! failed error-response writes) go to an injected [`ErrorSink`]; the
//! default logs them, and a `crossbeam` channel sender can be installed
//! instead to consume [`Fault`] records elsewhere.

pub(crate) mod http {
    pub(crate) mod multipart;
    pub mod query;
    pub(crate) mod request;
    pub(crate) mod response;
}
pub(crate) mod server {
    pub(crate) mod connection;
    pub(crate) mod router;
    pub(crate) mod server_impl;
}
pub(crate) mod errors;
pub mod limits;
pub mod mime;

pub use crate::{
    errors::{Error, ErrorSink, Fault, LogSink, Result},
    http::{
        multipart::MultipartReader,
        query,
        request::Request,
        response::{BodyStream, ResponseWriter},
    },
    server::{
        router::{Handler, Router},
        server_impl::{HttpServer, ServerBuilder},
    },
};

/// Attribute for [`Handler`] implementations, re-exported so downstream
/// crates need no direct `async-trait` dependency.
pub use async_trait::async_trait;
