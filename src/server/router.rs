//! Resource routing: one handler per request.

use crate::{http::request::Request, http::response::ResponseWriter, Result};
use async_trait::async_trait;
use std::collections::HashMap;

/// A request handler.
///
/// The handler is fully responsible for producing and terminating a
/// valid response (status, headers, `end_header`, body) before
/// returning; the server writes nothing on its behalf. Body-bearing
/// requests are drained through
/// [`ResponseWriter::content`](crate::ResponseWriter::content) or
/// [`ResponseWriter::read_body`](crate::ResponseWriter::read_body).
///
/// # Examples
/// ```
/// use bare_http::{async_trait, Handler, Request, ResponseWriter, Result};
///
/// struct Hello;
///
/// #[async_trait]
/// impl Handler for Hello {
///     async fn handle(&self, _: &Request, client: &mut ResponseWriter) -> Result<()> {
///         client.serve_data(b"Hello world!", Some("txt")).await
///     }
/// }
/// ```
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    /// Processes one request on one connection.
    ///
    /// An error closes the connection; it is reported to the error sink
    /// and never answered automatically.
    async fn handle(&self, request: &Request, client: &mut ResponseWriter) -> Result<()>;
}

/// Lookup from request resource to handler.
///
/// Exactly one handler is invoked per request: the handler registered
/// for the exact (percent-decoded, query-stripped) resource, or the
/// fallback when no route matches. With neither, nothing is written —
/// this engine never auto-generates a `404` or `200`.
pub struct Router {
    routes: HashMap<String, Box<dyn Handler>>,
    fallback: Option<Box<dyn Handler>>,
}

impl Router {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
            fallback: None,
        }
    }

    /// Registers `handler` for the exact resource path. A repeated path
    /// replaces the earlier handler.
    pub fn route(mut self, resource: impl Into<String>, handler: impl Handler) -> Self {
        self.routes.insert(resource.into(), Box::new(handler));
        self
    }

    /// Registers the handler invoked when no route matches.
    pub fn fallback(mut self, handler: impl Handler) -> Self {
        self.fallback = Some(Box::new(handler));
        self
    }

    pub(crate) async fn dispatch(
        &self,
        request: &Request,
        client: &mut ResponseWriter,
    ) -> Result<()> {
        let handler = self
            .routes
            .get(request.resource())
            .or(self.fallback.as_ref());

        match handler {
            Some(handler) => handler.handle(request, client).await,
            None => {
                log::debug!("no handler registered for {}", request.resource());
                Ok(())
            }
        }
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}
