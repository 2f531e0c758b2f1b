//! Per-connection request loop.

use crate::{
    errors::{Error, ErrorSink},
    http::{request, response::ResponseWriter},
    limits::ConnLimits,
    server::router::Router,
};
use std::sync::Arc;

/// One accepted connection, from accept to close.
///
/// The loop is strictly sequential: one request is parsed, dispatched
/// and answered before the next is read. State transitions: parse →
/// dispatch → loop while the last request asked for keep-alive and the
/// socket is still open.
pub(crate) struct HttpConnection {
    client: ResponseWriter,
    router: Arc<Router>,
    error_sink: Arc<dyn ErrorSink>,
    limits: ConnLimits,
    keep_alive: bool,
}

impl HttpConnection {
    pub(crate) fn new(
        client: ResponseWriter,
        router: Arc<Router>,
        error_sink: Arc<dyn ErrorSink>,
        limits: ConnLimits,
    ) -> Self {
        Self {
            client,
            router,
            error_sink,
            limits,
            keep_alive: false,
        }
    }

    pub(crate) async fn run(mut self) {
        loop {
            self.client.reset();

            let request =
                match request::parse_request(self.client.reader_mut(), &self.limits).await {
                    Ok(request) => request,
                    // idle timeout or clean close: the expected end of a
                    // connection
                    Err(Error::NoRequestLine) => break,
                    // peer went away mid-frame
                    Err(Error::Io(_)) => break,
                    Err(err) => {
                        self.error_sink
                            .report("connection", "error parsing request", Some(&err));

                        if let Err(write_err) = self
                            .client
                            .write_error(500, "Internal Server Error")
                            .await
                        {
                            self.error_sink.report(
                                "connection",
                                "error sending error response",
                                Some(&write_err),
                            );
                        }
                        break;
                    }
                };

            // keep-alive is an explicit per-request opt-in; a request
            // without the header drops persistence
            self.keep_alive = request.is_keep_alive();
            log::trace!("request received: {request}");

            if let Err(err) = self.router.dispatch(&request, &mut self.client).await {
                self.error_sink
                    .report("connection", "error handling request", Some(&err));
                break;
            }
            if let Err(err) = self.client.flush().await {
                self.error_sink
                    .report("connection", "error flushing response", Some(&err));
                break;
            }

            if !self.keep_alive {
                break;
            }
        }
        // dropping the writer closes the socket
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        errors::Fault,
        http::request::Request,
        server::router::{Handler, Router},
        Result,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

    struct EmptyOk {
        hits: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Handler for EmptyOk {
        async fn handle(&self, _: &Request, client: &mut ResponseWriter) -> Result<()> {
            self.hits.fetch_add(1, Ordering::SeqCst);
            client.write_status(200, "OK").await?;
            client.write_header("Content-Length", "0").await?;
            client.end_header().await
        }
    }

    struct Failing;

    #[async_trait]
    impl Handler for Failing {
        async fn handle(&self, _: &Request, _: &mut ResponseWriter) -> Result<()> {
            Err(Error::InvalidContentLength)
        }
    }

    fn spawn_connection(
        router: Router,
    ) -> (
        DuplexStream,
        crossbeam::channel::Receiver<Fault>,
        tokio::task::JoinHandle<()>,
    ) {
        let (near, far) = tokio::io::duplex(16 * 1024);
        let (read, write) = tokio::io::split(far);
        let client = ResponseWriter::from_parts(Box::new(read), Box::new(write), "test-server/1.0");

        let (tx, rx) = crossbeam::channel::unbounded();
        let connection = HttpConnection::new(
            client,
            Arc::new(router),
            Arc::new(tx),
            ConnLimits::default(),
        );
        let task = tokio::spawn(connection.run());
        (near, rx, task)
    }

    #[tokio::test]
    async fn keep_alive_serves_sequential_requests() {
        let hits = Arc::new(AtomicUsize::new(0));
        let router = Router::new().route("/", EmptyOk { hits: hits.clone() });
        let (mut peer, _faults, task) = spawn_connection(router);

        for _ in 0..2 {
            peer.write_all(b"GET / HTTP/1.1\r\nConnection: keep-alive\r\n\r\n")
                .await
                .unwrap();

            let mut chunk = [0u8; 1024];
            let count = peer.read(&mut chunk).await.unwrap();
            let response = std::str::from_utf8(&chunk[..count]).unwrap();
            assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        }

        // final request without the header drops keep-alive
        peer.write_all(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();
        let mut rest = Vec::new();
        peer.read_to_end(&mut rest).await.unwrap();
        assert!(std::str::from_utf8(&rest)
            .unwrap()
            .starts_with("HTTP/1.1 200 OK\r\n"));

        task.await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn malformed_request_answered_with_500() {
        let router = Router::new();
        let (mut peer, faults, task) = spawn_connection(router);

        peer.write_all(b"NOT A REQUEST AT ALL\r\n\r\n").await.unwrap();

        let mut response = Vec::new();
        peer.read_to_end(&mut response).await.unwrap();
        assert!(std::str::from_utf8(&response)
            .unwrap()
            .starts_with("HTTP/1.1 500 Internal Server Error\r\n"));

        task.await.unwrap();
        let fault = faults.try_recv().unwrap();
        assert_eq!(fault.source, "connection");
        assert_eq!(fault.message, "error parsing request");
    }

    #[tokio::test]
    async fn clean_close_is_silent() {
        let hits = Arc::new(AtomicUsize::new(0));
        let router = Router::new().route("/", EmptyOk { hits });
        let (peer, faults, task) = spawn_connection(router);

        drop(peer);
        task.await.unwrap();
        assert!(faults.try_recv().is_err());
    }

    #[tokio::test]
    async fn handler_error_reported_and_closes() {
        let router = Router::new().route("/", Failing);
        let (mut peer, faults, task) = spawn_connection(router);

        peer.write_all(b"GET / HTTP/1.1\r\nConnection: keep-alive\r\n\r\n")
            .await
            .unwrap();

        let mut response = Vec::new();
        peer.read_to_end(&mut response).await.unwrap();
        // nothing was written on the handler's behalf
        assert!(response.is_empty());

        task.await.unwrap();
        let fault = faults.try_recv().unwrap();
        assert_eq!(fault.message, "error handling request");
    }
}
