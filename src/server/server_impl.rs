//! The connection server: listener lifecycle and accept loop.

use crate::{
    errors::{Error, ErrorSink, LogSink},
    http::response::ResponseWriter,
    limits::{ConnLimits, ServerLimits},
    server::{connection::HttpConnection, router::Router},
    Result,
};
use socket2::{Domain, Protocol, Socket, Type};
use std::{io, net::SocketAddr, sync::Arc};
use tokio::{net::TcpListener, sync::watch, task::JoinHandle};

/// HTTP/1.1 server over raw TCP streams.
///
/// Owns the listening socket; every accepted connection runs as its own
/// task, so connections are served fully concurrently while each
/// connection handles its requests strictly in order.
///
/// # Examples
///
/// ```no_run
/// use bare_http::{async_trait, Handler, HttpServer, Request, ResponseWriter, Result, Router};
///
/// struct Hello;
///
/// #[async_trait]
/// impl Handler for Hello {
///     async fn handle(&self, _: &Request, client: &mut ResponseWriter) -> Result<()> {
///         client.serve_data(b"Hello world!", Some("txt")).await
///     }
/// }
///
/// #[tokio::main]
/// async fn main() -> Result<()> {
///     let mut server = HttpServer::builder()
///         .address("127.0.0.1:8080".parse().unwrap())
///         .router(Router::new().route("/", Hello))
///         .build();
///
///     server.start().await?;
///     std::future::pending::<()>().await;
///     server.stop().await
/// }
/// ```
pub struct HttpServer {
    address: SocketAddr,
    router: Arc<Router>,
    error_sink: Arc<dyn ErrorSink>,
    server_name: Arc<str>,
    conn_limits: ConnLimits,
    server_limits: ServerLimits,
    runtime: Option<Runtime>,
}

struct Runtime {
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    accept_task: JoinHandle<()>,
}

impl HttpServer {
    /// Creates a new builder for configuring the server instance.
    pub fn builder() -> ServerBuilder {
        ServerBuilder {
            address: None,
            router: None,
            error_sink: None,
            server_name: "bare-http/0.1".to_owned(),
            conn_limits: ConnLimits::default(),
            server_limits: ServerLimits::default(),
        }
    }

    /// Binds the listening socket and starts accepting connections.
    ///
    /// Fails with [`Error::AlreadyStarted`] when the server is already
    /// running.
    pub async fn start(&mut self) -> Result<()> {
        if self.runtime.is_some() {
            return Err(Error::AlreadyStarted);
        }

        let listener = bind_listener(self.address, self.server_limits.backlog)?;
        let listener = TcpListener::from_std(listener)?;
        let local_addr = listener.local_addr()?;

        let (shutdown, signal) = watch::channel(false);
        let accept_task = tokio::spawn(accept_loop(
            listener,
            self.router.clone(),
            self.error_sink.clone(),
            self.conn_limits.clone(),
            self.server_name.clone(),
            signal,
        ));

        self.runtime = Some(Runtime {
            local_addr,
            shutdown,
            accept_task,
        });
        log::info!("http server listening on {local_addr}");
        Ok(())
    }

    /// Stops accepting connections and closes the listening socket.
    ///
    /// Connections accepted before the stop are not terminated; they run
    /// to their natural close. Fails with [`Error::NotRunning`] when the
    /// server is not running.
    pub async fn stop(&mut self) -> Result<()> {
        let runtime = self.runtime.take().ok_or(Error::NotRunning)?;

        let _ = runtime.shutdown.send(true);
        if let Err(err) = runtime.accept_task.await {
            self.error_sink.report(
                "server",
                "error stopping server",
                Some(&Error::Io(io::Error::other(err))),
            );
        }

        log::info!("http server stopped");
        Ok(())
    }

    /// Whether the server is currently accepting connections.
    pub fn is_running(&self) -> bool {
        self.runtime.is_some()
    }

    /// Bound address, while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.runtime.as_ref().map(|runtime| runtime.local_addr)
    }

    /// Port the server is listening on, or `0` when stopped.
    pub fn port(&self) -> u16 {
        self.local_addr().map(|addr| addr.port()).unwrap_or(0)
    }
}

fn bind_listener(address: SocketAddr, backlog: i32) -> Result<std::net::TcpListener> {
    let socket = Socket::new(Domain::for_address(address), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_tcp_nodelay(true)?;
    socket.bind(&address.into())?;
    socket.listen(backlog)?;
    socket.set_nonblocking(true)?;
    Ok(socket.into())
}

async fn accept_loop(
    listener: TcpListener,
    router: Arc<Router>,
    error_sink: Arc<dyn ErrorSink>,
    limits: ConnLimits,
    server_name: Arc<str>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let accepted = tokio::select! {
            biased;

            _ = shutdown.changed() => break,
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((stream, peer)) => {
                log::debug!("connection accepted from {peer}");

                let (read, write) = stream.into_split();
                let client = ResponseWriter::from_parts(
                    Box::new(read),
                    Box::new(write),
                    server_name.clone(),
                );
                let connection = HttpConnection::new(
                    client,
                    router.clone(),
                    error_sink.clone(),
                    limits.clone(),
                );

                tokio::spawn(connection.run());
            }
            Err(err) => {
                error_sink.report("server", "error accepting connection", Some(&err.into()));
            }
        }
    }
    // the listener is dropped here, failing any pending accept
}

/// Builder for [`HttpServer`] instances.
pub struct ServerBuilder {
    address: Option<SocketAddr>,
    router: Option<Router>,
    error_sink: Option<Arc<dyn ErrorSink>>,
    server_name: String,
    conn_limits: ConnLimits,
    server_limits: ServerLimits,
}

impl ServerBuilder {
    /// Sets the address the server binds to on
    /// [`start`](HttpServer::start). **Required.**
    pub fn address(mut self, address: SocketAddr) -> Self {
        self.address = Some(address);
        self
    }

    /// Sets the router that dispatches incoming requests. **Required.**
    pub fn router(mut self, router: Router) -> Self {
        self.router = Some(router);
        self
    }

    /// Installs the error sink receiving failures the engine cannot
    /// recover from. Defaults to [`LogSink`].
    pub fn error_sink(mut self, sink: impl ErrorSink) -> Self {
        self.error_sink = Some(Arc::new(sink));
        self
    }

    /// Sets the value of the implicit `Server` response header.
    pub fn server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = name.into();
        self
    }

    /// Overrides the per-connection parsing limits.
    pub fn connection_limits(mut self, limits: ConnLimits) -> Self {
        self.conn_limits = limits;
        self
    }

    /// Overrides the listener-level limits.
    pub fn server_limits(mut self, limits: ServerLimits) -> Self {
        self.server_limits = limits;
        self
    }

    /// Finalizes the builder and constructs an [`HttpServer`].
    ///
    /// # Panics
    /// Panics when [`address`](ServerBuilder::address) or
    /// [`router`](ServerBuilder::router) was not called.
    #[track_caller]
    pub fn build(self) -> HttpServer {
        HttpServer {
            address: self
                .address
                .expect("The `address` method must be called to create"),
            router: Arc::new(
                self.router
                    .expect("The `router` method must be called to create"),
            ),
            error_sink: self.error_sink.unwrap_or_else(|| Arc::new(LogSink)),
            server_name: self.server_name.into(),
            conn_limits: self.conn_limits,
            server_limits: self.server_limits,
            runtime: None,
        }
    }
}
