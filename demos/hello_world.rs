//! Minimal server: `cargo run --example hello_world`, then
//! `curl 'http://127.0.0.1:8080/greet?name=hans'`.

use bare_http::{async_trait, Handler, HttpServer, Request, ResponseWriter, Result, Router};

struct Hello;

#[async_trait]
impl Handler for Hello {
    async fn handle(&self, _: &Request, client: &mut ResponseWriter) -> Result<()> {
        client.serve_data(b"Hello world!", Some("txt")).await
    }
}

struct Greet;

#[async_trait]
impl Handler for Greet {
    async fn handle(&self, request: &Request, client: &mut ResponseWriter) -> Result<()> {
        let name = request.parameter("name").unwrap_or("world");
        client
            .serve_data(format!("Hello, {name}!\n").as_bytes(), Some("txt"))
            .await
    }
}

struct NotFound;

#[async_trait]
impl Handler for NotFound {
    async fn handle(&self, _: &Request, client: &mut ResponseWriter) -> Result<()> {
        client.write_status(404, "Not Found").await?;
        client.write_header("Content-Length", "0").await?;
        client.end_header().await
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut server = HttpServer::builder()
        .address("127.0.0.1:8080".parse().unwrap())
        .router(
            Router::new()
                .route("/", Hello)
                .route("/greet", Greet)
                .fallback(NotFound),
        )
        .build();

    server.start().await?;
    println!("listening on 127.0.0.1:{}", server.port());

    std::future::pending::<()>().await;
    server.stop().await
}
