//! Multipart upload receiver: `cargo run --example upload`, then
//! `curl -F file=@somefile.bin http://127.0.0.1:8080/upload`.

use bare_http::{
    async_trait, Handler, HttpServer, MultipartReader, Request, ResponseWriter, Result, Router,
};

struct Upload;

#[async_trait]
impl Handler for Upload {
    async fn handle(&self, request: &Request, client: &mut ResponseWriter) -> Result<()> {
        let content_type = request.header("Content-Type").unwrap_or("").to_owned();

        let mut sizes = Vec::new();
        {
            let body = client.content(request).await?;
            let mut parts = MultipartReader::new(&content_type, body).await?;

            while parts.has_data() {
                parts.skip_to_data().await;

                let mut size = 0usize;
                parts.read_data(|chunk| size += chunk.len()).await;
                sizes.push(size);

                if parts.read_header_line().await.as_deref() != Some("") {
                    break;
                }
            }
        }

        let summary = sizes
            .iter()
            .enumerate()
            .map(|(index, size)| format!("part {index}: {size} bytes\n"))
            .collect::<String>();
        client.serve_data(summary.as_bytes(), Some("txt")).await
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut server = HttpServer::builder()
        .address("127.0.0.1:8080".parse().unwrap())
        .router(Router::new().route("/upload", Upload))
        .build();

    server.start().await?;
    println!("listening on 127.0.0.1:{}", server.port());

    std::future::pending::<()>().await;
    server.stop().await
}
