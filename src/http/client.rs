use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use super::request::Request;
use super::response::{parse_response, Response};
use crate::errors::Result;

/// Simple HTTP client.
///
/// Sends a request over a fresh TCP connection and parses the server's
/// response. The server closes the connection after each response, so a
/// client is good for one exchange; [`call`] wraps the whole dance.
pub struct HttpClient {
    stream: TcpStream,
}

impl HttpClient {
    /// Create a new client connected to the given server.
    pub async fn connect(server: &str) -> Result<HttpClient> {
        Ok(HttpClient {
            stream: TcpStream::connect(server).await?,
        })
    }

    /// Send an HTTP request on the open connection and wait for the
    /// response.
    pub async fn send(&mut self, request: Request) -> Result<Response> {
        let mut message = format!(
            "{} {} HTTP/1.1\r\nContent-Length: {}\r\n",
            request.method,
            request.path,
            request.body.len()
        );
        for (name, value) in &request.headers {
            message.push_str(&format!("{name}: {value}\r\n"));
        }
        message.push_str("\r\n");
        message.push_str(&request.body);

        self.stream.write_all(message.as_bytes()).await?;
        parse_response(&mut self.stream).await
    }
}

/// Connect, send one request, return the response.
pub async fn call(server: &str, request: Request) -> Result<Response> {
    HttpClient::connect(server).await?.send(request).await
}
