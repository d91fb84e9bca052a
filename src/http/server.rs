use std::future::Future;

use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, warn};

use super::request::parse_request;
use super::response::{write_response, Response};
use super::Request;
use crate::errors::Result;

/// This is the main server.
///
/// It listens for incoming connections on a TCP socket, parses the
/// requests and dispatches them to a handler. Whatever the handler
/// produces is then converted into an HTTP response and sent back to the
/// client. One request per connection; every connection runs on its own
/// task.
pub struct HttpServer {
    listener: TcpListener,
}

impl HttpServer {
    /// Create a new server listening on the given address. Binding port 0
    /// picks a free port; see [`HttpServer::local_addr`].
    pub async fn bind(addr: &str) -> Result<HttpServer> {
        Ok(HttpServer {
            listener: TcpListener::bind(addr).await?,
        })
    }

    pub fn local_addr(&self) -> Result<std::net::SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Start the server.
    ///
    /// Calls the handler with each incoming request. This function only
    /// returns if the listener itself dies; individual connection
    /// failures are logged and do not stop the loop.
    pub async fn serve<F, Fut>(&self, handler: F)
    where
        F: Fn(Request) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        loop {
            let (mut stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(err) => {
                    warn!(%err, "failed to accept connection");
                    continue;
                }
            };
            debug!(%peer, "connection accepted");
            let handler = handler.clone();
            tokio::spawn(async move {
                handle_stream(&mut stream, &handler).await;
            });
        }
    }

    /// Utility for one-shot servers.
    ///
    /// This is mostly for testing: accept a single connection, process
    /// the request and return.
    pub async fn serve_once<F, Fut>(&self, handler: F)
    where
        F: Fn(Request) -> Fut,
        Fut: Future<Output = Response>,
    {
        match self.listener.accept().await {
            Ok((mut stream, _)) => handle_stream(&mut stream, &handler).await,
            Err(err) => warn!(%err, "failed to accept connection"),
        }
    }
}

/// Parse a request off a TCP stream, call the handler and write back the
/// answer.
async fn handle_stream<F, Fut>(stream: &mut TcpStream, handler: &F)
where
    F: Fn(Request) -> Fut,
    Fut: Future<Output = Response>,
{
    let response = match parse_request(stream).await {
        Ok(request) => handler(request).await,
        Err(err) => {
            debug!(%err, "unparseable request");
            Response::error(400)
        }
    };
    if let Err(err) = write_response(stream, &response).await {
        warn!(%err, "failed to respond");
    }
}
