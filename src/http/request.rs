use tokio::io::{AsyncRead, AsyncReadExt};

use super::{content_length, owned_headers, read_body, MAX_MESSAGE_BYTES};
use crate::errors::{Error, Result};

/// Represents an HTTP request.
#[derive(Debug)]
pub struct Request {
    /// The HTTP method used in the request
    pub method: String,
    /// The full path of the request
    pub path: String,
    /// Headers of the request
    pub headers: Vec<(String, String)>,
    /// Body of the request
    pub body: String,
}

impl Request {
    /// Create a new GET request for the given path, with an empty body
    pub fn get(path: &str) -> Request {
        Request {
            method: "GET".to_string(),
            path: path.to_string(),
            headers: vec![],
            body: String::new(),
        }
    }

    /// Create a new POST request for the given path, with the given body
    pub fn post(path: &str, body: String) -> Request {
        Request {
            method: "POST".to_string(),
            path: path.to_string(),
            headers: vec![],
            body,
        }
    }

    /// Create a new PUT request for the given path, with the given body
    pub fn put(path: &str, body: String) -> Request {
        Request {
            method: "PUT".to_string(),
            path: path.to_string(),
            headers: vec![],
            body,
        }
    }

    /// Attach a header, builder-style. The role header rides on every
    /// authenticated request this way.
    pub fn with_header(mut self, name: &str, value: &str) -> Request {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Look up a header value. HTTP header names are case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Parse an HTTP request from a byte stream.
///
/// Reads incrementally until httparse reports a complete header section,
/// then drains the announced body. Messages over the size cap are
/// rejected rather than buffered.
pub async fn parse_request<R>(reader: &mut R) -> Result<Request>
where
    R: AsyncRead + Unpin,
{
    let mut buf: Vec<u8> = Vec::with_capacity(1024);
    let mut chunk = [0u8; 4096];

    let (header_len, body_len, mut request) = loop {
        let read = reader.read(&mut chunk).await?;
        if read == 0 {
            return Err(Error::ConnectionReset);
        }
        buf.extend_from_slice(&chunk[..read]);
        if buf.len() > MAX_MESSAGE_BYTES {
            return Err(Error::BadRequest("request too large".to_string()));
        }

        let mut headers = [httparse::EMPTY_HEADER; 64];
        let mut parsed = httparse::Request::new(&mut headers);
        match parsed.parse(&buf) {
            Ok(httparse::Status::Complete(header_len)) => {
                let body_len = content_length(parsed.headers);
                break (
                    header_len,
                    body_len,
                    Request {
                        method: parsed.method.unwrap_or("GET").to_string(),
                        path: parsed.path.unwrap_or("/").to_string(),
                        headers: owned_headers(parsed.headers),
                        body: String::new(),
                    },
                );
            }
            Ok(httparse::Status::Partial) => continue,
            Err(err) => return Err(Error::BadRequest(format!("malformed request: {err}"))),
        }
    };

    read_body(reader, &mut buf, header_len, body_len).await?;
    request.body = String::from_utf8_lossy(&buf[header_len..header_len + body_len]).into_owned();
    Ok(request)
}
