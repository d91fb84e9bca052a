use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::{code_to_string, content_length, owned_headers, read_body, MAX_MESSAGE_BYTES};
use crate::errors::{Error, Result};

/// An HTTP response.
#[derive(Debug)]
pub struct Response {
    /// Status code of the response
    pub status: u16,
    /// Headers for the response. It is not necessary to add
    /// Content-Length, this is done automatically on serialization.
    pub headers: Vec<(String, String)>,
    /// Body of the response. An empty string means no body.
    pub body: String,
}

impl Response {
    /// Creates an empty OK response (204)
    pub fn ok() -> Response {
        Response {
            status: 204,
            headers: vec![],
            body: String::new(),
        }
    }

    /// Creates an OK (200) response with the given body
    pub fn ok_with_body(body: String) -> Response {
        Response {
            status: 200,
            headers: vec![],
            body,
        }
    }

    /// Serialize `value` as the JSON body of a response with the given
    /// status.
    pub fn json<T: Serialize>(status: u16, value: &T) -> Result<Response> {
        Ok(Response {
            status,
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: serde_json::to_string(value)
                .map_err(|err| Error::Internal(format!("response serialization: {err}")))?,
        })
    }

    /// Creates an error response with an empty body.
    ///
    /// The code must be in the 4xx or 5xx range.
    pub fn error(code: u16) -> Response {
        assert!((400..600).contains(&code), "Invalid error code");
        Response {
            status: code,
            headers: vec![],
            body: String::new(),
        }
    }
}

/// Serialize a response onto a stream, adding the Content-Length header.
pub(crate) async fn write_response<W>(stream: &mut W, response: &Response) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let message = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\n{}\r\n{}",
        response.status,
        code_to_string(response.status),
        response.body.len(),
        response
            .headers
            .iter()
            .map(|(name, value)| format!("{name}: {value}\r\n"))
            .collect::<Vec<_>>()
            .join(""),
        response.body
    );
    stream.write_all(message.as_bytes()).await?;
    Ok(())
}

/// Parse an HTTP response from a byte stream. Mirrors request parsing;
/// the shared pieces live in the module root.
pub async fn parse_response<R>(reader: &mut R) -> Result<Response>
where
    R: AsyncRead + Unpin,
{
    let mut buf: Vec<u8> = Vec::with_capacity(1024);
    let mut chunk = [0u8; 4096];

    let (header_len, body_len, mut response) = loop {
        let read = reader.read(&mut chunk).await?;
        if read == 0 {
            return Err(Error::ConnectionReset);
        }
        buf.extend_from_slice(&chunk[..read]);
        if buf.len() > MAX_MESSAGE_BYTES {
            return Err(Error::BadRequest("response too large".to_string()));
        }

        let mut headers = [httparse::EMPTY_HEADER; 64];
        let mut parsed = httparse::Response::new(&mut headers);
        match parsed.parse(&buf) {
            Ok(httparse::Status::Complete(header_len)) => {
                let body_len = content_length(parsed.headers);
                break (
                    header_len,
                    body_len,
                    Response {
                        status: parsed.code.ok_or(Error::NoResponse)?,
                        headers: owned_headers(parsed.headers),
                        body: String::new(),
                    },
                );
            }
            Ok(httparse::Status::Partial) => continue,
            Err(err) => return Err(Error::BadRequest(format!("malformed response: {err}"))),
        }
    };

    read_body(reader, &mut buf, header_len, body_len).await?;
    response.body = String::from_utf8_lossy(&buf[header_len..header_len + body_len]).into_owned();
    Ok(response)
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn test_parse_simple_response() {
        let mut raw: &[u8] = b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n";

        let parsed = parse_response(&mut raw).await.unwrap();

        assert_eq!(parsed.status, 200);
        assert_eq!(parsed.headers.len(), 1);
        assert_eq!(parsed.body, "");
    }

    #[tokio::test]
    async fn test_parse_response_with_body() {
        let body = "{ \"content\": \"Hello, world!\" }";
        let raw = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body
        );
        let mut raw = raw.as_bytes();

        let parsed = parse_response(&mut raw).await.unwrap();

        assert_eq!(parsed.status, 200);
        assert_eq!(parsed.body, body);
    }

    #[tokio::test]
    async fn test_response_writing_round_trips() {
        let response = Response::json(409, &serde_json::json!({ "error": "bad move" })).unwrap();

        let mut wire = Vec::new();
        write_response(&mut wire, &response).await.unwrap();

        let mut raw: &[u8] = &wire;
        let parsed = parse_response(&mut raw).await.unwrap();
        assert_eq!(parsed.status, 409);
        assert_eq!(parsed.body, "{\"error\":\"bad move\"}");
    }

    #[test]
    #[should_panic]
    fn test_error_rejects_success_codes() {
        Response::error(200);
    }
}
