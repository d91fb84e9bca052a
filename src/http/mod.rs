pub mod server;
pub use server::*;

pub mod request;
pub use request::*;

pub mod response;
pub use response::*;

pub mod client;
pub use client::*;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::errors::{Error, Result};

/// Hard cap on a single HTTP message, headers and body together. Plenty
/// for grocery orders; anything bigger is a mistake or an attack.
pub(crate) const MAX_MESSAGE_BYTES: usize = 64 * 1024;

/// Turn an HTTP status code into its reason phrase.
pub fn code_to_string(code: u16) -> &'static str {
    match code {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        409 => "Conflict",
        422 => "Unprocessable Entity",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        _ => "Unknown",
    }
}

pub(crate) fn content_length(headers: &[httparse::Header<'_>]) -> usize {
    headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case("Content-Length"))
        .and_then(|h| String::from_utf8_lossy(h.value).parse::<usize>().ok())
        .unwrap_or(0)
}

pub(crate) fn owned_headers(headers: &[httparse::Header<'_>]) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|h| {
            (
                h.name.to_string(),
                String::from_utf8_lossy(h.value).to_string(),
            )
        })
        .collect()
}

/// Keep reading until the announced body is complete.
pub(crate) async fn read_body<R>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    header_len: usize,
    body_len: usize,
) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    if header_len + body_len > MAX_MESSAGE_BYTES {
        return Err(Error::BadRequest("message too large".to_string()));
    }
    let mut chunk = [0u8; 4096];
    while buf.len() < header_len + body_len {
        let read = reader.read(&mut chunk).await?;
        if read == 0 {
            return Err(Error::ConnectionReset);
        }
        buf.extend_from_slice(&chunk[..read]);
    }
    Ok(())
}
