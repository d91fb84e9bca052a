use thiserror::Error;

use crate::domain::OrderStatus;

pub type Result<T> = std::result::Result<T, Error>;

/// All the ways an operation can fail, across the domain core and the
/// HTTP plumbing.
///
/// Handlers map these onto HTTP status codes with [`Error::http_status`],
/// so adding a variant means picking a code for it too.
#[derive(Debug, Error)]
pub enum Error {
    /// A malformed order at creation time (empty item set, negative price...).
    #[error("invalid order: {0}")]
    Validation(String),

    /// The referenced record does not exist, or sits outside the caller's
    /// role-scoped view (callers cannot tell the two apart on purpose).
    #[error("not found: {0}")]
    NotFound(String),

    /// A status change that is not in the lifecycle table.
    #[error("cannot move order from '{from}' to '{to}'")]
    InvalidTransition {
        from: OrderStatus,
        to: OrderStatus,
    },

    /// The caller's role does not permit the attempted operation.
    #[error("role '{role}' may not {action}")]
    Authorization { role: String, action: String },

    /// The storage backend failed a read or write.
    #[error("backend failure: {0}")]
    Persistence(String),

    /// The request could not be understood (bad JSON, unknown status
    /// string, oversized message...).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A programming error surfaced at runtime, e.g. a route table that
    /// failed to build.
    #[error("internal error: {0}")]
    Internal(String),

    /// The peer closed the connection before a full message arrived.
    #[error("connection closed before a full message was received")]
    ConnectionReset,

    /// The server never produced a response.
    #[error("no response from server")]
    NoResponse,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The HTTP status code this error is reported with.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::Validation(_) => 422,
            Error::NotFound(_) => 404,
            Error::InvalidTransition { .. } => 409,
            Error::Authorization { .. } => 403,
            Error::BadRequest(_) => 400,
            Error::Persistence(_) | Error::Internal(_) => 500,
            Error::ConnectionReset | Error::NoResponse | Error::Io(_) => 502,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Error {
        Error::BadRequest(format!("malformed json: {err}"))
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Error {
        Error::Persistence(err.to_string())
    }
}
