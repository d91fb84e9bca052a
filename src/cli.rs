use regex::Regex;
use thiserror::Error;

use crate::auth::Role;

/// Default address for both the client and the server.
///
/// Used whenever no address is given on the command line; the rest of
/// the runtime configuration comes from environment variables below.
pub const DEFAULT_ADDRESS: &str = "127.0.0.1:9898";

/// Environment variable naming the SQLite database file.
pub const DB_ENV: &str = "KIRANA_DB";

/// Environment variable naming the push relay, as `host:port/path`.
/// Unset means notifications only go to the log.
pub const PUSH_ENV: &str = "KIRANA_PUSH_URL";

/// Errors that can occur when parsing the command line arguments
#[derive(Debug, Clone, Error)]
pub enum CLIError {
    #[error("Invalid target format. Should be <host>:<port>")]
    InvalidUrlFormat,
    #[error("Missing parameter '{0}'")]
    MissingParameter(&'static str),
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Validate the format of the TCP address provided by the user
///
/// Returns its input if the address is in the format <host>:<port>, otherwise InvalidUrlFormat
pub fn validate_address(address: &str) -> std::result::Result<&str, CLIError> {
    let re = Regex::new(r"^[a-zA-Z0-9\.\-]+:\d{1,5}$").unwrap();
    if re.is_match(address) {
        Ok(address)
    } else {
        Err(CLIError::InvalidUrlFormat)
    }
}

/// Parse a role argument (`admin`, `delivery`, `hotel:<id>`, `anon`).
pub fn parse_role(arg: &str) -> std::result::Result<Role, CLIError> {
    Role::parse(arg).map_err(|_| CLIError::InvalidParameter(format!("unknown role '{arg}'")))
}

/// Where the server keeps its database. Defaults to a file next to the
/// binary so a bare `kirana-server` just works.
pub fn database_path() -> String {
    std::env::var(DB_ENV).unwrap_or_else(|_| "kirana.db".to_string())
}

/// The push relay, split into a connect address and a request path.
pub fn push_endpoint() -> Option<(String, String)> {
    let value = std::env::var(PUSH_ENV).ok()?;
    match value.split_once('/') {
        Some((server, path)) if !server.is_empty() => {
            Some((server.to_string(), format!("/{path}")))
        }
        _ => None,
    }
}
