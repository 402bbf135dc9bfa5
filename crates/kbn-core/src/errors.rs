use std::path::PathBuf;

/// Core error type shared by every crate in the workspace.
///
/// Adapter crates map their specific errors into this type so the HTTP
/// boundary can pick a status code consistently (client error vs server error).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Config(String),

    #[error("{0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("invalid path: {path}: {reason}")]
    InvalidPath { path: PathBuf, reason: String },

    #[error("failed to load page: {0}")]
    Fetch(String),

    #[error("{0}")]
    Extract(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("external error: {0}")]
    External(String),
}

impl Error {
    /// HTTP status a handler should answer with when this error escapes.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::Validation(_) | Error::Fetch(_) | Error::Extract(_) => 400,
            Error::NotFound(_) => 404,
            _ => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_map_to_400() {
        assert_eq!(Error::Validation("x".into()).http_status(), 400);
        assert_eq!(Error::Fetch("timeout".into()).http_status(), 400);
        assert_eq!(Error::Extract("empty".into()).http_status(), 400);
    }

    #[test]
    fn everything_else_is_a_server_error() {
        assert_eq!(Error::Config("missing".into()).http_status(), 500);
        assert_eq!(Error::External("telegram".into()).http_status(), 500);
        assert_eq!(Error::Store("locked".into()).http_status(), 500);
    }
}
