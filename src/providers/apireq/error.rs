//! A reqwest failure, classified once so that callers can match on what went
//! wrong and which endpoint it went wrong on.

use reqwest::Url;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorKind {
    /// The endpoint could not be reached.
    Unreachable,
    /// The endpoint answered, but not with what we asked for.
    Undecodable,
    Redirected,
    TimedOut,
    /// The endpoint answered with a non-success status.
    Status(u16),
    Other,
}

impl ErrorKind {
    fn of(err: &reqwest::Error) -> ErrorKind {
        if let Some(status) = err.status() {
            return ErrorKind::Status(status.as_u16());
        }

        if err.is_timeout() {
            ErrorKind::TimedOut
        } else if err.is_connect() {
            ErrorKind::Unreachable
        } else if err.is_decode() {
            ErrorKind::Undecodable
        } else if err.is_redirect() {
            ErrorKind::Redirected
        } else {
            ErrorKind::Other
        }
    }

    fn describe(&self) -> String {
        match self {
            ErrorKind::Unreachable => "is unreachable".to_string(),
            ErrorKind::Undecodable => "returned a body that could not be decoded".to_string(),
            ErrorKind::Redirected => "redirected too often".to_string(),
            ErrorKind::TimedOut => "timed out".to_string(),
            ErrorKind::Status(status) => format!("responded with status {}", status),
            ErrorKind::Other => "failed".to_string(),
        }
    }
}

fn endpoint(url: Option<&Url>) -> String {
    match url {
        Some(url) => format!("{}{}", url.host_str().unwrap_or_default(), url.path()),
        None => "request".to_string(),
    }
}

#[derive(Debug, Error)]
#[error("{} {}", endpoint(.source.url()), .kind.describe())]
pub(crate) struct Error {
    kind: ErrorKind,
    #[source]
    source: reqwest::Error,
}

impl From<reqwest::Error> for Error {
    fn from(source: reqwest::Error) -> Self {
        Error {
            kind: ErrorKind::of(&source),
            source,
        }
    }
}

impl Error {
    pub(crate) fn kind(&self) -> ErrorKind {
        self.kind
    }
}
