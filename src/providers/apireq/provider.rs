//! Conversions between Reqwest API errors and provider error types

use crate::providers::apireq::{error::ErrorKind as ReqwestErrorKind, ReqwestError};
use crate::providers::{Error, ErrorKind};

impl From<ReqwestError> for Error {
    fn from(value: ReqwestError) -> Self {
        let kind: ErrorKind = match &value.kind() {
            ReqwestErrorKind::Unreachable => ErrorKind::Connection,
            ReqwestErrorKind::Undecodable | ReqwestErrorKind::Redirected => {
                ErrorKind::UnexpectedResponse
            }
            ReqwestErrorKind::TimedOut => ErrorKind::TimedOut,
            ReqwestErrorKind::Status(401 | 403) => ErrorKind::Authentication,
            ReqwestErrorKind::Status(404) => ErrorKind::NotFound,
            ReqwestErrorKind::Status(429) => ErrorKind::ExcessUsage,
            ReqwestErrorKind::Status(503) => ErrorKind::ApiOverloaded,
            ReqwestErrorKind::Status(400..=499) => ErrorKind::BadRequest,
            ReqwestErrorKind::Status(500..=599) => ErrorKind::InternalError,
            ReqwestErrorKind::Status(_) | ReqwestErrorKind::Other => ErrorKind::UnspecifiedError,
        };

        Error::from_source(kind, Box::new(value))
    }
}
