//! Provider adapters and the plumbing they share.
//!
//! A provider adapter knows how to talk to one vendor: it turns the vendor's
//! catalog into [`ModelSpec`](crate::registry::spec::ModelSpec) descriptors and
//! registers them into the category registries of a
//! [`Registry`](crate::registry::Registry). The adapter also owns the
//! [`CachedFetcher`](cached_fetcher::CachedFetcher)s that back the
//! availability and "hot" probes of the specs it registers.
//!
//! ## Error Handling
//!
//! Each vendor API has its own bespoke error system. For example, the Ollama
//! API documentation does not describe any errors that can be raised by the API,
//! while the OpenAI API is very explicit. Providers each have their own error
//! types. These are encapsulated in [`Error`], and the [`ErrorKind`] enum gives
//! the category of error that was raised.
//!
//! None of these errors reach callers of the registry. A failure while
//! registering is isolated to the provider that raised it, and a failure while
//! probing degrades to "unavailable".

mod apireq;
pub(crate) mod cached_fetcher;
pub(crate) mod declared;
mod ollama;
mod openai;

pub(crate) mod providers;

use async_trait::async_trait;
use std::error::Error as StdError;
use std::fmt;

use self::providers::ProviderIdentifier;
use crate::registry::Registry;

/// General categories of errors that can be returned by a provider adapter.
/// This list may be updated as providers are added.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorKind {
    /// Failed to connect to the underlying API service.
    /// This could be due to network issues like DNS
    /// resolution, connectivity issues, or routing problems.
    Connection,
    /// A request timed out.
    TimedOut,
    /// An API key was not provided or service-specific
    /// permissions are needed.
    Authentication,
    /// A rate limit was reached or a quota was exceeded.
    ExcessUsage,
    /// The servers are overloaded. This is non-fatal
    /// and indicates that a retry may be needed later.
    ApiOverloaded,
    /// The requested resource was not found.
    NotFound,
    /// The request was malformed or is otherwise improper. This
    /// often corresponds to errors with HTTP status codes in
    /// the 400s.
    BadRequest,
    /// The server encountered an error. This often corresponds to
    /// errors with HTTP status codes in the 500s.
    InternalError,
    /// An API response was unable to be deserialized, malformed,
    /// or otherwise violated the assumptions of the client.
    UnexpectedResponse,
    /// The provider is missing credentials or an endpoint, or one of
    /// them is malformed.
    Configuration,
    /// An error that does not fit into any of the other categories.
    UnspecifiedError,
}

#[derive(Debug)]
pub(crate) struct Error {
    kind: ErrorKind,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub(crate) fn from_kind(kind: ErrorKind) -> Error {
        Error { kind, source: None }
    }

    pub(crate) fn from_source(kind: ErrorKind, source: Box<dyn StdError + Send + Sync>) -> Error {
        Error {
            kind,
            source: Some(source),
        }
    }

    pub(crate) fn configuration<S: Into<String>>(reason: S) -> Error {
        Error::from_source(ErrorKind::Configuration, reason.into().into())
    }

    pub(crate) fn kind(&self) -> ErrorKind {
        self.kind
    }

    fn message(&self) -> &'static str {
        match self.kind {
            ErrorKind::Connection => "failed to connect to the API service",
            ErrorKind::TimedOut => "request timed out",
            ErrorKind::Authentication => "authentication failed or not provided",
            ErrorKind::ExcessUsage => "rate limit exceeded or quota crossed",
            ErrorKind::ApiOverloaded => "API server(s) are currently overloaded",
            ErrorKind::NotFound => "the requested resource was not found",
            ErrorKind::BadRequest => "the request was bad or malformed",
            ErrorKind::InternalError => "the server encountered an internal error",
            ErrorKind::UnexpectedResponse => "API response was unexpected or malformed",
            ErrorKind::Configuration => "the provider is misconfigured",
            ErrorKind::UnspecifiedError => "an unspecified error occurred",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())?;

        if let Some(source) = &self.source {
            write!(f, ": {}", source)?;
        }

        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source.as_ref().map(|e| &**e as _)
    }
}

/// A trait implemented by every provider adapter.
#[async_trait]
pub(crate) trait ProviderAdapter: Send + Sync {
    /// Returns the provider identifier.
    fn id(&self) -> ProviderIdentifier;

    /// Registers the provider's models into the category registries and
    /// returns the number of specs submitted.
    ///
    /// Any error is confined to this provider; the caller logs it and moves
    /// on to the next adapter.
    async fn register(&self, registry: &Registry) -> Result<usize, Error>;
}
