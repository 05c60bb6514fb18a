use reqwest::{Client, IntoUrl};
use serde::{Deserialize, Serialize};

use crate::providers::apireq;
use crate::providers::apireq::Url;

#[derive(thiserror::Error, Debug)]
pub(super) enum Error {
    /// The API Base is not a URL that can be used in a network request
    #[error("invalid api base")]
    InvalidApiBase(#[source] reqwest::Error),

    /// Endpoint URL is invalid
    #[error("invalid endpoint")]
    InvalidEndpoint(
        #[from]
        #[source]
        url::ParseError,
    ),

    /// Some issue with the request
    #[error("{}", .0)]
    RequestFailed(
        #[from]
        #[source]
        apireq::ReqwestError,
    ),

    /// Your request was malformed or missing some required parameters,
    /// such as a token or an input.
    #[error("{}", .0.message)]
    BadRequest(ApiErrorPayload),

    /// An "Authentication" Error is an umbrella error with three possiblities:
    /// (1) Invalid Authentication
    /// (2) The requesting API key is not correct.
    /// (3) Your account is not part of an organization.
    #[error("{}", .0.message)]
    Authentication(ApiErrorPayload),

    /// You don't have access to the requested resource.
    #[error("{}", .0.message)]
    PermissionDenied(ApiErrorPayload),

    /// Requested resource does not exist.
    #[error("{}", .0.message)]
    NotFound(ApiErrorPayload),

    /// You have hit your assigned rate limit.
    #[error("{}", .0.message)]
    RateLimit(ApiErrorPayload),

    /// OpenAI has an internal issue
    #[error("{}", .0.message)]
    InternalError(ApiErrorPayload),

    /// The engine is currently overloaded, please try again later
    #[error("{}", .0.message)]
    ApiOverloaded(ApiErrorPayload),

    /// Some unknown error was returned by the API
    #[error("{}", .0.message)]
    UnknownStatus(ApiErrorPayload),
}

impl Error {
    fn from_status(status: u16, payload: ApiErrorPayload) -> Error {
        match status {
            400 => Error::BadRequest(payload),
            401 => Error::Authentication(payload),
            403 => Error::PermissionDenied(payload),
            404 => Error::NotFound(payload),
            429 => Error::RateLimit(payload),
            500 => Error::InternalError(payload),
            503 => Error::ApiOverloaded(payload),
            _ => Error::UnknownStatus(payload),
        }
    }
}

/* Structures to deseralize /v1/models */

#[derive(Serialize, Deserialize, Debug, Clone)]
pub(super) struct ModelObject {
    pub id: String,
    #[serde(default)]
    pub owned_by: String,
}

#[derive(Serialize, Deserialize, Debug)]
struct ModelList {
    data: Vec<ModelObject>,
}

/* API Errors */

#[derive(Deserialize, Debug)]
pub(super) struct ApiErrorPayload {
    message: String,
    #[serde(rename = "type", default)]
    typ: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorResponse {
    error: ApiErrorPayload,
}

pub(super) const DEFAULT_API_BASE: &'static str = "https://api.openai.com";

pub(super) struct OpenAIApi {
    api_base: Url,
    api_key: String,
    client: Client,
}

impl OpenAIApi {
    pub(super) fn new<U: IntoUrl>(api_key: &str, api_base: U) -> Result<OpenAIApi, Error> {
        let api_base = api_base.into_url().map_err(Error::InvalidApiBase)?;

        Ok(OpenAIApi {
            api_base,
            api_key: api_key.to_string(),
            client: Client::new(),
        })
    }

    /// The models the key has access to.
    pub(super) async fn models(&self) -> Result<Vec<ModelObject>, Error> {
        let url = self.api_base.join("/v1/models")?;

        let res = self
            .client
            .get(url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| Error::RequestFailed(e.into()))?;

        let status = res.status();

        if status.is_success() {
            let list: ModelList = res.json().await.map_err(|e| Error::RequestFailed(e.into()))?;

            Ok(list.data)
        } else {
            let payload = match res.json::<ApiErrorResponse>().await {
                Ok(err) => err.error,
                Err(_) => ApiErrorPayload {
                    message: status.to_string(),
                    typ: None,
                },
            };

            if let Some(typ) = &payload.typ {
                tracing::debug!(status = status.as_u16(), %typ, "openai returned an error");
            }

            Err(Error::from_status(status.as_u16(), payload))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_list_deserialization() {
        let list: ModelList = serde_json::from_str(
            r#"{
                "object": "list",
                "data": [
                    {"id": "gpt-4o", "object": "model", "created": 1715367049, "owned_by": "system"},
                    {"id": "whisper-1", "object": "model", "created": 1677532384, "owned_by": "openai-internal"}
                ]
            }"#,
        )
        .unwrap();

        let ids: Vec<&str> = list.data.iter().map(|m| m.id.as_str()).collect();

        assert_eq!(ids, vec!["gpt-4o", "whisper-1"]);
        assert_eq!(list.data[1].owned_by, "openai-internal");
    }

    #[test]
    fn test_error_status_mapping() {
        let payload = |message: &str| ApiErrorPayload {
            message: message.to_string(),
            typ: None,
        };

        assert!(matches!(
            Error::from_status(401, payload("bad key")),
            Error::Authentication(_)
        ));
        assert!(matches!(
            Error::from_status(429, payload("slow down")),
            Error::RateLimit(_)
        ));
        assert!(matches!(
            Error::from_status(503, payload("busy")),
            Error::ApiOverloaded(_)
        ));
        assert!(matches!(
            Error::from_status(302, payload("moved")),
            Error::UnknownStatus(_)
        ));
        assert_eq!(Error::from_status(404, payload("no such model")).to_string(), "no such model");
    }

    #[test]
    fn test_error_payload_deserialization() {
        let err: ApiErrorResponse = serde_json::from_str(
            r#"{"error": {"message": "Incorrect API key provided", "type": "invalid_request_error", "param": null, "code": "invalid_api_key"}}"#,
        )
        .unwrap();

        assert_eq!(err.error.message, "Incorrect API key provided");
        assert_eq!(err.error.typ.as_deref(), Some("invalid_request_error"));
    }

    #[test]
    fn test_invalid_api_base() {
        assert!(matches!(
            OpenAIApi::new("sk-test", "::not a url::"),
            Err(Error::InvalidApiBase(_))
        ));
    }
}
