use reqwest::{Client, IntoUrl, Response, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::providers::apireq::{self, Url};

const OLLAMA_DEFAULT_ENDPOINT: &'static str = "http://localhost:11434";

#[derive(Debug, Error)]
pub(super) enum Error {
    #[error("invalid ollama api base: {0}")]
    InvalidApiBase(reqwest::Error),

    #[error("invalid ollama endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    #[error("a request to ollama failed: {0}")]
    RequestFailed(#[from] apireq::ReqwestError),

    #[error("failed to query ollama resource: {0}")]
    NotFound(String),

    #[error("request to the ollama api failed: {0}")]
    BadRequest(String),

    #[error("ollama encountered an internal error: {0}")]
    InternalError(String),

    #[error("the ollama API returned an unspecified error: {0}")]
    UnspecifiedError(String),
}

// Structures to deseralize /api/tags

#[derive(Debug, Deserialize, Serialize, Clone)]
pub(super) struct Tag {
    pub name: String,
    pub model: String,
    #[serde(default)]
    pub modified_at: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub digest: String,
    #[serde(default)]
    pub details: Details,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub(super) struct Details {
    #[serde(default)]
    pub parent_model: String,
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub family: String,
    pub families: Option<Vec<String>>, // Use Option to handle the null value
    #[serde(default)]
    pub parameter_size: String,
    #[serde(default)]
    pub quantization_level: String,
}

#[derive(Debug, Deserialize, Serialize)]
struct TagsList {
    models: Vec<Tag>,
}

// Structures to deseralize /api/ps, the models currently loaded into memory

#[derive(Debug, Deserialize, Serialize, Clone)]
pub(super) struct RunningModel {
    pub name: String,
    pub model: String,
    #[serde(default)]
    pub size_vram: u64,
    pub expires_at: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
struct RunningList {
    models: Vec<RunningModel>,
}

// Errors
#[derive(Debug, Deserialize)]
struct ApiError {
    error: String,
}

pub(super) struct OllamaApi {
    api_base: Url,
    client: Client,
}

impl OllamaApi {
    pub(super) fn with_api_base<U: IntoUrl>(api_base: U) -> Result<OllamaApi, Error> {
        Ok(OllamaApi {
            api_base: api_base.into_url().map_err(Error::InvalidApiBase)?,
            client: Client::new(),
        })
    }

    pub(super) fn new() -> Result<OllamaApi, Error> {
        Self::with_api_base(OLLAMA_DEFAULT_ENDPOINT)
    }

    async fn maybe_parse_api_error(res: Response) -> Result<Response, Error> {
        let status = res.status();

        if status.is_success() {
            return Ok(res);
        }

        let message = match res.json::<ApiError>().await {
            Ok(err) => err.error,
            Err(_) => status.to_string(),
        };

        match status {
            StatusCode::NOT_FOUND => Err(Error::NotFound(message)),
            code => match code.as_u16() {
                400..=499 => Err(Error::BadRequest(message)),
                500..=599 => Err(Error::InternalError(message)),
                _ => Err(Error::UnspecifiedError(message)),
            },
        }
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, endpoint: &str) -> Result<T, Error> {
        let url = self.api_base.join(endpoint)?;

        let res = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::RequestFailed(e.into()))?;

        let res = Self::maybe_parse_api_error(res).await?;

        res.json()
            .await
            .map_err(|e| Error::RequestFailed(e.into()))
    }

    /// Models available locally.
    pub(super) async fn tags(&self) -> Result<Vec<Tag>, Error> {
        let tags: TagsList = self.get("/api/tags").await?;

        Ok(tags.models)
    }

    /// Models currently loaded into memory.
    pub(super) async fn ps(&self) -> Result<Vec<RunningModel>, Error> {
        let running: RunningList = self.get("/api/ps").await?;

        Ok(running.models)
    }
}
