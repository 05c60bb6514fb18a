//! A utility module with helpers for making API requests and classifying
//! their failures.

mod error;
mod provider;

pub(crate) use error::Error as ReqwestError;
pub(crate) use reqwest::Url;

use reqwest::{Client, IntoUrl, Response};

/// Issues a plain GET and turns non-2xx statuses into errors.
///
/// Used by health checks which only care whether the endpoint answers.
pub(crate) async fn get_ok<U: IntoUrl>(client: &Client, url: U) -> Result<Response, ReqwestError> {
    let res = client.get(url).send().await?;

    Ok(res.error_for_status()?)
}
