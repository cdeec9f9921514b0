use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use url::Url;

use shared::{
    domain::StatePath,
    error::{ErrorCode, RequestError},
};

use crate::{config::Settings, DataSource};

/// [`DataSource`] over HTTP: path segments join onto the base URL, reads
/// are GETs, writes are PUTs with a JSON body.
pub struct HttpDataSource {
    http: Client,
    base_url: Url,
}

impl HttpDataSource {
    pub fn new(settings: &Settings) -> Result<Self, RequestError> {
        let base_url = Url::parse(&settings.server_url).map_err(|err| {
            RequestError::new(
                ErrorCode::Validation,
                format!("invalid server url '{}': {err}", settings.server_url),
            )
        })?;
        let http = Client::builder()
            .timeout(Duration::from_millis(settings.request_timeout_ms))
            .build()
            .map_err(|err| {
                RequestError::new(
                    ErrorCode::Internal,
                    format!("failed to build http client: {err}"),
                )
            })?;
        Ok(Self { http, base_url })
    }

    fn resource_url(&self, path: &StatePath) -> Result<Url, RequestError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                RequestError::new(ErrorCode::Validation, "server url cannot be a base")
            })?;
            for segment in path.segments() {
                segments.push(&segment.to_string());
            }
        }
        Ok(url)
    }
}

fn status_error(path: &StatePath, status: StatusCode) -> RequestError {
    let code = match status {
        StatusCode::NOT_FOUND => ErrorCode::NotFound,
        StatusCode::TOO_MANY_REQUESTS => ErrorCode::RateLimited,
        status if status.is_client_error() => ErrorCode::Validation,
        _ => ErrorCode::Internal,
    };
    RequestError::new(code, format!("{status} for {path}"))
}

fn transport_error(path: &StatePath, err: &reqwest::Error) -> RequestError {
    RequestError::new(
        ErrorCode::Unavailable,
        format!("request for {path} failed: {err}"),
    )
}

#[async_trait]
impl DataSource for HttpDataSource {
    async fn get(&self, path: &StatePath) -> Result<Value, RequestError> {
        let url = self.resource_url(path)?;
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|err| transport_error(path, &err))?;
        if !response.status().is_success() {
            return Err(status_error(path, response.status()));
        }
        response
            .json()
            .await
            .map_err(|err| transport_error(path, &err))
    }

    async fn put(&self, path: &StatePath, body: Value) -> Result<Value, RequestError> {
        let url = self.resource_url(path)?;
        let response = self
            .http
            .put(url)
            .json(&body)
            .send()
            .await
            .map_err(|err| transport_error(path, &err))?;
        if !response.status().is_success() {
            return Err(status_error(path, response.status()));
        }
        response
            .json()
            .await
            .map_err(|err| transport_error(path, &err))
    }
}
