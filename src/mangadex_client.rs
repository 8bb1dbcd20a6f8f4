use async_trait::async_trait;
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use url::Url;

use crate::configuration::ApiSettings;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error(transparent)]
    Request(#[from] reqwest::Error),
    #[error("{url} answered with status {status}")]
    Status { url: Url, status: u16 },
    #[error(transparent)]
    Decode(#[from] serde_json::Error),
    #[error("invalid url '{0}'")]
    InvalidUrl(String),
    #[error("invalid header value '{0}'")]
    InvalidHeader(String),
}

/// The HTTP session shared by the catalog, the page resolver and the page
/// fetcher.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get_json(&self, url: Url) -> Result<Value, TransportError>;

    async fn get_bytes(&self, url: Url, timeout: Duration) -> Result<Vec<u8>, TransportError>;
}

/// Decode a JSON endpoint into `T`.
pub async fn get_as<T, R>(transport: &R, url: Url) -> Result<T, TransportError>
where
    T: DeserializeOwned,
    R: Transport + ?Sized,
{
    let value = transport.get_json(url).await?;
    Ok(serde_json::from_value(value)?)
}

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(api: &ApiSettings) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        let agent = HeaderValue::from_str(&api.user_agent)
            .map_err(|_| TransportError::InvalidHeader(api.user_agent.clone()))?;
        headers.insert(USER_AGENT, agent);
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;
        Ok(Self { client })
    }

    async fn get(
        &self,
        url: Url,
        timeout: Option<Duration>,
    ) -> Result<reqwest::Response, TransportError> {
        debug!("GET {}", url);
        let mut request = self.client.get(url.clone());
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url,
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_json(&self, url: Url) -> Result<Value, TransportError> {
        let bytes = self.get(url, None).await?.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn get_bytes(&self, url: Url, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        let bytes = self.get(url, Some(timeout)).await?.bytes().await?;
        Ok(bytes.to_vec())
    }
}
