//! Fetching from the dashboard API.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::{
    history::Period,
    models::{CurrentResponse, ErrorBody, HistoryResponse, JokeResponse, NearbyResponse},
};

/// An error fetching from the dashboard API.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("HTTP {status}: {detail}")]
    Status { status: u16, detail: String },
}

/// The four reads the dashboard makes.
#[async_trait]
pub trait DashboardApi: Send + Sync {
    async fn current(&self) -> Result<CurrentResponse, FetchError>;
    async fn history(&self, period: Period) -> Result<HistoryResponse, FetchError>;
    async fn nearby(&self) -> Result<NearbyResponse, FetchError>;
    async fn joke(&self) -> Result<String, FetchError>;
}

/// [DashboardApi] over HTTP.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url: String = base_url.into();
        Ok(ApiClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, FetchError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("GET {}", url);
        let response = self.http.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorBody>(&body)
                .map(|e| e.detail)
                .unwrap_or(body);
            return Err(FetchError::Status {
                status: status.as_u16(),
                detail,
            });
        }
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl DashboardApi for ApiClient {
    async fn current(&self) -> Result<CurrentResponse, FetchError> {
        self.get("/api/current").await
    }

    async fn history(&self, period: Period) -> Result<HistoryResponse, FetchError> {
        self.get(&format!("/api/history/{period}")).await
    }

    async fn nearby(&self) -> Result<NearbyResponse, FetchError> {
        self.get("/api/nearby").await
    }

    async fn joke(&self) -> Result<String, FetchError> {
        self.get::<JokeResponse>("/api/joke").await.map(|j| j.joke)
    }
}
