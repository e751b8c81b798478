use reqwest::Client;
use roster_shared::{Coupon, User};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::error::FetchError;

/// Both collections of one load, published together.
#[derive(Debug, Clone, Default)]
pub struct Collections {
    pub users: Vec<User>,
    pub coupons: Vec<Coupon>,
}

#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    auth_token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, auth_token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            auth_token,
        }
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        auth_token: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, FetchError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(FetchError::Client)?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            auth_token,
        })
    }

    pub async fn fetch_users(&self) -> Result<Vec<User>, FetchError> {
        self.get_collection("/api/users").await
    }

    pub async fn fetch_coupons(&self) -> Result<Vec<Coupon>, FetchError> {
        self.get_collection("/api/coupons").await
    }

    /// Requests users and coupons concurrently and returns only once both
    /// have arrived. The first failure aborts the whole load.
    pub async fn fetch_collections(&self) -> Result<Collections, FetchError> {
        let (users, coupons) = tokio::try_join!(self.fetch_users(), self.fetch_coupons())?;
        tracing::info!(
            "Loaded {} users and {} coupons from {}",
            users.len(),
            coupons.len(),
            self.base_url
        );
        Ok(Collections { users, coupons })
    }

    async fn get_collection<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, FetchError> {
        let url = format!("{}{}", self.base_url, path);

        let mut request = self.client.get(&url);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|source| FetchError::Transport {
            url: url.clone(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { url, status });
        }

        let body = response.bytes().await.map_err(|source| FetchError::Transport {
            url: url.clone(),
            source,
        })?;

        serde_json::from_slice(&body).map_err(|source| FetchError::Decode { url, source })
    }
}
