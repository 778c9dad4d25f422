//! Hosted device table over a PostgREST-style HTTP API

use crate::core::{Device, DeviceUpdate, Error, Result, StoreConfig};
use crate::store::DeviceStore;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};

/// Device store backed by the hosted `devices` table
pub struct RestDeviceStore {
    client: Client,
    table_url: String,
    api_key: String,
    bearer: String,
}

impl RestDeviceStore {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let base = config.rest_url.trim().trim_end_matches('/');
        if base.is_empty() {
            return Err(Error::Config("store.rest_url is empty".to_string()));
        }

        let client = Client::builder()
            .user_agent(concat!("plugsave/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            table_url: format!("{}/rest/v1/{}", base, config.table),
            api_key: config.api_key.clone(),
            bearer: config.access_token.clone().unwrap_or_else(|| config.api_key.clone()),
        })
    }

    pub fn table_url(&self) -> &str {
        &self.table_url
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.bearer)
    }

    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(Error::Store(format!("{}: {}", status, body)))
    }

    async fn select(&self, filter: (&str, String)) -> Result<Vec<Device>> {
        let request = self
            .client
            .get(&self.table_url)
            .query(&[("select", "*".to_string()), (filter.0, filter.1)]);

        let response = Self::check(self.authorized(request).send().await?).await?;
        response
            .json::<Vec<Device>>()
            .await
            .map_err(|e| Error::Serialization(e.to_string()))
    }
}

#[async_trait]
impl DeviceStore for RestDeviceStore {
    async fn list_by_owner(&self, owner: &str) -> Result<Vec<Device>> {
        self.select(("user_id", format!("eq.{}", owner))).await
    }

    async fn get(&self, id: &str) -> Result<Option<Device>> {
        Ok(self.select(("id", format!("eq.{}", id))).await?.into_iter().next())
    }

    async fn update(&self, id: &str, patch: &DeviceUpdate) -> Result<()> {
        if patch.is_empty() {
            return Ok(());
        }

        let request = self
            .client
            .patch(&self.table_url)
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", "return=minimal")
            .json(patch);

        Self::check(self.authorized(request).send().await?).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_url() {
        let config = StoreConfig {
            rest_url: "https://project.supabase.co/".to_string(),
            api_key: "anon".to_string(),
            ..Default::default()
        };
        let store = RestDeviceStore::new(&config).unwrap();
        assert_eq!(store.table_url(), "https://project.supabase.co/rest/v1/devices");
        assert_eq!(store.bearer, "anon");
    }

    #[test]
    fn test_access_token_preferred_for_bearer() {
        let config = StoreConfig {
            rest_url: "https://project.supabase.co".to_string(),
            api_key: "anon".to_string(),
            access_token: Some("user-jwt".to_string()),
            ..Default::default()
        };
        let store = RestDeviceStore::new(&config).unwrap();
        assert_eq!(store.bearer, "user-jwt");
    }

    #[test]
    fn test_empty_url_rejected() {
        assert!(matches!(RestDeviceStore::new(&StoreConfig::default()), Err(Error::Config(_))));
    }
}
