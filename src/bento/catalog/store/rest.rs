use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::{Map, Value};
use tracing::debug;

use crate::bento::catalog::error::StoreError;
use crate::bento::catalog::store::{KeyFilter, Lookup, RemoteStore};

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Client for a PostgREST-style data API.
///
/// Filters are sent as `field=eq.value` query parameters, inserts as `POST`
/// and updates as `PATCH` against the collection endpoint.
#[derive(Debug, Clone)]
pub struct RestStore {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl RestStore {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(concat!("bento-sync/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self::with_client(client, base_url, api_key))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            api_key,
        }
    }

    fn endpoint(&self, collection: &str) -> String {
        format!("{}/{}", self.base_url, collection)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("apikey", key).bearer_auth(key),
            None => request,
        }
    }

    async fn fetch(&self, collection: &str, key: &KeyFilter) -> Result<Vec<Map<String, Value>>, StoreError> {
        let url = self.endpoint(collection);
        debug!(%url, filter = ?key.pairs(), "looking up record");

        let request = self
            .client
            .get(&url)
            .query(&[("select", "*")])
            .query(&filter_query(key));
        let response = self.authorize(request).send().await.map_err(transport)?;
        let response = ensure_success(response).await?;
        response
            .json::<Vec<Map<String, Value>>>()
            .await
            .map_err(|err| StoreError::Decode(err.to_string()))
    }
}

#[async_trait]
impl RemoteStore for RestStore {
    async fn lookup(&self, collection: &str, key: &KeyFilter) -> Lookup {
        match self.fetch(collection, key).await {
            Ok(rows) => Lookup::from_matches(rows),
            Err(err) => Lookup::Failed(err),
        }
    }

    async fn insert(&self, collection: &str, body: &Value) -> Result<(), StoreError> {
        let request = self
            .client
            .post(self.endpoint(collection))
            .header("Prefer", "return=minimal")
            .json(body);
        let response = self.authorize(request).send().await.map_err(transport)?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        handle: &KeyFilter,
        body: &Value,
    ) -> Result<(), StoreError> {
        let request = self
            .client
            .patch(self.endpoint(collection))
            .query(&filter_query(handle))
            .header("Prefer", "return=minimal")
            .json(body);
        let response = self.authorize(request).send().await.map_err(transport)?;
        ensure_success(response).await?;
        Ok(())
    }
}

fn filter_query(filter: &KeyFilter) -> Vec<(String, String)> {
    filter
        .pairs()
        .iter()
        .map(|(field, value)| (field.clone(), format!("eq.{value}")))
        .collect()
}

fn transport(err: reqwest::Error) -> StoreError {
    StoreError::Transport(err.to_string())
}

async fn ensure_success(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StoreError::Status {
        status: status.as_u16(),
        body,
    })
}
