//! REST client for the remote store.
//!
//! `GET`/`POST {base}/{table}`, `PATCH`/`DELETE {base}/{table}/{id}`.

use std::marker::PhantomData;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;

use super::{RemoteError, RemoteStore};
use crate::models::Entity;

/// Connection settings shared by every table client.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

/// HTTP client for one remote table.
pub struct HttpRemote<T> {
    client: Client,
    table_url: String,
    api_key: Option<String>,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> HttpRemote<T> {
    pub fn new(config: &RemoteConfig) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RemoteError::Unavailable(format!("failed to build client: {}", e)))?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: Client, config: &RemoteConfig) -> Self {
        Self {
            client,
            table_url: format!("{}/{}", config.base_url.trim_end_matches('/'), T::TABLE),
            api_key: config.api_key.clone(),
            _entity: PhantomData,
        }
    }

    fn record_url(&self, id: &str) -> String {
        format!("{}/{}", self.table_url, id)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("apikey", key).bearer_auth(key),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, RemoteError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| RemoteError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn read_json(response: Response) -> Result<Value, RemoteError> {
        let bytes = response
            .bytes()
            .await
            .map_err(|e| RemoteError::Unavailable(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| RemoteError::Malformed(e.to_string()))
    }
}

/// Decode one record and check it carries an id.
fn decode_record<T: Entity>(value: Value) -> Result<T, RemoteError> {
    let record: T =
        serde_json::from_value(value).map_err(|e| RemoteError::Malformed(e.to_string()))?;
    if !record.has_id() {
        return Err(RemoteError::Malformed(format!("{} without id", T::KIND)));
    }
    Ok(record)
}

#[async_trait]
impl<T: Entity> RemoteStore<T> for HttpRemote<T> {
    async fn list(&self) -> Result<Vec<T>, RemoteError> {
        let response = self.send(self.client.get(&self.table_url)).await?;
        match Self::read_json(response).await? {
            Value::Array(items) => items.into_iter().map(decode_record).collect(),
            other => Err(RemoteError::Malformed(format!(
                "expected array of {}, got {}",
                T::TABLE,
                other
            ))),
        }
    }

    async fn insert(&self, entity: &T) -> Result<T, RemoteError> {
        let request = self
            .client
            .post(&self.table_url)
            .header("Prefer", "return=representation")
            .json(entity);
        let response = self.send(request).await?;

        // Some backends answer inserts with a one-element array.
        match Self::read_json(response).await? {
            Value::Array(mut items) if items.len() == 1 => decode_record(items.remove(0)),
            Value::Array(items) => Err(RemoteError::Malformed(format!(
                "insert returned {} records",
                items.len()
            ))),
            value => decode_record(value),
        }
    }

    async fn update(&self, id: &str, patch: &Value) -> Result<(), RemoteError> {
        let request = self.client.patch(self.record_url(id)).json(patch);
        self.send(request).await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), RemoteError> {
        self.send(self.client.delete(self.record_url(id))).await?;
        Ok(())
    }
}
