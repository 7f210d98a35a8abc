use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::auth::{fetch_token, AccessToken};
use crate::config::StoreConfig;
use crate::error::{GdstoreError, Result};
use crate::interface::{TransactionId, Transport};
use crate::wire::{
    BeginTransactionRequest, BeginTransactionResponse, CommitRequest, CommitResponse,
    LookupRequest, LookupResponse, RunQueryRequest, RunQueryResponse,
};

/// Datastore JSON API over HTTPS with a bearer token.
pub struct HttpTransport {
    config: StoreConfig,
    token: RwLock<AccessToken>,
    client: Client,
}

impl HttpTransport {
    /// Validates the configuration before anything touches the network, then
    /// authorises the service account. A configured `access_token` is used
    /// as is; otherwise a signed assertion is exchanged for one.
    pub async fn authorise(config: &StoreConfig) -> Result<Self> {
        config.validate()?;
        let client = Client::builder().timeout(config.timeout()).build()?;
        let token = match config.access_token.as_deref().filter(|t| !t.trim().is_empty()) {
            Some(token) => AccessToken::fixed(token),
            None => fetch_token(&client, config).await?,
        };
        debug!(dataset = %config.dataset_id, endpoint = %config.endpoint, "datastore client ready");
        Ok(Self { config: config.clone(), token: RwLock::new(token), client })
    }

    /// The current bearer token, minting a new one when it is about to expire.
    async fn bearer(&self) -> Result<String> {
        {
            let token = self.token.read().await;
            if token.is_fresh() {
                return Ok(token.value().to_string());
            }
        }
        let mut token = self.token.write().await;
        if !token.is_fresh() {
            debug!(account = %self.config.service_account, "refreshing access token");
            *token = fetch_token(&self.client, &self.config).await?;
        }
        Ok(token.value().to_string())
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    async fn call<Req, Resp>(&self, method: &str, request: &Req) -> Result<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let url = self.config.method_url(method);
        let bearer = self.bearer().await?;
        let response = self
            .client
            .post(&url)
            .bearer_auth(bearer)
            .json(request)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(method = %method, status = status.as_u16(), "datastore call failed");
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GdstoreError::Auth(body),
                _ => GdstoreError::Transport { status: Some(status.as_u16()), message: body },
            });
        }
        Ok(response.json::<Resp>().await?)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &'static str {
        "http"
    }
    async fn begin_transaction(&self, request: BeginTransactionRequest) -> Result<TransactionId> {
        let response: BeginTransactionResponse = self.call("beginTransaction", &request).await?;
        Ok(response.transaction)
    }
    async fn commit(&self, request: CommitRequest) -> Result<CommitResponse> {
        self.call("commit", &request).await
    }
    async fn run_query(&self, request: RunQueryRequest) -> Result<RunQueryResponse> {
        self.call("runQuery", &request).await
    }
    async fn lookup(&self, request: LookupRequest) -> Result<LookupResponse> {
        self.call("lookup", &request).await
    }
}
