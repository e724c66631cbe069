//! Exchange REST client. Every read is a full snapshot; writes are
//! fire-and-poll (the next live sync observes their effect). An auth
//! failure triggers exactly one credential refresh and replay before the
//! error surfaces to the polling caller.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{DealwatchError, Result};
use crate::services::notifications::Rating;
use crate::services::types::{Balance, ChatMessage, Deal, Dispute};

/// Source of the bearer credential attached to every request. Session
/// bootstrap itself is outside this core.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Current credential, possibly stale.
    async fn token(&self) -> Result<String>;
    /// Obtain a fresh credential after a rejection.
    async fn refresh(&self) -> Result<String>;
}

/// Lifecycle actions a user can take on a deal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DealAction {
    Accept,
    Decline,
    Cancel,
}

impl DealAction {
    fn path_segment(&self) -> &'static str {
        match self {
            DealAction::Accept => "accept",
            DealAction::Decline => "decline",
            DealAction::Cancel => "cancel",
        }
    }
}

/// Read/write surface of the exchange backend, as the scheduler and
/// state layer consume it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExchangeApi: Send + Sync {
    async fn get_deals(&self) -> Result<Vec<Deal>>;
    async fn get_deal(&self, id: i64) -> Result<Option<Deal>>;
    async fn get_balance(&self) -> Result<Balance>;
    async fn get_disputes(&self) -> Result<Vec<Dispute>>;
    async fn get_dispute(&self, id: i64) -> Result<Option<Dispute>>;
    async fn get_chat_messages(&self, deal_id: i64) -> Result<Vec<ChatMessage>>;

    async fn deal_action(&self, id: i64, action: DealAction) -> Result<()>;
    async fn send_chat_message(&self, deal_id: i64, text: &str) -> Result<()>;
    async fn submit_review<'a>(
        &self,
        deal_id: i64,
        rating: Rating,
        comment: Option<&'a str>,
    ) -> Result<()>;
    async fn resolve_dispute(&self, id: i64, seller_amount: f64, buyer_amount: f64) -> Result<()>;
}

/// HTTP implementation of [`ExchangeApi`].
pub struct ExchangeApiClient {
    base_url: String,
    http: reqwest::Client,
    credentials: Arc<dyn CredentialProvider>,
}

impl ExchangeApiClient {
    pub fn new(base_url: &str, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self::with_timeout(base_url, credentials, Duration::from_secs(15))
    }

    pub fn with_timeout(
        base_url: &str,
        credentials: Arc<dyn CredentialProvider>,
        timeout: Duration,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            credentials,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn is_auth_failure(status: StatusCode) -> bool {
        status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
    }

    /// Issue a GET, refreshing the credential and replaying once if the
    /// backend rejects it.
    async fn get_response(&self, path: &str) -> Result<reqwest::Response> {
        let token = self.credentials.token().await?;
        let url = self.url(path);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| DealwatchError::Api(format!("GET {}: {}", path, e)))?;

        if !Self::is_auth_failure(resp.status()) {
            return Ok(resp);
        }

        log::info!("GET {} rejected ({}), refreshing credential", path, resp.status());
        let token = self.credentials.refresh().await?;
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| DealwatchError::Api(format!("GET {} (retry): {}", path, e)))?;
        if Self::is_auth_failure(resp.status()) {
            return Err(DealwatchError::Auth(format!(
                "GET {} rejected after credential refresh: {}",
                path,
                resp.status()
            )));
        }
        Ok(resp)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let resp = self.get_response(path).await?;
        if !resp.status().is_success() {
            return Err(DealwatchError::Api(format!(
                "GET {} returned {}",
                path,
                resp.status()
            )));
        }
        resp.json::<T>()
            .await
            .map_err(|e| DealwatchError::Api(format!("Parse {}: {}", path, e)))
    }

    /// Like [`Self::get_json`] but a 404 is "no data", not an error.
    async fn get_json_opt<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let resp = self.get_response(path).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(DealwatchError::Api(format!(
                "GET {} returned {}",
                path,
                resp.status()
            )));
        }
        resp.json::<T>()
            .await
            .map(Some)
            .map_err(|e| DealwatchError::Api(format!("Parse {}: {}", path, e)))
    }

    /// Fire-and-poll POST with the same one-shot auth retry.
    async fn post_action<B: Serialize + ?Sized + Sync>(&self, path: &str, body: &B) -> Result<()> {
        let token = self.credentials.token().await?;
        let url = self.url(path);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&token)
            .json(body)
            .send()
            .await
            .map_err(|e| DealwatchError::Api(format!("POST {}: {}", path, e)))?;

        let resp = if Self::is_auth_failure(resp.status()) {
            log::info!("POST {} rejected ({}), refreshing credential", path, resp.status());
            let token = self.credentials.refresh().await?;
            self.http
                .post(&url)
                .bearer_auth(&token)
                .json(body)
                .send()
                .await
                .map_err(|e| DealwatchError::Api(format!("POST {} (retry): {}", path, e)))?
        } else {
            resp
        };

        if Self::is_auth_failure(resp.status()) {
            return Err(DealwatchError::Auth(format!(
                "POST {} rejected after credential refresh: {}",
                path,
                resp.status()
            )));
        }
        if !resp.status().is_success() {
            return Err(DealwatchError::Api(format!(
                "POST {} returned {}",
                path,
                resp.status()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ExchangeApi for ExchangeApiClient {
    async fn get_deals(&self) -> Result<Vec<Deal>> {
        self.get_json("/deals").await
    }

    async fn get_deal(&self, id: i64) -> Result<Option<Deal>> {
        self.get_json_opt(&format!("/deals/{}", id)).await
    }

    async fn get_balance(&self) -> Result<Balance> {
        self.get_json("/balance").await
    }

    async fn get_disputes(&self) -> Result<Vec<Dispute>> {
        self.get_json("/disputes").await
    }

    async fn get_dispute(&self, id: i64) -> Result<Option<Dispute>> {
        self.get_json_opt(&format!("/disputes/{}", id)).await
    }

    async fn get_chat_messages(&self, deal_id: i64) -> Result<Vec<ChatMessage>> {
        self.get_json(&format!("/deals/{}/chat", deal_id)).await
    }

    async fn deal_action(&self, id: i64, action: DealAction) -> Result<()> {
        self.post_action(
            &format!("/deals/{}/{}", id, action.path_segment()),
            &serde_json::json!({}),
        )
        .await
    }

    async fn send_chat_message(&self, deal_id: i64, text: &str) -> Result<()> {
        self.post_action(
            &format!("/deals/{}/chat", deal_id),
            &serde_json::json!({ "text": text }),
        )
        .await
    }

    async fn submit_review<'a>(
        &self,
        deal_id: i64,
        rating: Rating,
        comment: Option<&'a str>,
    ) -> Result<()> {
        self.post_action(
            &format!("/deals/{}/review", deal_id),
            &serde_json::json!({ "rating": rating, "comment": comment }),
        )
        .await
    }

    async fn resolve_dispute(&self, id: i64, seller_amount: f64, buyer_amount: f64) -> Result<()> {
        self.post_action(
            &format!("/disputes/{}/resolve", id),
            &serde_json::json!({ "sellerAmount": seller_amount, "buyerAmount": buyer_amount }),
        )
        .await
    }
}
