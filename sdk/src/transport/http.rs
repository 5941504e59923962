//! reqwest-backed [`RestClient`].
//!
//! Header contract with the server:
//!
//! | Header      | Query (GET)                          | Submit (POST) |
//! |-------------|--------------------------------------|---------------|
//! | `UserID`    | acting user                          | acting user   |
//! | `Signature` | base64(sign(JSON(query)))            | (none)        |
//!
//! Submissions are not signed at the HTTP layer: the envelope already
//! carries the user's signature over its payload.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::CONTENT_TYPE;
use url::Url;

use super::{RestClient, RestResponse, TransportError};
use crate::config::{SIGNATURE_HEADER, USER_HEADER};
use crate::crypto::Signer;
use crate::types::{Envelope, Query};

pub struct HttpRestClient {
    user_id: String,
    client: reqwest::Client,
    signer: Arc<dyn Signer>,
}

impl HttpRestClient {
    /// Wraps an existing reqwest client (shared pool, custom TLS roots, ...).
    pub fn new(user_id: impl Into<String>, client: reqwest::Client, signer: Arc<dyn Signer>) -> Self {
        Self {
            user_id: user_id.into(),
            client,
            signer,
        }
    }

    /// Builds a dedicated client whose connect phase is bounded by
    /// `connect_timeout`. Whole-request deadlines are applied by the
    /// transaction context.
    pub fn with_connect_timeout(
        user_id: impl Into<String>,
        signer: Arc<dyn Signer>,
        connect_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self::new(user_id, client, signer))
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    async fn into_rest_response(response: reqwest::Response) -> Result<RestResponse, TransportError> {
        let status = response.status();
        let body = response.bytes().await?;
        Ok(RestResponse {
            status,
            body: (!body.is_empty()).then_some(body),
        })
    }
}

#[async_trait]
impl RestClient for HttpRestClient {
    async fn query(&self, url: &Url, query: &Query) -> Result<RestResponse, TransportError> {
        let signed = query.to_bytes()?;
        let signature = self.signer.sign(&signed)?;

        tracing::debug!(url = %url, user_id = %self.user_id, "sending query");
        let response = self
            .client
            .get(url.clone())
            .header(USER_HEADER, &self.user_id)
            .header(SIGNATURE_HEADER, STANDARD.encode(signature))
            .send()
            .await?;
        Self::into_rest_response(response).await
    }

    async fn submit(&self, url: &Url, envelope: &Envelope) -> Result<RestResponse, TransportError> {
        let body = envelope.to_bytes()?;

        tracing::debug!(url = %url, tx_id = %envelope.tx_id(), "submitting envelope");
        let response = self
            .client
            .post(url.clone())
            .header(USER_HEADER, &self.user_id)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;
        Self::into_rest_response(response).await
    }
}
