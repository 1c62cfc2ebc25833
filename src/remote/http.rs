//! JSON-over-HTTP implementation of [`ProfileApi`].

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{FinalizeResponse, ProfileApi, RemoteProgress, SaveAck};
use crate::context::SessionContext;
use crate::error::ApiError;
use crate::progress::AnswerValue;

/// Header carrying the device session id alongside the bearer token.
const SESSION_HEADER: &str = "x-session-id";

#[derive(Serialize)]
struct SaveAnswerBody<'a> {
    question_id: &'a str,
    answer: &'a AnswerValue,
    points: u32,
}

#[derive(Serialize)]
struct SaveBatchBody<'a> {
    answers: &'a BTreeMap<String, AnswerValue>,
    auto_saved: bool,
}

/// Profile service client over `reqwest`.
pub struct HttpProfileApi {
    base_url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl HttpProfileApi {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Transport {
                operation: "client_init".into(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/profile/onboarding{path}", self.base_url)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        operation: &str,
        ctx: &SessionContext,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        debug!(operation, user_id = %ctx.user_id, "Profile API request");

        let response = request
            .bearer_auth(ctx.token.expose_secret())
            .header(SESSION_HEADER, ctx.session_id.to_string())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ApiError::Timeout {
                        operation: operation.to_string(),
                        timeout: self.timeout,
                    }
                } else {
                    ApiError::Transport {
                        operation: operation.to_string(),
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                operation: operation.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        response.json::<T>().await.map_err(|e| ApiError::Decode {
            operation: operation.to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl ProfileApi for HttpProfileApi {
    async fn get_progress(&self, ctx: &SessionContext) -> Result<RemoteProgress, ApiError> {
        let request = self.client.get(self.url("/progress"));
        self.send("get_progress", ctx, request).await
    }

    async fn save_answer(
        &self,
        ctx: &SessionContext,
        question_id: &str,
        answer: &AnswerValue,
        points: u32,
    ) -> Result<SaveAck, ApiError> {
        let request = self.client.post(self.url("/answers")).json(&SaveAnswerBody {
            question_id,
            answer,
            points,
        });
        self.send("save_answer", ctx, request).await
    }

    async fn save_batch(
        &self,
        ctx: &SessionContext,
        answers: &BTreeMap<String, AnswerValue>,
        auto_saved: bool,
    ) -> Result<SaveAck, ApiError> {
        let request = self
            .client
            .post(self.url("/answers/batch"))
            .json(&SaveBatchBody {
                answers,
                auto_saved,
            });
        self.send("save_batch", ctx, request).await
    }

    async fn delete_answer(
        &self,
        ctx: &SessionContext,
        question_id: &str,
    ) -> Result<SaveAck, ApiError> {
        let request = self
            .client
            .delete(self.url(&format!("/answers/{question_id}")));
        self.send("delete_answer", ctx, request).await
    }

    async fn finalize(&self, ctx: &SessionContext) -> Result<FinalizeResponse, ApiError> {
        let request = self.client.post(self.url("/finalize"));
        self.send("finalize", ctx, request).await
    }
}
