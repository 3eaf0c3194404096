use crate::config::Config;
use crate::error::ApiError;
use crate::models::{
    AuthResponse, ChatRequest, ChatResponse, LoginRequest, PersonalizeRequest,
    PersonalizeResponse, SignupRequest, TranslateRequest, TranslateResponse,
};
use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Content shorter than this is not worth a transform round trip.
pub const MIN_TRANSFORM_CHARS: usize = 50;

pub const CHAT_PATH: &str = "/api/chat/";
pub const SIGNUP_PATH: &str = "/api/auth/signup";
pub const LOGIN_PATH: &str = "/api/auth/login";
pub const PERSONALIZE_PATH: &str = "/api/content/personalize";
pub const TRANSLATE_PATH: &str = "/api/content/translate";

/// Rejects personalize/translate payloads before anything goes on the wire.
pub fn check_transform_content(content: &str) -> Result<(), ApiError> {
    if content.trim().chars().count() < MIN_TRANSFORM_CHARS {
        return Err(ApiError::Validation(format!(
            "Content is too short to transform (at least {MIN_TRANSFORM_CHARS} characters are needed)."
        )));
    }
    Ok(())
}

pub fn check_question(question: &str) -> Result<(), ApiError> {
    if question.trim().is_empty() {
        return Err(ApiError::Validation("Please enter a question.".to_string()));
    }
    Ok(())
}

/// The calls the reader makes against the answer backend.
#[allow(async_fn_in_trait)]
pub trait Backend {
    async fn ask(&self, request: &ChatRequest) -> Result<ChatResponse, ApiError>;
    async fn signup(&self, request: &SignupRequest) -> Result<AuthResponse, ApiError>;
    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, ApiError>;
    async fn personalize(
        &self,
        request: &PersonalizeRequest,
    ) -> Result<PersonalizeResponse, ApiError>;
    async fn translate(&self, request: &TranslateRequest) -> Result<TranslateResponse, ApiError>;
}

/// HTTP client for the external answer/transform/auth backend.
pub struct BackendClient {
    client: reqwest::Client,
    api_url: String,
}

impl BackendClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to build backend HTTP client")?;

        Ok(BackendClient {
            client,
            api_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Sends one POST and hands back the JSON body untouched on 2xx.
    pub async fn relay<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value, ApiError> {
        let url = format!("{}{}", self.api_url, path);
        tracing::debug!(%url, "relaying request to backend");

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|err| {
                tracing::warn!(%url, error = %err, "backend unreachable");
                ApiError::Connection(err.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%url, status = status.as_u16(), "backend returned an error");
            return Err(ApiError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|err| ApiError::Decode(err.to_string()))
    }

    async fn call<B, R>(&self, path: &str, body: &B) -> Result<R, ApiError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let value = self.relay(path, body).await?;
        serde_json::from_value(value).map_err(|err| ApiError::Decode(err.to_string()))
    }
}

impl Backend for BackendClient {
    async fn ask(&self, request: &ChatRequest) -> Result<ChatResponse, ApiError> {
        check_question(&request.question)?;
        self.call(CHAT_PATH, request).await
    }

    async fn signup(&self, request: &SignupRequest) -> Result<AuthResponse, ApiError> {
        self.call(SIGNUP_PATH, request).await
    }

    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, ApiError> {
        self.call(LOGIN_PATH, request).await
    }

    async fn personalize(
        &self,
        request: &PersonalizeRequest,
    ) -> Result<PersonalizeResponse, ApiError> {
        check_transform_content(&request.content)?;
        self.call(PERSONALIZE_PATH, request).await
    }

    async fn translate(&self, request: &TranslateRequest) -> Result<TranslateResponse, ApiError> {
        check_transform_content(&request.content)?;
        self.call(TRANSLATE_PATH, request).await
    }
}
