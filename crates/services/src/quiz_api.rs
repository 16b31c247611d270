use std::env;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use quiz_core::model::{QuizDefinition, QuizId, SubmissionRequest, SubmissionResult};

use crate::error::{DefinitionFetchError, SubmissionError};

/// The two backend operations the session engine consumes.
///
/// Everything else the platform serves (rosters, messaging, dashboards) is
/// somebody else's client; the engine only ever loads a definition and
/// submits one attempt.
#[async_trait]
pub trait QuizBackend: Send + Sync {
    /// `GET /quizzes/{id}` — the immutable definition for one attempt.
    async fn fetch_quiz(&self, id: QuizId) -> Result<QuizDefinition, DefinitionFetchError>;

    /// `POST /quizzes/{id}/submit` — score a frozen answer vector.
    async fn submit_quiz(
        &self,
        id: QuizId,
        request: &SubmissionRequest,
    ) -> Result<SubmissionResult, SubmissionError>;
}

#[derive(Clone, Debug)]
pub struct QuizApiConfig {
    pub base_url: String,
    pub auth_token: Option<String>,
}

impl QuizApiConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            auth_token: None,
        }
    }

    #[must_use]
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    #[must_use]
    pub fn from_env() -> Option<Self> {
        let base_url = env::var("SCHOOL_API_BASE_URL").ok()?;
        if base_url.trim().is_empty() {
            return None;
        }
        let auth_token = env::var("SCHOOL_API_TOKEN")
            .ok()
            .filter(|token| !token.trim().is_empty());
        Some(Self {
            base_url,
            auth_token,
        })
    }
}

/// REST client for the school-management platform's quiz endpoints.
#[derive(Clone)]
pub struct QuizApiService {
    client: Client,
    config: QuizApiConfig,
}

impl QuizApiService {
    #[must_use]
    pub fn new(config: QuizApiConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn from_env() -> Option<Self> {
        QuizApiConfig::from_env().map(Self::new)
    }

    fn quiz_url(&self, id: QuizId) -> String {
        format!("{}/quizzes/{id}", self.config.base_url.trim_end_matches('/'))
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl QuizBackend for QuizApiService {
    async fn fetch_quiz(&self, id: QuizId) -> Result<QuizDefinition, DefinitionFetchError> {
        let response = self
            .authorized(self.client.get(self.quiz_url(id)))
            .send()
            .await
            .map_err(DefinitionFetchError::Network)?;

        match response.status() {
            StatusCode::NOT_FOUND => return Err(DefinitionFetchError::NotFound),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(DefinitionFetchError::Unauthorized);
            }
            status if !status.is_success() => return Err(DefinitionFetchError::Http(status)),
            _ => {}
        }

        // Domain validation (duration > 0, >= 2 options per question) runs
        // inside deserialization, so a rule-breaking body lands here too.
        response
            .json::<QuizDefinition>()
            .await
            .map_err(DefinitionFetchError::Malformed)
    }

    async fn submit_quiz(
        &self,
        id: QuizId,
        request: &SubmissionRequest,
    ) -> Result<SubmissionResult, SubmissionError> {
        let url = format!("{}/submit", self.quiz_url(id));
        let response = self
            .authorized(self.client.post(url))
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if status.is_server_error() {
            return Err(SubmissionError::Server(status));
        }
        if !status.is_success() {
            return Err(SubmissionError::Rejected(status));
        }

        Ok(response.json::<SubmissionResult>().await?)
    }
}
