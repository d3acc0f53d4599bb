use super::backend::{ApiError, SessionApi};
use crate::model::{Participant, Session};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::info;

/// HTTP client for the session service.
pub struct RestSessionApi {
    http: reqwest::Client,
    base_url: String,
}

impl RestSessionApi {
    pub fn new(base_url: &str) -> Self {
        info!("Session API at {}", base_url);
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        match response.status() {
            StatusCode::NOT_FOUND => Err(ApiError::NotFound),
            status if status.is_success() => response
                .json::<T>()
                .await
                .map_err(|e| ApiError::Protocol(e.to_string())),
            status => Err(ApiError::Protocol(format!("status {}", status))),
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self
            .http
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        Self::decode(response).await
    }

    async fn post<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ApiError> {
        let mut request = self.http.post(self.url(path));
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        Self::decode(response).await
    }
}

#[async_trait::async_trait]
impl SessionApi for RestSessionApi {
    async fn list_sessions(&self) -> Result<Vec<Session>, ApiError> {
        self.get("/sessions").await
    }

    async fn fetch_session(&self, id: &str) -> Result<Session, ApiError> {
        self.get(&format!("/sessions/{}", id)).await
    }

    async fn fetch_by_code(&self, code: &str) -> Result<Session, ApiError> {
        self.get(&format!("/sessions/code/{}", code)).await
    }

    async fn create_session(&self, session: &Session) -> Result<Session, ApiError> {
        self.post("/sessions", Some(session)).await
    }

    async fn join_session(
        &self,
        id: &str,
        participant: &Participant,
    ) -> Result<Session, ApiError> {
        self.post(&format!("/sessions/{}/join", id), Some(participant))
            .await
    }

    async fn start_session(&self, id: &str) -> Result<Session, ApiError> {
        self.post::<Session, ()>(&format!("/sessions/{}/start", id), None)
            .await
    }

    async fn end_session(&self, id: &str, transcript: &[String]) -> Result<Session, ApiError> {
        let body = serde_json::json!({ "transcript": transcript });
        self.post(&format!("/sessions/{}/end", id), Some(&body)).await
    }

    async fn admit_participant(
        &self,
        id: &str,
        participant_id: &str,
    ) -> Result<Session, ApiError> {
        self.post::<Session, ()>(
            &format!("/sessions/{}/admit/{}", id, participant_id),
            None,
        )
        .await
    }
}
