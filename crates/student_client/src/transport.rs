use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use shared::{
    domain::{AssignmentId, HowSolvedStatus, SolvedKind},
    error::ApiError,
    protocol::{HowSolvedRequest, HowSolvedResponse, ProgressPayload},
};
use thiserror::Error;
use tracing::warn;
use url::Url;

use crate::query_state::{with_flag, NO_FILTER_PARAM, PROGRESS_JSON_PARAM, UPDATE_LIST_PARAM};

pub const HIDE_PROGRESS_HEADER: &str = "hide-progress";
pub const DEFAULT_CSRF_HEADER: &str = "X-CSRFToken";

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("server responded with {status}: {message}")]
    Status { status: u16, message: String },
    #[error("invalid response payload: {0}")]
    Decode(String),
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl TransportError {
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            TransportError::Request(err) => err.status().map(|status| status.as_u16()),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND.as_u16())
    }
}

/// Rendered assignment list plus the server's hint about the progress widget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListFragment {
    pub html: String,
    pub hide_progress: bool,
}

/// Server calls made by the page widgets.
#[async_trait]
pub trait StudentTransport: Send + Sync {
    async fn fetch_progress(&self, page_url: &Url) -> Result<ProgressPayload, TransportError>;
    async fn fetch_list(
        &self,
        page_url: &Url,
        no_filter: bool,
    ) -> Result<ListFragment, TransportError>;
    async fn set_howsolved(
        &self,
        assignment_id: AssignmentId,
        kind: SolvedKind,
    ) -> Result<HowSolvedStatus, TransportError>;
    async fn clear_howsolved(&self, assignment_id: AssignmentId) -> Result<(), TransportError>;
}

#[derive(Debug, Clone)]
pub struct CsrfToken {
    pub header: String,
    pub value: String,
}

impl CsrfToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            header: DEFAULT_CSRF_HEADER.to_string(),
            value: value.into(),
        }
    }
}

pub struct HttpTransport {
    http: Client,
    site_url: Url,
    csrf: Option<CsrfToken>,
}

impl HttpTransport {
    /// `site_url` is any URL on the target site; API paths are resolved
    /// against its origin.
    pub fn new(site_url: Url, csrf: Option<CsrfToken>) -> Self {
        Self::with_client(Client::new(), site_url, csrf)
    }

    pub fn with_client(http: Client, site_url: Url, csrf: Option<CsrfToken>) -> Self {
        Self {
            http,
            site_url,
            csrf,
        }
    }

    fn howsolved_url(&self, assignment_id: AssignmentId) -> Result<Url, TransportError> {
        Ok(self
            .site_url
            .join(&format!("/assignment/howsolved/{assignment_id}"))?)
    }

    fn with_csrf(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.csrf {
            Some(token) => request.header(token.header.as_str(), token.value.as_str()),
            None => request,
        }
    }
}

async fn check_status(response: Response) -> Result<Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().clone();
    let body = response.text().await.unwrap_or_default();
    let message = ApiError::from_body(&body)
        .map(|err| err.message)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown status").to_string());
    warn!(
        status = status.as_u16(),
        url = %url,
        reason = %message,
        "transport: request rejected"
    );
    Err(TransportError::Status {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl StudentTransport for HttpTransport {
    async fn fetch_progress(&self, page_url: &Url) -> Result<ProgressPayload, TransportError> {
        let response = self
            .http
            .get(with_flag(page_url, PROGRESS_JSON_PARAM))
            .send()
            .await?;
        let body = check_status(response).await?.text().await?;
        serde_json::from_str(&body).map_err(|err| TransportError::Decode(err.to_string()))
    }

    async fn fetch_list(
        &self,
        page_url: &Url,
        no_filter: bool,
    ) -> Result<ListFragment, TransportError> {
        let mut url = with_flag(page_url, UPDATE_LIST_PARAM);
        if no_filter {
            url = with_flag(&url, NO_FILTER_PARAM);
        }
        let response = check_status(self.http.get(url).send().await?).await?;
        let hide_progress = response.headers().contains_key(HIDE_PROGRESS_HEADER);
        let html = response.text().await?;
        Ok(ListFragment {
            html,
            hide_progress,
        })
    }

    async fn set_howsolved(
        &self,
        assignment_id: AssignmentId,
        kind: SolvedKind,
    ) -> Result<HowSolvedStatus, TransportError> {
        let request = self
            .http
            .post(self.howsolved_url(assignment_id)?)
            .json(&HowSolvedRequest { howsolved: kind });
        let response = check_status(self.with_csrf(request).send().await?).await?;
        let body = response.text().await?;
        let parsed: HowSolvedResponse =
            serde_json::from_str(&body).map_err(|err| TransportError::Decode(err.to_string()))?;
        Ok(parsed.howsolved)
    }

    async fn clear_howsolved(&self, assignment_id: AssignmentId) -> Result<(), TransportError> {
        let request = self.http.delete(self.howsolved_url(assignment_id)?);
        check_status(self.with_csrf(request).send().await?).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
