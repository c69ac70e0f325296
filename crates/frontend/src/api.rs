use photomoa_shared::models::{
    AnalysisResult, CalibrateRequest, CalibrateResponse, ErrorBody, HistoryEntry,
    UpdateShotsRequest,
};
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Transport(String),
    #[error("{message}")]
    Status { status: u16, message: String },
    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        ApiError::Transport(e.to_string())
    }
}

/// The two mutations a result view submits. Kept behind a trait so the
/// view controller can run against an in-memory fake.
#[allow(async_fn_in_trait)]
pub trait ResultSyncClient {
    async fn calibrate(
        &self,
        id: &str,
        request: &CalibrateRequest,
    ) -> Result<CalibrateResponse, ApiError>;

    async fn update_shots(
        &self,
        id: &str,
        request: &UpdateShotsRequest,
    ) -> Result<AnalysisResult, ApiError>;
}

/// Build an error from a non-success body, preferring the server's
/// `{"error": ...}` message.
pub fn error_from_body(status: u16, body: &str) -> ApiError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error)
        .unwrap_or_else(|_| format!("Request failed with status {}", status));
    ApiError::Status { status, message }
}

async fn read_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ApiError> {
    let status = resp.status();
    let body = resp.text().await?;
    if !status.is_success() {
        return Err(error_from_body(status.as_u16(), &body));
    }
    serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
}

#[derive(Debug, Clone)]
pub struct HttpClient {
    http: reqwest::Client,
    base: String,
}

impl HttpClient {
    pub fn new(base: impl Into<String>) -> Self {
        HttpClient {
            http: reqwest::Client::new(),
            base: base.into().trim_end_matches('/').to_string(),
        }
    }

    /// `PHOTOMOA_API_BASE` at build time, otherwise `/api` on the page origin.
    pub fn from_env() -> Self {
        if let Some(base) = option_env!("PHOTOMOA_API_BASE") {
            return HttpClient::new(base);
        }
        let origin = web_sys::window()
            .and_then(|w| w.location().origin().ok())
            .unwrap_or_default();
        HttpClient::new(format!("{}/api", origin))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path)
    }

    /// Resolve an image reference from a result against the API host.
    pub fn image_url(&self, image: &str) -> String {
        if image.starts_with("http://") || image.starts_with("https://") {
            return image.to_string();
        }
        let host = self.base.strip_suffix("/api").unwrap_or(&self.base);
        if image.starts_with('/') {
            format!("{}{}", host, image)
        } else {
            self.url(&format!("image/{}", image))
        }
    }

    pub async fn upload(&self, file_name: String, bytes: Vec<u8>) -> Result<AnalysisResult, ApiError> {
        let form = Form::new().part("image", Part::bytes(bytes).file_name(file_name));
        let resp = self.http.post(self.url("upload")).multipart(form).send().await?;
        read_json(resp).await
    }

    pub async fn fetch_history(&self) -> Result<Vec<HistoryEntry>, ApiError> {
        let resp = self.http.get(self.url("history")).send().await?;
        read_json(resp).await
    }

    pub async fn delete_entry(&self, id: &str) -> Result<(), ApiError> {
        let resp = self
            .http
            .delete(self.url(&format!("delete/{}", id)))
            .send()
            .await?;
        let _: serde_json::Value = read_json(resp).await?;
        Ok(())
    }
}

impl ResultSyncClient for HttpClient {
    async fn calibrate(
        &self,
        id: &str,
        request: &CalibrateRequest,
    ) -> Result<CalibrateResponse, ApiError> {
        let resp = self
            .http
            .post(self.url(&format!("calibrate/{}", id)))
            .json(request)
            .send()
            .await?;
        read_json(resp).await
    }

    async fn update_shots(
        &self,
        id: &str,
        request: &UpdateShotsRequest,
    ) -> Result<AnalysisResult, ApiError> {
        let resp = self
            .http
            .post(self.url(&format!("update-shots/{}", id)))
            .json(request)
            .send()
            .await?;
        read_json(resp).await
    }
}
