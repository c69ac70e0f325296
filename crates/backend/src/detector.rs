use photomoa_shared::models::Point;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum DetectorError {
    #[error("request to detector failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("detector returned status {0}")]
    Status(u16),
}

#[derive(Debug, Deserialize)]
struct DetectionResponse {
    #[serde(default)]
    shots: Vec<Point>,
}

/// Source of automatically detected shot positions.
///
/// Detection itself runs in an external image-analysis service; without one
/// configured every upload starts with an empty shot list.
#[derive(Debug, Clone)]
pub enum Detector {
    Disabled,
    Remote { http: reqwest::Client, url: String },
}

impl Detector {
    pub fn from_url(url: Option<String>) -> Self {
        match url {
            Some(url) => Detector::Remote {
                http: reqwest::Client::new(),
                url,
            },
            None => Detector::Disabled,
        }
    }

    pub async fn detect(&self, filename: &str, image: &[u8]) -> Result<Vec<Point>, DetectorError> {
        let (http, url) = match self {
            Detector::Disabled => return Ok(Vec::new()),
            Detector::Remote { http, url } => (http, url),
        };

        let part = Part::bytes(image.to_vec()).file_name(filename.to_string());
        let resp = http
            .post(url.as_str())
            .multipart(Form::new().part("image", part))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(DetectorError::Status(resp.status().as_u16()));
        }
        let body: DetectionResponse = resp.json().await?;
        tracing::debug!(filename, shots = body.shots.len(), "Detector responded");
        Ok(body.shots)
    }
}
