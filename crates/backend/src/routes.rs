use std::path::Path;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Multipart, Path as UrlPath, State};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::{DateTime, Local};
use photomoa_shared::calc::MeasurementCalculator;
use photomoa_shared::models::{
    AnalysisResult, CalibrateResponse, HistoryEntry, Point, UpdateShotsRequest,
};
use photomoa_shared::scale;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::detector::Detector;
use crate::error::ApiError;
use crate::storage::{CalibrationRecord, EntryRecord, Storage};

const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;
const MAX_ID_ATTEMPTS: usize = 4;

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<Storage>,
    pub config: Arc<Config>,
    pub detector: Arc<Detector>,
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::BadRequest(e.body_text())
    }
}

/// Successful response body: the payload plus `"success": true`.
#[derive(Debug, Serialize)]
pub struct Success<T> {
    success: bool,
    #[serde(flatten)]
    body: T,
}

impl<T> Success<T> {
    fn new(body: T) -> Json<Self> {
        Json(Success {
            success: true,
            body,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct UpdateShotsResponse {
    #[serde(flatten)]
    result: AnalysisResult,
    manual_shots: Vec<Point>,
}

#[derive(Debug, Serialize)]
pub struct Message {
    message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct Health {
    status: &'static str,
    service: &'static str,
}

/// Calibration body. Points are optional so a missing one gets a readable
/// error instead of a generic JSON rejection.
#[derive(Debug, Deserialize)]
pub struct CalibratePayload {
    point1: Option<Point>,
    point2: Option<Point>,
    #[serde(default = "default_distance_inches")]
    distance_inches: f64,
}

fn default_distance_inches() -> f64 {
    1.0
}

pub fn image_url(filename: &str) -> String {
    format!("/api/image/{}", filename)
}

fn analysis_result(record: &EntryRecord, default_pixels_per_inch: f64) -> AnalysisResult {
    AnalysisResult {
        id: record.entry.id.clone(),
        shot_count: record.entry.shot_count,
        moa_value: record.entry.moa_value,
        annotated_image: image_url(&record.entry.annotated_filename),
        shots: record.entry.shots.clone(),
        pixels_per_inch: Some(record.pixels_per_inch().unwrap_or(default_pixels_per_inch)),
    }
}

/// Reduce a client-supplied file name to a safe basename.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    base.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect::<String>()
        .trim_start_matches('.')
        .to_string()
}

/// Entry id for the given upload second. The first attempt is the bare
/// timestamp; retries get a short random suffix.
fn entry_id(stamp: &str, attempt: usize) -> String {
    if attempt == 0 {
        return stamp.to_string();
    }
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}", stamp, &suffix[..8])
}

/// Store a new entry under a fresh id. Ids are claimed inside the insert
/// transaction, so two uploads in the same second never share one.
fn insert_entry(
    storage: &Storage,
    now: DateTime<Local>,
    original_name: &str,
    shots: Vec<Point>,
    moa_value: Option<f64>,
) -> Result<EntryRecord, ApiError> {
    let stamp = now.format("%Y%m%d_%H%M%S").to_string();
    let mut record = EntryRecord {
        entry: HistoryEntry {
            id: String::new(),
            filename: String::new(),
            annotated_filename: String::new(),
            upload_time: now.to_rfc3339(),
            shot_count: shots.len(),
            moa_value,
            shots,
        },
        calibration: None,
        manual_shots: Vec::new(),
        last_updated: None,
    };

    for attempt in 0..MAX_ID_ATTEMPTS {
        let id = entry_id(&stamp, attempt);
        record.entry.filename = format!("target_{}_{}", id, original_name);
        record.entry.annotated_filename = format!("annotated_{}", record.entry.filename);
        record.entry.id = id;
        if storage.insert_new(&record).map_err(ApiError::Storage)? {
            return Ok(record);
        }
        tracing::debug!(id = %record.entry.id, "Entry id taken, retrying");
    }
    Err(ApiError::Storage(format!(
        "no free entry id for {} after {} attempts",
        stamp, MAX_ID_ATTEMPTS
    )))
}

/// Fully decode the upload. Anything the decoders reject is not a usable
/// target photo, even when its header looks like an image.
async fn decode_dimensions(data: Bytes) -> Result<(u32, u32), ApiError> {
    let decoded = tokio::task::spawn_blocking(move || {
        image::load_from_memory(&data).map(|img| (img.width(), img.height()))
    })
    .await?;
    decoded.map_err(|e| {
        tracing::debug!(error = %e, "Upload is not a decodable image");
        ApiError::BadRequest("Invalid image file".to_string())
    })
}

async fn write_images(upload_dir: &Path, entry: &HistoryEntry, data: &[u8]) -> Result<(), ApiError> {
    tokio::fs::create_dir_all(upload_dir).await?;
    tokio::fs::write(upload_dir.join(&entry.filename), data).await?;
    tokio::fs::write(upload_dir.join(&entry.annotated_filename), data).await?;
    Ok(())
}

async fn remove_if_exists(path: &Path) -> Result<(), ApiError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Success<AnalysisResult>>, ApiError> {
    let mut image = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("image") {
            continue;
        }
        let name = field.file_name().unwrap_or_default().to_string();
        let data = field.bytes().await?;
        image = Some((name, data));
        break;
    }

    let (original_name, data) =
        image.ok_or_else(|| ApiError::BadRequest("No image file provided".to_string()))?;
    let original_name = sanitize_filename(&original_name);
    if original_name.is_empty() {
        return Err(ApiError::BadRequest("No file selected".to_string()));
    }
    let (width, height) = decode_dimensions(data.clone()).await?;

    let now = Local::now();
    let shots = state.detector.detect(&original_name, &data).await?;
    let default_pixels_per_inch = state.config.default_pixels_per_inch;
    let moa_value = MeasurementCalculator::with_scale(Some(default_pixels_per_inch)).moa(&shots);

    let record = insert_entry(&state.storage, now, &original_name, shots, moa_value)?;
    if let Err(e) = write_images(&state.config.upload_dir, &record.entry, &data).await {
        state
            .storage
            .delete_entry(&record.entry.id)
            .map_err(ApiError::Storage)?;
        return Err(e);
    }

    tracing::info!(
        id = %record.entry.id,
        file = %record.entry.filename,
        width,
        height,
        shots = record.entry.shot_count,
        moa = ?record.entry.moa_value,
        "Target uploaded"
    );
    Ok(Success::new(analysis_result(&record, default_pixels_per_inch)))
}

async fn history(State(state): State<AppState>) -> Result<Json<Vec<HistoryEntry>>, ApiError> {
    let entries = state
        .storage
        .list_entries()
        .map_err(ApiError::Storage)?
        .into_iter()
        .map(|r| r.entry)
        .collect();
    Ok(Json(entries))
}

async fn delete_entry(
    State(state): State<AppState>,
    UrlPath(id): UrlPath<String>,
) -> Result<Json<Success<Message>>, ApiError> {
    let record = state
        .storage
        .delete_entry(&id)
        .map_err(ApiError::Storage)?
        .ok_or(ApiError::NotFound)?;

    let upload_dir = &state.config.upload_dir;
    remove_if_exists(&upload_dir.join(&record.entry.filename)).await?;
    remove_if_exists(&upload_dir.join(&record.entry.annotated_filename)).await?;

    tracing::info!(id = %id, "Target deleted");
    Ok(Success::new(Message {
        message: "Target deleted successfully",
    }))
}

async fn calibrate(
    State(state): State<AppState>,
    UrlPath(id): UrlPath<String>,
    payload: Result<Json<CalibratePayload>, JsonRejection>,
) -> Result<Json<Success<CalibrateResponse>>, ApiError> {
    let Json(payload) = payload?;
    let (Some(point1), Some(point2)) = (payload.point1, payload.point2) else {
        return Err(ApiError::BadRequest("Two calibration points required".to_string()));
    };
    let pixels_per_inch = scale::pixels_per_inch(point1, point2, payload.distance_inches)?;

    let calibration = CalibrationRecord {
        point1,
        point2,
        distance_inches: payload.distance_inches,
        pixels_per_inch,
    };
    let calculator = MeasurementCalculator::with_scale(Some(pixels_per_inch));
    let updated_at = Local::now().to_rfc3339();

    let record = state
        .storage
        .update_entry(&id, |record| {
            record.entry.moa_value = calculator.moa(&record.entry.shots);
            record.calibration = Some(calibration);
            record.last_updated = Some(updated_at);
        })
        .map_err(ApiError::Storage)?
        .ok_or(ApiError::NotFound)?;

    tracing::info!(
        id = %id,
        pixels_per_inch,
        moa = ?record.entry.moa_value,
        "Scale calibrated"
    );
    Ok(Success::new(CalibrateResponse {
        moa_value: record.entry.moa_value,
        pixels_per_inch,
    }))
}

/// Append the submitted manual shots to the stored set and re-measure.
async fn update_shots(
    State(state): State<AppState>,
    UrlPath(id): UrlPath<String>,
    payload: Result<Json<UpdateShotsRequest>, JsonRejection>,
) -> Result<Json<Success<UpdateShotsResponse>>, ApiError> {
    let Json(payload) = payload?;
    let default_pixels_per_inch = state.config.default_pixels_per_inch;
    let updated_at = Local::now().to_rfc3339();

    let mut stats = None;
    let record = state
        .storage
        .update_entry(&id, |record| {
            record.entry.shots.extend(payload.manual_shots.iter().copied());
            record.manual_shots.extend(payload.manual_shots.iter().copied());

            let pixels_per_inch = record.pixels_per_inch().unwrap_or(default_pixels_per_inch);
            let group = MeasurementCalculator::with_scale(Some(pixels_per_inch))
                .group_stats(&record.entry.shots);
            record.entry.shot_count = group.shot_count;
            record.entry.moa_value = group.extreme_spread_moa;
            record.last_updated = Some(updated_at);
            stats = Some(group);
        })
        .map_err(ApiError::Storage)?
        .ok_or(ApiError::NotFound)?;

    tracing::info!(
        id = %id,
        added = payload.manual_shots.len(),
        shots = record.entry.shot_count,
        moa = ?record.entry.moa_value,
        center_to_center_moa = ?stats.as_ref().and_then(|s| s.center_to_center_moa),
        group_size_inches = ?stats.as_ref().and_then(|s| s.group_size_inches),
        "Shots updated"
    );
    Ok(Success::new(UpdateShotsResponse {
        result: analysis_result(&record, default_pixels_per_inch),
        manual_shots: payload.manual_shots,
    }))
}

async fn health() -> Json<Health> {
    Json(Health {
        status: "healthy",
        service: "photomoa backend",
    })
}

/// JSON API routes. Image files are served separately from the upload dir.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/api/upload", post(upload))
        .route("/api/history", get(history))
        .route("/api/delete/{id}", delete(delete_entry))
        .route("/api/calibrate/{id}", post(calibrate))
        .route("/api/update-shots/{id}", post(update_shots))
        .route("/api/health", get(health))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}
