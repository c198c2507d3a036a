//! Data models.
//!
//! Defines the `Video` entity and its lifecycle, the sensitivity analysis
//! output shape, and the HTTP-facing DTOs projected from them.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Lifecycle status of a video. `Safe`, `Flagged`, and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoStatus {
    Uploaded,
    Processing,
    Safe,
    Flagged,
    Failed,
}

impl VideoStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, VideoStatus::Safe | VideoStatus::Flagged | VideoStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStatus::Uploaded => "uploaded",
            VideoStatus::Processing => "processing",
            VideoStatus::Safe => "safe",
            VideoStatus::Flagged => "flagged",
            VideoStatus::Failed => "failed",
        }
    }
}

/// A single recorded failure encountered along the way. Order is preserved.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEntry {
    pub step: String,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Result of the media-probe validation step (real or fallback).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    pub codec: Option<String>,
    pub container: Option<String>,
    pub duration_sec: Option<f64>,
    pub width_px: Option<u32>,
    pub height_px: Option<u32>,
    pub validated_with_fallback: bool,
}

/// One weighted content category contributing to a sensitivity verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryScore {
    pub key: String,
    pub display_name: String,
    pub score: u32,
    /// Per-field match labels, e.g. `"adult in title"`, in match order.
    pub keywords: Vec<String>,
}

/// A category that crossed zero score, surfaced as a flat list alongside
/// `category_breakdown` for callers that want issues without the map.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedIssue {
    pub category: String,
    pub score: u32,
    pub keywords: Vec<String>,
}

/// Output of the sensitivity analyzer, attached to a video once terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sensitivity {
    pub score: u32,
    pub verdict: SensitivityVerdict,
    pub category_breakdown: HashMap<String, CategoryScore>,
    pub detected_issues: Vec<DetectedIssue>,
    pub rules: Vec<String>,
    pub summary: String,
    pub analyzed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensitivityVerdict {
    Safe,
    Flagged,
}

/// The core entity: a video moving through the ingestion/processing pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub description: String,
    pub filename: String,
    pub blob_ref: String,
    pub size: u64,
    pub status: VideoStatus,
    pub progress: u8,
    pub sensitivity: Option<Sensitivity>,
    pub probe_result: Option<ProbeResult>,
    pub errors: Vec<ErrorEntry>,
    pub created_at: DateTime<Utc>,
    pub processing_started_at: Option<DateTime<Utc>>,
    pub processing_completed_at: Option<DateTime<Utc>>,
}

impl Video {
    pub const TITLE_MIN: usize = 3;
    pub const TITLE_MAX: usize = 100;
    pub const DESCRIPTION_MAX: usize = 1000;
    pub const FILENAME_MIN: usize = 1;
    pub const FILENAME_MAX: usize = 512;
}

/// Non-file fields of a `POST /videos` multipart request. `filename`,
/// `blobRef` and `size` come from the uploaded file part itself, not from
/// this struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVideoRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// Condensed view returned from list/get endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSummary {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub status: VideoStatus,
    pub progress: u8,
    pub created_at: DateTime<Utc>,
}

impl From<&Video> for VideoSummary {
    fn from(v: &Video) -> Self {
        Self {
            id: v.id,
            tenant_id: v.tenant_id,
            owner_id: v.owner_id,
            title: v.title.clone(),
            status: v.status,
            progress: v.progress,
            created_at: v.created_at,
        }
    }
}

/// Full detail view, including terminal sensitivity/probe results once present.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDetail {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub description: String,
    pub filename: String,
    pub size: u64,
    pub status: VideoStatus,
    pub progress: u8,
    pub sensitivity: Option<Sensitivity>,
    pub probe_result: Option<ProbeResult>,
    pub errors: Vec<ErrorEntry>,
    pub created_at: DateTime<Utc>,
    pub processing_started_at: Option<DateTime<Utc>>,
    pub processing_completed_at: Option<DateTime<Utc>>,
}

impl From<&Video> for VideoDetail {
    fn from(v: &Video) -> Self {
        Self {
            id: v.id,
            tenant_id: v.tenant_id,
            owner_id: v.owner_id,
            title: v.title.clone(),
            description: v.description.clone(),
            filename: v.filename.clone(),
            size: v.size,
            status: v.status,
            progress: v.progress,
            sensitivity: v.sensitivity.clone(),
            probe_result: v.probe_result.clone(),
            errors: v.errors.clone(),
            created_at: v.created_at,
            processing_started_at: v.processing_started_at,
            processing_completed_at: v.processing_completed_at,
        }
    }
}

/// `createdAt`/`completedAt` pair surfaced alongside processing status.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Projection for the polling-friendly processing-status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingStatusResponse {
    pub id: Uuid,
    pub status: VideoStatus,
    pub progress: u8,
    pub sensitivity: Option<Sensitivity>,
    pub errors: Vec<ErrorEntry>,
    pub timeline: Timeline,
}

impl From<&Video> for ProcessingStatusResponse {
    fn from(v: &Video) -> Self {
        Self {
            id: v.id,
            status: v.status,
            progress: v.progress,
            sensitivity: v.sensitivity.clone(),
            errors: v.errors.clone(),
            timeline: Timeline {
                created_at: v.created_at,
                completed_at: v.processing_completed_at,
            },
        }
    }
}
