//! Intake: `POST /videos`.
//!
//! Streams a multipart body the way the gateway's upload handler does
//! (`actix_multipart::Multipart`, chunked `field.next().await`), but keeps
//! the bytes instead of draining them: they're handed to `BlobWriter`
//! before the Video record is created.
use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::events::{Event, UploadSummary};
use crate::middleware::AuthContext;
use crate::models::{Video, VideoStatus, VideoSummary};
use crate::pipeline::ScheduleResult;
use crate::state::AppState;

struct ParsedUpload {
    title: Option<String>,
    description: String,
    filename: Option<String>,
    bytes: BytesMut,
}

pub async fn create_video(
    auth: AuthContext,
    state: web::Data<AppState>,
    mut payload: Multipart,
) -> Result<HttpResponse> {
    let mut parsed = ParsedUpload {
        title: None,
        description: String::new(),
        filename: None,
        bytes: BytesMut::new(),
    };

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| AppError::BadRequest(e.to_string()))?;
        let field_name = field
            .content_disposition()
            .and_then(|cd| cd.get_name())
            .map(str::to_string)
            .unwrap_or_default();

        if field_name == "file" {
            parsed.filename = field
                .content_disposition()
                .and_then(|cd| cd.get_filename())
                .map(str::to_string);
            while let Some(chunk) = field.next().await {
                let chunk = chunk.map_err(|e| AppError::BadRequest(e.to_string()))?;
                if parsed.bytes.len() as u64 + chunk.len() as u64 > state.config.blob.max_bytes {
                    return Err(AppError::BadRequest(format!(
                        "upload exceeds maximum size of {} bytes",
                        state.config.blob.max_bytes
                    )));
                }
                parsed.bytes.extend_from_slice(&chunk);
            }
        } else {
            let mut value = BytesMut::new();
            while let Some(chunk) = field.next().await {
                let chunk = chunk.map_err(|e| AppError::BadRequest(e.to_string()))?;
                value.extend_from_slice(&chunk);
            }
            let value = String::from_utf8_lossy(&value).into_owned();
            match field_name.as_str() {
                "title" => parsed.title = Some(value),
                "description" => parsed.description = value,
                _ => {}
            }
        }
    }

    let title = parsed
        .title
        .ok_or_else(|| AppError::BadRequest("missing title field".to_string()))?;
    let filename = parsed
        .filename
        .ok_or_else(|| AppError::BadRequest("missing file part".to_string()))?;
    let size = parsed.bytes.len() as u64;

    if size == 0 {
        return Err(AppError::BadRequest("uploaded file is empty".to_string()));
    }
    if size > state.config.blob.max_bytes {
        return Err(AppError::BadRequest(format!(
            "upload exceeds maximum size of {} bytes",
            state.config.blob.max_bytes
        )));
    }
    if !(Video::TITLE_MIN..=Video::TITLE_MAX).contains(&title.chars().count()) {
        return Err(AppError::BadRequest(format!(
            "title must be between {} and {} characters",
            Video::TITLE_MIN,
            Video::TITLE_MAX
        )));
    }
    if parsed.description.chars().count() > Video::DESCRIPTION_MAX {
        return Err(AppError::BadRequest(format!(
            "description must be at most {} characters",
            Video::DESCRIPTION_MAX
        )));
    }
    if !(Video::FILENAME_MIN..=Video::FILENAME_MAX).contains(&filename.chars().count()) {
        return Err(AppError::BadRequest("filename length out of bounds".to_string()));
    }

    let id = Uuid::new_v4();
    let blob_ref = format!("blob://{}", id);
    state.blob_writer.put(&blob_ref, Bytes::from(parsed.bytes)).await?;

    let now = state.clock.now();
    let video = Video {
        id,
        tenant_id: auth.tenant_id,
        owner_id: auth.caller_id,
        title: title.clone(),
        description: parsed.description,
        filename,
        blob_ref,
        size,
        status: VideoStatus::Uploaded,
        progress: 0,
        sensitivity: None,
        probe_result: None,
        errors: Vec::new(),
        created_at: now,
        processing_started_at: None,
        processing_completed_at: None,
    };
    state.store.insert(video.clone()).await?;

    // (a) record before (b) publish, per the intake ordering contract: a
    // subscriber must see the upload before the first progress update.
    state.bus.publish(Event::VideoUploaded {
        video_id: id,
        tenant_id: auth.tenant_id,
        summary: UploadSummary {
            title,
            status: VideoStatus::Uploaded,
            created_at: now,
            owner_ref: auth.caller_id,
            size,
        },
    });

    let _: ScheduleResult = state.pipeline.schedule(id).await?;

    Ok(HttpResponse::Created().json(serde_json::json!({
        "video": VideoSummary::from(&video),
    })))
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/videos").route("", web::post().to(create_video)));
}
