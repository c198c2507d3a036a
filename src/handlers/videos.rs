//! Read-side video endpoints: detail, processing status, byte-range
//! streaming, and deletion.
use actix_web::{web, HttpRequest, HttpResponse};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::middleware::AuthContext;
use crate::models::{ProcessingStatusResponse, Video, VideoDetail};
use crate::range::{self, ByteRange, StreamerSettings};
use crate::state::AppState;

async fn fetch_authorized(state: &AppState, auth: &AuthContext, id: Uuid) -> Result<Video> {
    let video = state
        .store
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("video {} not found", id)))?;
    if video.tenant_id != auth.tenant_id {
        return Err(AppError::Forbidden("video belongs to a different tenant".to_string()));
    }
    Ok(video)
}

pub async fn get_video(
    auth: AuthContext,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let video = fetch_authorized(&state, &auth, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(VideoDetail::from(&video)))
}

pub async fn processing_status(
    auth: AuthContext,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let video = fetch_authorized(&state, &auth, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ProcessingStatusResponse::from(&video)))
}

pub async fn delete_video(
    auth: AuthContext,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let video = fetch_authorized(&state, &auth, path.into_inner()).await?;
    if !video.status.is_terminal() {
        return Err(AppError::Conflict(
            "video cannot be deleted while processing".to_string(),
        ));
    }
    state.store.delete(video.id).await?;
    Ok(HttpResponse::NoContent().finish())
}

async fn stream_response(
    auth: AuthContext,
    id: Uuid,
    state: &AppState,
    range_header: Option<&str>,
    include_body: bool,
) -> Result<HttpResponse> {
    let video = fetch_authorized(state, &auth, id).await?;
    let size = state.blob_reader.size(&video.blob_ref).await?;
    let parsed_range = range::parse_range(range_header, size);
    let settings = StreamerSettings {
        content_type: state.config.streamer.content_type.clone(),
        cache_control: state.config.streamer.cache_control.clone(),
    };

    let body = if !include_body {
        None
    } else {
        match parsed_range {
            Some(Err(())) => None,
            Some(Ok(ByteRange { start, end })) => {
                Some(state.blob_reader.read(&video.blob_ref, start, end - start + 1).await?)
            }
            None => Some(state.blob_reader.read(&video.blob_ref, 0, size).await?),
        }
    };

    Ok(range::build_response(parsed_range, size, body, &settings))
}

pub async fn stream_video(
    req: HttpRequest,
    auth: AuthContext,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let header = req.headers().get("Range").and_then(|h| h.to_str().ok());
    stream_response(auth, path.into_inner(), &state, header, true).await
}

pub async fn stream_video_head(
    req: HttpRequest,
    auth: AuthContext,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let header = req.headers().get("Range").and_then(|h| h.to_str().ok());
    stream_response(auth, path.into_inner(), &state, header, false).await
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/videos")
            .route("/{id}", web::get().to(get_video))
            .route("/{id}", web::delete().to(delete_video))
            .route("/{id}/processing-status", web::get().to(processing_status))
            .route("/{id}/stream", web::get().to(stream_video))
            .route("/{id}/stream", web::head().to(stream_video_head)),
    );
}
