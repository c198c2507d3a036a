//! Media probe boundary.
//!
//! `Probe` is the narrow trait the pipeline depends on to validate an
//! uploaded file; the actual external probe binary is an out-of-scope
//! collaborator. A fallback validator (container/size heuristics) is
//! provided here since the pipeline must run it locally on probe
//! timeout/failure.
use std::time::Duration;

use async_trait::async_trait;

use crate::error::PipelineError;
use crate::models::ProbeResult;

pub const SUPPORTED_EXTENSIONS: &[&str] = &["mp4", "webm", "mkv", "avi", "mov", "flv"];
pub const MIN_SIZE_BYTES: u64 = 1024;
pub const MAX_SIZE_BYTES: u64 = 2 * 1024 * 1024 * 1024;

#[async_trait]
pub trait Probe: Send + Sync {
    /// Inspect the object at `blob_ref`. Implementations should respect
    /// `timeout` themselves where practical; the pipeline also enforces it
    /// externally via `tokio::time::timeout`.
    async fn inspect(
        &self,
        blob_ref: &str,
        filename: &str,
        timeout: Duration,
    ) -> Result<ProbeResult, PipelineError>;
}

/// Invokes a real external probe process. Left unimplemented at the trait
/// boundary: wiring an actual subprocess (e.g. ffprobe) is outside this
/// crate's scope, matching the out-of-scope external-probe collaborator.
pub struct ProcessProbe;

#[async_trait]
impl Probe for ProcessProbe {
    async fn inspect(
        &self,
        _blob_ref: &str,
        _filename: &str,
        _timeout: Duration,
    ) -> Result<ProbeResult, PipelineError> {
        Err(PipelineError::ProbeFailed(
            "no external probe binary configured".to_string(),
        ))
    }
}

/// Deterministic in-process probe for tests: always succeeds instantly.
pub struct FakeProbe {
    pub result: ProbeResult,
}

#[async_trait]
impl Probe for FakeProbe {
    async fn inspect(
        &self,
        _blob_ref: &str,
        _filename: &str,
        _timeout: Duration,
    ) -> Result<ProbeResult, PipelineError> {
        Ok(self.result.clone())
    }
}

/// Extension + size-bounds validator used when the probe times out or fails.
pub fn fallback_validate(filename: &str, size: u64) -> Result<ProbeResult, PipelineError> {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    if !SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(PipelineError::ValidationRejected(format!(
            "unsupported extension: {}",
            ext
        )));
    }

    if !(MIN_SIZE_BYTES..=MAX_SIZE_BYTES).contains(&size) {
        return Err(PipelineError::ValidationRejected(format!(
            "size {} out of bounds [{}, {}]",
            size, MIN_SIZE_BYTES, MAX_SIZE_BYTES
        )));
    }

    Ok(ProbeResult {
        codec: None,
        container: Some(ext),
        duration_sec: None,
        width_px: None,
        height_px: None,
        validated_with_fallback: true,
    })
}

/// Validates a *real* probe result (container/size) against the same bounds
/// the fallback validator applies. A successful probe invocation does not
/// exempt the upload from these checks — only a timed-out or crashed probe
/// does, which is why this is distinct from `fallback_validate`.
pub fn validate_probe_result(result: &ProbeResult, size: u64) -> Result<(), PipelineError> {
    if let Some(container) = &result.container {
        let container = container.to_ascii_lowercase();
        if !SUPPORTED_EXTENSIONS.contains(&container.as_str()) {
            return Err(PipelineError::ValidationRejected(format!(
                "unsupported container: {}",
                container
            )));
        }
    }

    if !(MIN_SIZE_BYTES..=MAX_SIZE_BYTES).contains(&size) {
        return Err(PipelineError::ValidationRejected(format!(
            "size {} out of bounds [{}, {}]",
            size, MIN_SIZE_BYTES, MAX_SIZE_BYTES
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_supported_extension_within_bounds() {
        let result = fallback_validate("clip.mp4", 2048).unwrap();
        assert!(result.validated_with_fallback);
        assert_eq!(result.container.as_deref(), Some("mp4"));
    }

    #[test]
    fn rejects_unsupported_extension() {
        let err = fallback_validate("clip.exe", 2048).unwrap_err();
        assert!(matches!(err, PipelineError::ValidationRejected(_)));
    }

    #[test]
    fn rejects_undersized_file() {
        let err = fallback_validate("clip.mp4", 10).unwrap_err();
        assert!(matches!(err, PipelineError::ValidationRejected(_)));
    }

    #[test]
    fn rejects_oversized_file() {
        let err = fallback_validate("clip.mp4", MAX_SIZE_BYTES + 1).unwrap_err();
        assert!(matches!(err, PipelineError::ValidationRejected(_)));
    }

    #[test]
    fn extension_match_is_case_insensitive() {
        let result = fallback_validate("CLIP.MP4", 2048).unwrap();
        assert_eq!(result.container.as_deref(), Some("mp4"));
    }

    #[test]
    fn real_probe_result_with_unsupported_container_is_rejected() {
        let result = ProbeResult {
            codec: Some("flac".to_string()),
            container: Some("mp3".to_string()),
            duration_sec: Some(1.0),
            width_px: None,
            height_px: None,
            validated_with_fallback: false,
        };
        assert!(matches!(
            validate_probe_result(&result, 2048),
            Err(PipelineError::ValidationRejected(_))
        ));
    }

    #[test]
    fn real_probe_result_within_bounds_passes() {
        let result = ProbeResult {
            codec: Some("h264".to_string()),
            container: Some("mp4".to_string()),
            duration_sec: Some(10.0),
            width_px: Some(1280),
            height_px: Some(720),
            validated_with_fallback: false,
        };
        assert!(validate_probe_result(&result, 2048).is_ok());
    }
}
