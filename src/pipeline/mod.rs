//! Pipeline engine: drives a video from `uploaded` through `processing` to
//! a terminal state (`safe` / `flagged` / `failed`).
//!
//! A sequential, data-driven step list (not an inlined chain of futures) —
//! probe validation, then six synthetic checkpoints with the sensitivity
//! analyzer run between the fifth and sixth. A fixed-size worker pool
//! bounds concurrency; an active-job set makes `schedule` idempotent.
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::Semaphore;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::analyzer::{self, AnalyzerInput};
use crate::clock::Clock;
use crate::config::PipelineConfig;
use crate::error::{AppError, PipelineError, Result};
use crate::events::{Event, EventBus};
use crate::models::{ErrorEntry, SensitivityVerdict, Video, VideoStatus};
use crate::probe::{fallback_validate, validate_probe_result, Probe};
use crate::store::MetadataStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleResult {
    Accepted,
    AlreadyRunning,
    Terminal,
    ShuttingDown,
}

struct CheckpointStep {
    progress: u8,
    label: &'static str,
}

const CHECKPOINTS: [CheckpointStep; 6] = [
    CheckpointStep { progress: 20, label: "probe_validated" },
    CheckpointStep { progress: 35, label: "decoding" },
    CheckpointStep { progress: 50, label: "transcoding" },
    CheckpointStep { progress: 65, label: "pre_analysis" },
    CheckpointStep { progress: 80, label: "analysis_complete" },
    CheckpointStep { progress: 95, label: "finalizing" },
];

/// Index after which the sensitivity analyzer runs (between checkpoints
/// at index 3 [progress 65] and index 4 [progress 80]).
const ANALYZE_AFTER_INDEX: usize = 3;

pub struct PipelineEngine {
    store: Arc<dyn MetadataStore>,
    probe: Arc<dyn Probe>,
    bus: EventBus,
    clock: Arc<dyn Clock>,
    config: PipelineConfig,
    analyzer_flag_threshold: u32,
    active_jobs: Mutex<HashSet<Uuid>>,
    semaphore: Arc<Semaphore>,
    jobs_completed: AtomicU64,
    jobs_failed: AtomicU64,
    /// Set false by `shutdown` immediately: no new jobs are scheduled from
    /// that point on, even before the deadline elapses.
    accepting: AtomicBool,
    /// Set true only once a `shutdown` deadline elapses; in-flight jobs
    /// observe this at step boundaries and abort to `failed(step=shutdown)`.
    cancel_requested: AtomicBool,
}

impl PipelineEngine {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        probe: Arc<dyn Probe>,
        bus: EventBus,
        clock: Arc<dyn Clock>,
        config: PipelineConfig,
        analyzer_flag_threshold: u32,
    ) -> Arc<Self> {
        let workers = config.workers.max(1);
        Arc::new(Self {
            store,
            probe,
            bus,
            clock,
            config,
            analyzer_flag_threshold,
            active_jobs: Mutex::new(HashSet::new()),
            semaphore: Arc::new(Semaphore::new(workers)),
            jobs_completed: AtomicU64::new(0),
            jobs_failed: AtomicU64::new(0),
            accepting: AtomicBool::new(true),
            cancel_requested: AtomicBool::new(false),
        })
    }

    /// Stop accepting new schedules immediately. In-flight jobs are given
    /// `deadline` to reach a terminal state; once it elapses, any job still
    /// running aborts to `failed(step=shutdown)` at its next checkpoint.
    pub async fn shutdown(self: &Arc<Self>, deadline: Duration) {
        self.accepting.store(false, Ordering::SeqCst);
        tokio::time::sleep(deadline).await;
        self.cancel_requested.store(true, Ordering::SeqCst);
    }

    pub fn jobs_completed(&self) -> u64 {
        self.jobs_completed.load(Ordering::Relaxed)
    }

    pub fn jobs_failed(&self) -> u64 {
        self.jobs_failed.load(Ordering::Relaxed)
    }

    /// Idempotent: scheduling an already-running job returns `AlreadyRunning`
    /// rather than an error; scheduling a terminal video returns `Terminal`.
    pub async fn schedule(self: &Arc<Self>, id: Uuid) -> Result<ScheduleResult> {
        if !self.accepting.load(Ordering::SeqCst) {
            return Ok(ScheduleResult::ShuttingDown);
        }

        let video = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("video {} not found", id)))?;

        if video.status.is_terminal() {
            return Ok(ScheduleResult::Terminal);
        }

        {
            let mut active = self.active_jobs.lock().expect("active-job set poisoned");
            if active.contains(&id) {
                return Ok(ScheduleResult::AlreadyRunning);
            }
            active.insert(id);
        }

        let engine = self.clone();
        tokio::spawn(async move {
            engine.run_job(id).await;
        });

        Ok(ScheduleResult::Accepted)
    }

    pub async fn status(&self, id: Uuid) -> Result<Option<Video>> {
        self.store.get(id).await
    }

    async fn run_job(self: Arc<Self>, id: Uuid) {
        let permit = match self.semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return,
        };
        crate::metrics::worker_started();

        let span = info_span!("pipeline_job", video_id = %id);
        let outcome = std::panic::AssertUnwindSafe(self.run_job_inner(id))
            .catch_unwind()
            .instrument(span)
            .await;

        if outcome.is_err() {
            error!(video_id = %id, "pipeline job panicked, marking failed");
            self.fail_job(id, "worker", "worker panicked").await;
        }

        crate::metrics::worker_finished();
        self.active_jobs
            .lock()
            .expect("active-job set poisoned")
            .remove(&id);
        drop(permit);
    }

    async fn run_job_inner(&self, id: Uuid) {
        let now = self.clock.now();
        let Ok(video) = self
            .store
            .update(
                id,
                Box::new(move |v| {
                    v.status = VideoStatus::Processing;
                    v.progress = 10;
                    v.processing_started_at = Some(now);
                }),
            )
            .await
        else {
            return;
        };

        self.bus.publish(Event::VideoProcessingStart {
            video_id: id,
            tenant_id: video.tenant_id,
            progress: 10,
            step: crate::events::PROCESSING_START_STEP.to_string(),
        });

        let probe_result = tokio::time::timeout(
            Duration::from_millis(self.config.probe_timeout_ms),
            self.probe
                .inspect(&video.blob_ref, &video.filename, Duration::from_millis(self.config.probe_timeout_ms)),
        )
        .await;

        let probe_outcome = match probe_result {
            Ok(Ok(result)) => validate_probe_result(&result, video.size).map(|_| result),
            Ok(Err(_)) | Err(_) => {
                warn!(video_id = %id, "probe timed out or failed, falling back to local validation");
                fallback_validate(&video.filename, video.size)
            }
        };

        let probe_result = match probe_outcome {
            Ok(result) => result,
            Err(err) => {
                self.fail_job(id, "validate", &err.to_string()).await;
                return;
            }
        };

        if self.cancel_requested.load(Ordering::SeqCst) {
            self.fail_job(id, "shutdown", "shutdown deadline elapsed").await;
            return;
        }

        if self
            .store
            .update(
                id,
                Box::new({
                    let probe_result = probe_result.clone();
                    move |v| v.probe_result = Some(probe_result)
                }),
            )
            .await
            .is_err()
        {
            return;
        }

        let mut sensitivity = None;

        for (index, checkpoint) in CHECKPOINTS.iter().enumerate() {
            if self.cancel_requested.load(Ordering::SeqCst) {
                self.fail_job(id, "shutdown", "shutdown deadline elapsed").await;
                return;
            }

            let delay_ms = self.config.step_delays_ms[index];
            if delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }

            let progress = checkpoint.progress;
            if self
                .store
                .update(id, Box::new(move |v| v.progress = progress))
                .await
                .is_err()
            {
                return;
            }
            self.bus.publish(Event::VideoProgressUpdate {
                video_id: id,
                tenant_id: video.tenant_id,
                progress,
                step: checkpoint.label.to_string(),
            });

            if index == ANALYZE_AFTER_INDEX {
                let result = analyzer::analyze(
                    &AnalyzerInput {
                        title: &video.title,
                        description: &video.description,
                        filename: &video.filename,
                    },
                    self.analyzer_flag_threshold,
                    self.clock.now(),
                );

                if self
                    .store
                    .update(id, Box::new({
                        let result = result.clone();
                        move |v| v.sensitivity = Some(result)
                    }))
                    .await
                    .is_err()
                {
                    return;
                }
                sensitivity = Some(result);
            }
        }

        let verdict_status = match sensitivity.as_ref().map(|s| s.verdict) {
            Some(SensitivityVerdict::Safe) => VideoStatus::Safe,
            Some(SensitivityVerdict::Flagged) => VideoStatus::Flagged,
            None => VideoStatus::Safe,
        };
        let completed_at = self.clock.now();
        let final_video = match self
            .store
            .update(
                id,
                Box::new(move |v| {
                    v.status = verdict_status;
                    v.progress = 100;
                    v.processing_completed_at = Some(completed_at);
                }),
            )
            .await
        {
            Ok(v) => v,
            Err(_) => return,
        };

        self.jobs_completed.fetch_add(1, Ordering::Relaxed);
        crate::metrics::job_completed();
        if let Some(sensitivity) = final_video.sensitivity.clone() {
            self.bus.publish(Event::VideoProcessingComplete {
                video_id: id,
                tenant_id: final_video.tenant_id,
                progress: 100,
                status: final_video.status.as_str().to_string(),
                analysis: sensitivity,
            });
        }
        info!(video_id = %id, status = final_video.status.as_str(), "pipeline job completed");
    }

    async fn fail_job(&self, id: Uuid, step: &str, message: &str) {
        self.jobs_failed.fetch_add(1, Ordering::Relaxed);
        crate::metrics::job_failed();
        let now = self.clock.now();
        let message = message.to_string();
        let step = step.to_string();
        let Ok(video) = self
            .store
            .update(
                id,
                Box::new({
                    let message = message.clone();
                    let step = step.clone();
                    move |v| {
                        v.status = VideoStatus::Failed;
                        v.errors.push(ErrorEntry {
                            step,
                            message,
                            at: now,
                        });
                        v.processing_completed_at = Some(now);
                    }
                }),
            )
            .await
        else {
            return;
        };
        self.bus.publish(Event::VideoProcessingFailed {
            video_id: id,
            tenant_id: video.tenant_id,
            error: message,
        });
    }
}

/// The `PipelineError` taxonomy never escapes to HTTP; this conversion only
/// exists so `?` composes inside helper functions that also return `AppError`.
impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        AppError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::models::ProbeResult;
    use crate::probe::FakeProbe;
    use crate::store::InMemoryMetadataStore;
    use chrono::Utc;

    fn zero_delay_config() -> PipelineConfig {
        PipelineConfig {
            workers: 4,
            probe_timeout_ms: 100,
            step_delays_ms: [0, 0, 0, 0, 0, 0],
        }
    }

    fn make_video(title: &str, description: &str) -> Video {
        Video {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            title: title.to_string(),
            description: description.to_string(),
            filename: "clip.mp4".to_string(),
            blob_ref: "blob://clip".to_string(),
            size: 4096,
            status: VideoStatus::Uploaded,
            progress: 0,
            sensitivity: None,
            probe_result: None,
            errors: Vec::new(),
            created_at: Utc::now(),
            processing_started_at: None,
            processing_completed_at: None,
        }
    }

    fn fake_probe() -> Arc<dyn Probe> {
        Arc::new(FakeProbe {
            result: ProbeResult {
                codec: Some("h264".to_string()),
                container: Some("mp4".to_string()),
                duration_sec: Some(12.0),
                width_px: Some(1920),
                height_px: Some(1080),
                validated_with_fallback: false,
            },
        })
    }

    #[tokio::test]
    async fn happy_path_reaches_safe_with_full_progress_sequence() {
        let store: Arc<dyn MetadataStore> = Arc::new(InMemoryMetadataStore::new());
        let bus = EventBus::new(64);
        let video = make_video("Family Picnic", "A lovely day");
        let id = video.id;
        let tenant_id = video.tenant_id;
        store.insert(video).await.unwrap();

        let sub = bus.subscribe(tenant_id);
        let engine = PipelineEngine::new(
            store.clone(),
            fake_probe(),
            bus,
            Arc::new(SystemClock),
            zero_delay_config(),
            30,
        );

        let result = engine.schedule(id).await.unwrap();
        assert_eq!(result, ScheduleResult::Accepted);

        let mut progress_seen = Vec::new();
        loop {
            match sub.recv().await.unwrap() {
                Event::VideoProcessingStart { progress, .. } => progress_seen.push(progress),
                Event::VideoProgressUpdate { progress, .. } => progress_seen.push(progress),
                Event::VideoProcessingComplete { progress, status, .. } => {
                    progress_seen.push(progress);
                    assert_eq!(status, "safe");
                    break;
                }
                Event::VideoProcessingFailed { .. } => panic!("unexpected failure"),
                _ => {}
            }
        }

        assert_eq!(progress_seen, vec![10, 20, 35, 50, 65, 80, 95, 100]);

        let stored = store.get(id).await.unwrap().unwrap();
        assert_eq!(stored.status, VideoStatus::Safe);
        assert_eq!(stored.progress, 100);
        assert!(stored.sensitivity.is_some());
    }

    #[tokio::test]
    async fn rescheduling_a_running_job_is_idempotent() {
        let store: Arc<dyn MetadataStore> = Arc::new(InMemoryMetadataStore::new());
        let bus = EventBus::new(64);
        let mut config = zero_delay_config();
        config.step_delays_ms = [50, 50, 50, 50, 50, 50];
        let video = make_video("clip", "desc");
        let id = video.id;
        store.insert(video).await.unwrap();

        let engine = PipelineEngine::new(
            store.clone(),
            fake_probe(),
            bus,
            Arc::new(SystemClock),
            config,
            30,
        );

        let first = engine.schedule(id).await.unwrap();
        let second = engine.schedule(id).await.unwrap();
        assert_eq!(first, ScheduleResult::Accepted);
        assert_eq!(second, ScheduleResult::AlreadyRunning);
    }

    #[tokio::test]
    async fn rescheduling_a_terminal_video_reports_terminal() {
        let store: Arc<dyn MetadataStore> = Arc::new(InMemoryMetadataStore::new());
        let bus = EventBus::new(64);
        let mut video = make_video("clip", "desc");
        video.status = VideoStatus::Safe;
        let id = video.id;
        store.insert(video).await.unwrap();

        let engine = PipelineEngine::new(
            store,
            fake_probe(),
            bus,
            Arc::new(SystemClock),
            zero_delay_config(),
            30,
        );

        let result = engine.schedule(id).await.unwrap();
        assert_eq!(result, ScheduleResult::Terminal);
    }

    #[tokio::test]
    async fn unsupported_extension_fails_fast_via_fallback() {
        struct AlwaysFailsProbe;
        #[async_trait::async_trait]
        impl Probe for AlwaysFailsProbe {
            async fn inspect(
                &self,
                _blob_ref: &str,
                _filename: &str,
                _timeout: Duration,
            ) -> std::result::Result<ProbeResult, PipelineError> {
                Err(PipelineError::ProbeFailed("boom".to_string()))
            }
        }

        let store: Arc<dyn MetadataStore> = Arc::new(InMemoryMetadataStore::new());
        let bus = EventBus::new(64);
        let mut video = make_video("clip", "desc");
        video.filename = "clip.exe".to_string();
        let id = video.id;
        let tenant_id = video.tenant_id;
        store.insert(video).await.unwrap();

        let sub = bus.subscribe(tenant_id);
        let engine = PipelineEngine::new(
            store.clone(),
            Arc::new(AlwaysFailsProbe),
            bus,
            Arc::new(SystemClock),
            zero_delay_config(),
            30,
        );

        engine.schedule(id).await.unwrap();

        match sub.recv().await.unwrap() {
            Event::VideoProcessingFailed { .. } => {}
            other => panic!("expected failure event, got {:?}", other),
        }

        let stored = store.get(id).await.unwrap().unwrap();
        assert_eq!(stored.status, VideoStatus::Failed);
        assert!(!stored.errors.is_empty());
    }

    #[tokio::test]
    async fn shutdown_stops_accepting_new_schedules_immediately() {
        let store: Arc<dyn MetadataStore> = Arc::new(InMemoryMetadataStore::new());
        let bus = EventBus::new(64);
        let video = make_video("clip", "desc");
        let id = video.id;
        store.insert(video).await.unwrap();

        let engine = PipelineEngine::new(
            store,
            fake_probe(),
            bus,
            Arc::new(SystemClock),
            zero_delay_config(),
            30,
        );

        let shutdown_engine = engine.clone();
        tokio::spawn(async move {
            shutdown_engine.shutdown(Duration::from_millis(10)).await;
        });
        tokio::time::sleep(Duration::from_millis(1)).await;

        let result = engine.schedule(id).await.unwrap();
        assert_eq!(result, ScheduleResult::ShuttingDown);
    }

    #[tokio::test]
    async fn in_flight_job_fails_once_shutdown_deadline_elapses() {
        let store: Arc<dyn MetadataStore> = Arc::new(InMemoryMetadataStore::new());
        let bus = EventBus::new(64);
        let mut config = zero_delay_config();
        config.step_delays_ms = [200, 200, 200, 200, 200, 200];
        let video = make_video("clip", "desc");
        let id = video.id;
        let tenant_id = video.tenant_id;
        store.insert(video).await.unwrap();

        let sub = bus.subscribe(tenant_id);
        let engine = PipelineEngine::new(
            store.clone(),
            fake_probe(),
            bus,
            Arc::new(SystemClock),
            config,
            30,
        );

        engine.schedule(id).await.unwrap();
        let shutdown_engine = engine.clone();
        tokio::spawn(async move {
            shutdown_engine.shutdown(Duration::from_millis(20)).await;
        });

        loop {
            match sub.recv().await.unwrap() {
                Event::VideoProcessingFailed { .. } => break,
                Event::VideoProcessingComplete { .. } => panic!("job should not have completed"),
                _ => {}
            }
        }

        let stored = store.get(id).await.unwrap().unwrap();
        assert_eq!(stored.status, VideoStatus::Failed);
        assert_eq!(stored.errors.last().unwrap().step, "shutdown");
    }
}
