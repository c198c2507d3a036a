//! Configuration management.
//!
//! Loads configuration from environment variables with sensible defaults,
//! following the same `from_env` pattern used across the codebase.
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub pipeline: PipelineConfig,
    pub analyzer: AnalyzerConfig,
    pub streamer: StreamerConfig,
    pub bus: BusConfig,
    pub blob: BlobConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub env: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PipelineConfig {
    /// Fixed worker pool size.
    pub workers: usize,
    /// Timeout applied to the external media probe.
    pub probe_timeout_ms: u64,
    /// Artificial pacing delay before each synthetic checkpoint, in order.
    pub step_delays_ms: [u64; 6],
}

#[derive(Clone, Debug, Deserialize)]
pub struct AnalyzerConfig {
    /// Strictly-greater-than threshold at which a video is flagged.
    pub flag_threshold: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct StreamerConfig {
    pub content_type: String,
    pub cache_control: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct BusConfig {
    /// Bounded per-subscriber buffer; oldest events are dropped when full.
    pub subscriber_buffer: usize,
}

#[derive(Clone, Debug, Deserialize)]
pub struct BlobConfig {
    pub max_bytes: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Config {
            app: AppConfig {
                host: std::env::var("HTTP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: std::env::var("HTTP_PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .unwrap_or(8080),
                env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
            },
            pipeline: PipelineConfig {
                workers: std::env::var("PIPELINE_WORKERS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(4),
                probe_timeout_ms: std::env::var("PIPELINE_PROBE_TIMEOUT_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(5000),
                step_delays_ms: parse_step_delays(),
            },
            analyzer: AnalyzerConfig {
                flag_threshold: std::env::var("ANALYZER_FLAG_THRESHOLD")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(30),
            },
            streamer: StreamerConfig {
                content_type: std::env::var("STREAMER_CONTENT_TYPE")
                    .unwrap_or_else(|_| "video/mp4".to_string()),
                cache_control: std::env::var("STREAMER_CACHE_CONTROL")
                    .unwrap_or_else(|_| "public, max-age=86400".to_string()),
            },
            bus: BusConfig {
                subscriber_buffer: std::env::var("BUS_SUBSCRIBER_BUFFER")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(64),
            },
            blob: BlobConfig {
                max_bytes: std::env::var("BLOB_MAX_BYTES")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(2 * 1024 * 1024 * 1024),
            },
        })
    }
}

fn parse_step_delays() -> [u64; 6] {
    let default = [1000u64, 1500, 1200, 2000, 1500, 1000];
    let Ok(raw) = std::env::var("PIPELINE_STEP_DELAYS_MS") else {
        return default;
    };
    let parsed: Vec<u64> = raw
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();
    match parsed.try_into() {
        Ok(arr) => arr,
        Err(_) => default,
    }
}
