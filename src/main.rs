/// Video ingestion and delivery service - HTTP server.
///
/// Wires the Pipeline Engine, Event Bus, Push Hub, and Range Streamer onto
/// an actix-web app and serves the service's HTTP and WebSocket endpoints.
use std::io;
use std::sync::Arc;
use std::time::Duration;

use actix_web::{middleware as actix_middleware, web, App, HttpResponse, HttpServer};
use vault_stream::blob::{BlobReader, BlobWriter, InMemoryBlobStore};
use vault_stream::clock::SystemClock;
use vault_stream::config::Config;
use vault_stream::events::EventBus;
use vault_stream::handlers::{push, uploads, videos};
use vault_stream::metrics;
use vault_stream::middleware::{AuthMiddleware, MetricsMiddleware};
use vault_stream::pipeline::PipelineEngine;
use vault_stream::probe::ProcessProbe;
use vault_stream::push::AllowAllAuthorizer;
use vault_stream::state::AppState;
use vault_stream::store::InMemoryMetadataStore;

#[actix_web::main]
async fn main() -> io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env().expect("failed to load configuration");
    let bind_address = format!("{}:{}", config.app.host, config.app.port);

    let blob = Arc::new(InMemoryBlobStore::new());
    let blob_reader: Arc<dyn BlobReader> = blob.clone();
    let blob_writer: Arc<dyn BlobWriter> = blob.clone();
    let store = Arc::new(InMemoryMetadataStore::new());
    let clock = Arc::new(SystemClock);
    let bus = EventBus::new(config.bus.subscriber_buffer);

    let pipeline = PipelineEngine::new(
        store.clone(),
        Arc::new(ProcessProbe),
        bus.clone(),
        clock.clone(),
        config.pipeline.clone(),
        config.analyzer.flag_threshold,
    );

    let state = AppState {
        store,
        blob_reader,
        blob_writer,
        bus,
        pipeline: pipeline.clone(),
        clock,
        authorizer: Arc::new(AllowAllAuthorizer),
        config: config.clone(),
    };

    tracing::info!(%bind_address, "video ingestion service starting");

    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(actix_middleware::Logger::default())
            .wrap(MetricsMiddleware)
            .route(
                "/api/v1/health",
                web::get().to(|| async { HttpResponse::Ok().json(serde_json::json!({"status": "ok"})) }),
            )
            .route(
                "/api/v1/health/ready",
                web::get().to(|| async { HttpResponse::Ok().finish() }),
            )
            .route(
                "/api/v1/health/live",
                web::get().to(|| async { HttpResponse::Ok().finish() }),
            )
            .route("/metrics", web::get().to(metrics::serve_metrics))
            .service(
                web::scope("")
                    .wrap(AuthMiddleware)
                    .configure(videos::register_routes)
                    .configure(uploads::register_routes)
                    .configure(push::register_routes),
            )
    })
    .bind(&bind_address)?
    .run();

    let server_handle = server.handle();
    tokio::select! {
        result = server => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received, draining in-flight pipeline jobs");
            pipeline.shutdown(Duration::from_secs(30)).await;
            server_handle.stop(true).await;
            Ok(())
        }
    }
}
