use clap::Parser;
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use video_ingest_backend::config::IngestConfig;
use video_ingest_backend::infrastructure::{database, storage};
use video_ingest_backend::services::activity::ActivityLog;
use video_ingest_backend::services::media::{
    FfmpegThumbnailExtractor, FfmpegTranscoder, FfprobeMediaProbe, MediaProbe, MediaTranscoder,
    SimMediaProbe, SimThumbnailExtractor, SimTranscoder, ThumbnailExtractor,
};
use video_ingest_backend::services::scheduler::JobScheduler;
use video_ingest_backend::services::upload_service::UploadService;
use video_ingest_backend::services::worker::JobWorkerPool;
use video_ingest_backend::utils::clock::SystemClock;
use video_ingest_backend::{AppState, create_app};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Service type to run (api, worker, all)
    #[arg(short, long, default_value = "all")]
    mode: String,

    /// Port for the API server
    #[arg(short, long, default_value_t = 3000)]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "video_ingest_backend=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🚀 Starting Video Ingest Backend [Mode: {}]...", args.mode);

    let db = database::setup_database().await?;
    let storage_service = storage::setup_storage().await;

    let config = IngestConfig::from_env();
    info!(
        "🎞️  Ingest Config: Max Size={}MB, Chunk={}MB, Ladder={:?}, Transcoder={}",
        config.max_file_size / 1024 / 1024,
        config.chunk_size / 1024 / 1024,
        config.quality_ladder,
        config.transcoder_kind
    );

    let (probe, transcoder, thumbnailer): (
        Arc<dyn MediaProbe>,
        Arc<dyn MediaTranscoder>,
        Arc<dyn ThumbnailExtractor>,
    ) = if config.transcoder_kind == "sim" {
        (
            Arc::new(SimMediaProbe),
            Arc::new(SimTranscoder),
            Arc::new(SimThumbnailExtractor),
        )
    } else {
        (
            Arc::new(FfprobeMediaProbe),
            Arc::new(FfmpegTranscoder),
            Arc::new(FfmpegThumbnailExtractor),
        )
    };

    let clock = Arc::new(SystemClock);
    let activity = ActivityLog::new(db.clone());
    let scheduler = JobScheduler::new(db.clone(), config.clone());

    let upload_service = Arc::new(UploadService::new(
        db.clone(),
        storage_service.clone(),
        probe,
        scheduler,
        activity.clone(),
        clock.clone(),
        config.clone(),
    ));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let mut handles = Vec::new();

    if args.mode == "worker" || args.mode == "all" {
        let pool = JobWorkerPool::new(
            db.clone(),
            storage_service.clone(),
            transcoder,
            thumbnailer,
            activity.clone(),
            upload_service.clone(),
            clock.clone(),
            config.clone(),
            shutdown_rx.clone(),
        );
        handles.push(tokio::spawn(async move {
            pool.run().await;
        }));
        info!("👷 Job worker pool initialized.");
    }

    if args.mode == "api" || args.mode == "all" {
        let state = AppState {
            db: db.clone(),
            storage: storage_service.clone(),
            upload_service: upload_service.clone(),
            config: config.clone(),
        };

        let trace_layer = TraceLayer::new_for_http()
            .make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            })
            .on_response(
                |response: &axum::http::Response<_>,
                 latency: std::time::Duration,
                 _span: &tracing::Span| {
                    info!(
                        "📤 Finished in {:?} with status {}",
                        latency,
                        response.status()
                    );
                },
            );

        let app = create_app(state).layer(trace_layer);
        let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
        let listener = tokio::net::TcpListener::bind(addr).await?;

        info!("✅ API Server listening on: http://0.0.0.0:{}", args.port);
        info!(
            "📖 Swagger UI documentation: http://localhost:{}/swagger-ui",
            args.port
        );

        let server_handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_signal().await;
                })
                .await
            {
                error!("❌ Server runtime error: {}", e);
            }
        });
        handles.push(server_handle);
    }

    shutdown_signal().await;
    let _ = shutdown_tx.send(true);

    info!("🛑 Shutting down ingest services...");
    info!("👋 Backend exited cleanly.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, initiating graceful shutdown...");
        },
    }
}
