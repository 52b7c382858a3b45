//! Attendance Recording Service
//!
//! The write path for attendance in a microservices deployment where each
//! service owns its datastore.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────────┐
//!                    │              ATTENDANCE SERVICE                  │
//!                    │                                                  │
//!   POST /api/attendance  ┌────────┐   ┌───────────────────────┐       │
//!   ─────────────────┼───▶│  http  │──▶│  AttendanceRecorder   │       │
//!                    │    │ server │   │  permit → validate →  │       │
//!                    │    └────────┘   │  reserve → persist    │       │
//!                    │                 └─────┬──────────┬──────┘       │
//!                    │                       │          │              │
//!                    │              ┌────────▼───┐  ┌───▼──────────┐   │
//!                    │              │ validation │  │ idempotency  │   │
//!                    │              │ (breakers, │  │  + store     │   │
//!                    │              │ deadlines) │  └───┬──────────┘   │
//!                    │              └────┬───────┘      │              │
//!                    │                   │          ┌───▼──────────┐   │
//!                    │                   │          │ event queue  │───┼──▶ consumers
//!                    │                   │          └──────────────┘   │
//!                    └───────────────────┼──────────────────────────────┘
//!                                        ▼
//!                         student-service / course-service
//!                         GET /api/{students,courses}/{id}
//! ```

use std::path::Path;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use attendance_service::attendance::idempotency::IdempotencyGuard;
use attendance_service::attendance::recorder::AttendanceRecorder;
use attendance_service::attendance::store::{AttendanceStore, MemoryStore};
use attendance_service::config::loader::load_config;
use attendance_service::config::schema::AppConfig;
use attendance_service::events::publisher::{EventWorker, LogSink};
use attendance_service::http::server::{AppState, HttpServer};
use attendance_service::lifecycle::{self, Shutdown};
use attendance_service::observability::metrics;
use attendance_service::resilience::registry::DependencyRegistry;
use attendance_service::resilience::timeouts::TimeoutPolicy;
use attendance_service::validation::validator::ServiceValidator;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "attendance_service=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("attendance-service v{} starting", env!("CARGO_PKG_VERSION"));

    // Load configuration from the optional path argument
    let config = match std::env::args().nth(1) {
        Some(path) => load_config(Path::new(&path))?,
        None => AppConfig::default(),
    };

    tracing::info!(
        bind_address = %config.listener.bind_address,
        student_service = %config.services.student_service_url,
        course_service = %config.services.course_service_url,
        failure_threshold = config.resilience.failure_threshold,
        open_timeout_secs = config.resilience.open_timeout_secs,
        "Configuration loaded"
    );

    // Initialize metrics exporter
    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    // Process-wide dependency health state
    let registry = Arc::new(DependencyRegistry::new(&config.resilience));
    for pool in config.bulkhead_pools() {
        registry.register_pool(&pool);
    }

    // Attendance store, loading the snapshot when persistence is on
    let memory = match &config.storage.persistence_path {
        Some(path) => Arc::new(MemoryStore::load_from_file(Path::new(path))?),
        None => Arc::new(MemoryStore::new(None)),
    };
    let store: Arc<dyn AttendanceStore> = memory.clone();

    let shutdown = Shutdown::new();

    // Outbound event queue and its drain worker
    let (publisher, worker) =
        EventWorker::channel(config.events.queue_capacity, Arc::new(LogSink));
    let worker_handle = tokio::spawn(worker.run(shutdown.subscribe()));

    let timeouts = TimeoutPolicy::from_config(&config);
    let validator = ServiceValidator::new(registry.clone(), &config.services, timeouts);
    let validation_pool = registry
        .pool("validation")
        .ok_or("validation bulkhead pool missing")?;
    let recorder = Arc::new(AttendanceRecorder::new(
        validator,
        IdempotencyGuard::new(store.clone()),
        validation_pool,
        publisher,
    ));

    let state = AppState {
        recorder,
        registry,
        store,
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(&config, state);
    let mut server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    tokio::select! {
        result = &mut server_task => {
            result??;
        }
        _ = lifecycle::wait_for_signal() => {
            tracing::info!("Interrupt received, shutting down");
        }
    }

    shutdown.trigger();
    if !server_task.is_finished() {
        server_task.await??;
    }
    let _ = worker_handle.await;

    memory.save_to_file()?;

    tracing::info!("Shutdown complete");
    Ok(())
}
