//! Shared utilities for integration testing.

use std::collections::HashSet;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

use attendance_service::attendance::idempotency::IdempotencyGuard;
use attendance_service::attendance::recorder::AttendanceRecorder;
use attendance_service::attendance::store::{AttendanceStore, MemoryStore};
use attendance_service::config::schema::{BulkheadConfig, ResilienceConfig, ServicesConfig};
use attendance_service::events::publisher::{EventSink, EventWorker, SinkError};
use attendance_service::lifecycle::Shutdown;
use attendance_service::resilience::registry::DependencyRegistry;
use attendance_service::resilience::timeouts::TimeoutPolicy;
use attendance_service::validation::validator::ServiceValidator;

/// Start a mock peer service answering each request via `f(path)`.
pub async fn start_mock_service<F, Fut>(addr: SocketAddr, f: F)
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await.unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let mut reader = BufReader::new(socket);
                        let mut request_line = String::new();
                        if reader.read_line(&mut request_line).await.is_err() {
                            return;
                        }
                        let path = request_line
                            .split_whitespace()
                            .nth(1)
                            .unwrap_or("/")
                            .to_string();

                        let (status, body) = f(path).await;
                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            429 => "429 Too Many Requests",
                            500 => "500 Internal Server Error",
                            502 => "502 Bad Gateway",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let mut socket = reader.into_inner();
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });
}

/// Start a peer service owning a fixed set of entity ids: 200 when the last
/// path segment is known, 404 otherwise.
#[allow(dead_code)]
pub async fn start_entity_service(addr: SocketAddr, known_ids: &[&str]) {
    let known: HashSet<String> = known_ids.iter().map(|s| s.to_string()).collect();
    start_mock_service(addr, move |path| {
        let known = known.clone();
        async move {
            let id = path.rsplit('/').next().unwrap_or("").to_string();
            if known.contains(&id) {
                (200, format!("{{\"id\":\"{}\"}}", id))
            } else {
                (404, "{\"error\":\"not found\"}".to_string())
            }
        }
    })
    .await;
}

/// Event sink collecting everything it is asked to publish.
pub struct CollectingSink {
    pub delivered: std::sync::Mutex<Vec<attendance_service::events::publisher::AttendanceEvent>>,
}

impl CollectingSink {
    #[allow(dead_code)]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            delivered: std::sync::Mutex::new(Vec::new()),
        })
    }
}

#[async_trait::async_trait]
impl EventSink for CollectingSink {
    async fn publish(
        &self,
        event: &attendance_service::events::publisher::AttendanceEvent,
    ) -> Result<(), SinkError> {
        self.delivered.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Fully wired recorder with mock-service URLs and test-friendly settings.
pub struct Harness {
    pub recorder: Arc<AttendanceRecorder>,
    pub registry: Arc<DependencyRegistry>,
    pub store: Arc<MemoryStore>,
    pub sink: Arc<CollectingSink>,
    // Dropping the coordinator would close the worker's shutdown channel.
    _shutdown: Shutdown,
}

#[allow(dead_code)]
pub fn harness(student_url: &str, course_url: &str, resilience: ResilienceConfig) -> Harness {
    harness_with_pool(
        student_url,
        course_url,
        resilience,
        BulkheadConfig::validation_default(),
    )
}

#[allow(dead_code)]
pub fn harness_with_pool(
    student_url: &str,
    course_url: &str,
    resilience: ResilienceConfig,
    pool: BulkheadConfig,
) -> Harness {
    let registry = Arc::new(DependencyRegistry::new(&resilience));
    registry.register_pool(&pool);

    let store = Arc::new(MemoryStore::new(None));
    let dyn_store: Arc<dyn AttendanceStore> = store.clone();

    let services = ServicesConfig {
        student_service_url: student_url.to_string(),
        course_service_url: course_url.to_string(),
        check_timeout_secs: 1,
        check_enrollment: false,
    };
    let timeouts = TimeoutPolicy {
        validation: Duration::from_secs(1),
        request: Duration::from_secs(10),
    };
    let validator = ServiceValidator::new(registry.clone(), &services, timeouts);

    let sink = CollectingSink::new();
    let (publisher, worker) = EventWorker::channel(64, sink.clone());
    let shutdown = Shutdown::new();
    tokio::spawn(worker.run(shutdown.subscribe()));

    let validation_pool = registry.pool(&pool.name).unwrap();
    let recorder = Arc::new(AttendanceRecorder::new(
        validator,
        IdempotencyGuard::new(dyn_store),
        validation_pool,
        publisher,
    ));

    Harness {
        recorder,
        registry,
        store,
        sink,
        _shutdown: shutdown,
    }
}
