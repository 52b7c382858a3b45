//! Attendance Recording Service Library

pub mod attendance;
pub mod config;
pub mod events;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod validation;

pub use attendance::recorder::AttendanceRecorder;
pub use config::schema::AppConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use resilience::registry::DependencyRegistry;
