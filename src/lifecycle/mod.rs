//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Build registry/store/worker → Start listener
//!
//! Shutdown (shutdown.rs):
//!     SIGINT/SIGTERM → broadcast signal → server drains, event worker
//!     flushes its queue, store snapshot is written → Exit
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: stop accepting, flush the event queue, persist
//! - Every long-running task holds its own broadcast receiver

pub mod shutdown;

pub use shutdown::{wait_for_signal, Shutdown};
