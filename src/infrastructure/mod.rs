//! Infrastructure
//!
//! Supporting code around the market core:
//! - Logging and metrics
//! - Configuration management
//! - HTTP / WebSocket API
//! - Supervised background loops
//! - Fixed-capacity history buffer

pub mod api;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod ring_buffer;
pub mod schedule;

pub use api::{start_server, AppState};
pub use ring_buffer::RingBuffer;
pub use schedule::ScheduledTask;
