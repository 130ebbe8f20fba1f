//! Live price distribution
//!
//! - hub: subscriber registry and non-blocking fan-out
//! - session: WebSocket pump for one subscriber

pub mod hub;
pub mod session;

pub use hub::{BroadcastHub, PublishReport, SubscriberId, Subscription};
pub use session::{run_price_session, SessionEnd};
