//! Trellis server
//!
//! The axum application tying the workspace together: HTTP routes and
//! websocket sessions share one [`AppState`] holding the graph service, the
//! broadcast hub, and the worker pool. Mutations arriving on either surface
//! funnel through the same versioned store and fan out on the `graph`
//! stream. The companion `trellis-worker` binary lives in `src/bin/`.

pub mod config;
pub mod constants;
pub mod hub;
pub mod routes;
pub mod state;
pub mod sync;
pub mod ws;

pub use config::ServerConfig;
pub use hub::{Envelope, Hub};
pub use state::AppState;
pub use sync::{GraphService, GraphView};
