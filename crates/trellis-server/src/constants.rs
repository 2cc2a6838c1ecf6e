//! Server-wide constants
//!
//! Single source of truth for defaults and identifiers shared across the
//! server modules.

/// Server host configuration
pub mod hosts {
    /// Default host for local server binding
    pub const LOCAL: &str = "127.0.0.1";
}

/// Network port configuration
pub mod ports {
    /// Default port for the HTTP and websocket server
    pub const SERVER: u16 = 8080;
}

/// Default values for runtime configuration
pub mod defaults {
    /// Default compute device list (comma-separated)
    pub const DEVICES: &str = "cpu:0";
}

/// Reserved stream names multiplexed over client connections
pub mod streams {
    /// Subscription management, handled by the hub itself
    pub const STREAMS: &str = "streams";
    /// Graph mutation and sync traffic
    pub const GRAPH: &str = "graph";
}

/// Environment variables read at startup
pub mod env {
    /// Host to bind, defaults to [`super::hosts::LOCAL`]
    pub const HOST: &str = "TRELLIS_HOST";
    /// Port to bind, defaults to [`super::ports::SERVER`]
    pub const PORT: &str = "TRELLIS_PORT";
    /// Comma-separated compute device list, one worker each
    pub const DEVICES: &str = "TRELLIS_DEVICES";
    /// Override path to the worker sidecar binary
    pub const WORKER_BINARY: &str = "TRELLIS_WORKER_BIN";
}

/// Worker sidecar configuration
pub mod workers {
    /// Binary name of the worker sidecar, resolved next to the server binary
    pub const BINARY: &str = "trellis-worker";
}
