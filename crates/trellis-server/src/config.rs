//! Server configuration
//!
//! Read once at startup from environment variables, with defaults from the
//! constants module. Invalid values fall back to the default with a warning
//! rather than aborting startup.

use std::env;
use std::path::PathBuf;

use crate::constants::{defaults, env as env_keys, hosts, ports};

/// Runtime configuration for the server process
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind the HTTP/websocket listener to
    pub host: String,
    /// Port to bind
    pub port: u16,
    /// Compute devices, one worker process each
    pub devices: Vec<String>,
    /// Explicit path to the worker sidecar binary, if overridden
    pub worker_binary: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: hosts::LOCAL.to_string(),
            port: ports::SERVER,
            devices: vec![defaults::DEVICES.to_string()],
            worker_binary: None,
        }
    }
}

impl ServerConfig {
    /// Build the configuration from the process environment
    pub fn from_env() -> Self {
        Self {
            host: env::var(env_keys::HOST).unwrap_or_else(|_| hosts::LOCAL.to_string()),
            port: parse_port(env::var(env_keys::PORT).ok()),
            devices: parse_devices(env::var(env_keys::DEVICES).ok()),
            worker_binary: env::var(env_keys::WORKER_BINARY).ok().map(PathBuf::from),
        }
    }

    /// The `host:port` string the listener binds to
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_port(raw: Option<String>) -> u16 {
    let Some(value) = raw else {
        return ports::SERVER;
    };
    match value.parse() {
        Ok(port) => port,
        Err(_) => {
            log::warn!("invalid port `{}`, using {}", value, ports::SERVER);
            ports::SERVER
        }
    }
}

fn parse_devices(raw: Option<String>) -> Vec<String> {
    let devices: Vec<String> = raw
        .as_deref()
        .unwrap_or(defaults::DEVICES)
        .split(',')
        .map(str::trim)
        .filter(|device| !device.is_empty())
        .map(str::to_string)
        .collect();
    if devices.is_empty() {
        vec![defaults::DEVICES.to_string()]
    } else {
        devices
    }
}
