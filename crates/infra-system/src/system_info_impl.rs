// System info implementation
// reason: sysinfo for cross-platform host facts
use overseer_core::port::SystemInfo;
use sysinfo::System;
use tracing::{debug, warn};

const UNKNOWN_HOST: &str = "unknown";

/// Host facts resolved once at startup
pub struct SystemInfoImpl {
    hostname: String,
}

impl SystemInfoImpl {
    pub fn new() -> Self {
        let hostname = match System::host_name() {
            Some(name) if !name.trim().is_empty() => name,
            _ => {
                warn!("Could not resolve hostname, using '{}'", UNKNOWN_HOST);
                UNKNOWN_HOST.to_string()
            }
        };
        debug!(hostname = %hostname, "Resolved hostname");
        Self { hostname }
    }
}

impl Default for SystemInfoImpl {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemInfo for SystemInfoImpl {
    fn hostname(&self) -> String {
        self.hostname.clone()
    }
}
