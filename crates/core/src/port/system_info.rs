// System Info Port

/// Facts about the host executing jobs
pub trait SystemInfo: Send + Sync {
    fn hostname(&self) -> String;
}

/// Fixed hostname (tests, single-host setups)
pub struct StaticSystemInfo {
    hostname: String,
}

impl StaticSystemInfo {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
        }
    }
}

impl SystemInfo for StaticSystemInfo {
    fn hostname(&self) -> String {
        self.hostname.clone()
    }
}
