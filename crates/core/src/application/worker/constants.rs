// Runtime constants (no magic values)
use std::time::Duration;

/// Default keep-alive period of a running job (20s)
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(20);

/// Default number of concurrently executing job bodies
pub const DEFAULT_THREAD_COUNT: usize = 10;

/// How long shutdown waits for running jobs before giving up (30s)
pub const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(30);

/// Pause of a trigger loop after a failed trigger attempt (1s)
pub const TRIGGER_ERROR_BACKOFF: Duration = Duration::from_secs(1);
