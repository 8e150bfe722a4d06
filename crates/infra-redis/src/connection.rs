// Redis Connection Setup

use crate::error::map_redis_error;
use overseer_core::error::{AppError, Result};
use redis::aio::MultiplexedConnection;
use tracing::info;

/// Open a multiplexed connection; clones share the same socket
pub async fn connect(redis_url: &str) -> Result<MultiplexedConnection> {
    let client = redis::Client::open(redis_url)
        .map_err(|e| AppError::Config(format!("invalid redis url: {}", e)))?;
    let conn = client
        .get_multiplexed_async_connection()
        .await
        .map_err(map_redis_error)?;
    info!("Connected to redis");
    Ok(conn)
}
