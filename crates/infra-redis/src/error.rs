// redis error mapping

use overseer_core::error::AppError;

pub(crate) fn map_redis_error(err: redis::RedisError) -> AppError {
    if err.is_connection_refusal() || err.is_connection_dropped() {
        AppError::Repository(format!("Redis connection error: {}", err))
    } else if err.is_timeout() {
        AppError::Repository(format!("Redis timeout: {}", err))
    } else {
        AppError::Repository(format!("Redis command error: {}", err))
    }
}
