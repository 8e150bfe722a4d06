// Panic isolation for job bodies
use std::any::Any;
use std::future::Future;
use tracing::error;

/// Result of a panic-guarded execution
#[derive(Debug)]
pub enum PanicGuardResult<T> {
    /// Execution completed
    Success(T),
    /// Execution panicked (or its task was cancelled)
    Panicked(String),
}

/// Run a future on its own task so a panic ends only that task.
///
/// The panic payload is turned into a message instead of unwinding into
/// the caller.
pub async fn spawn_guarded<F, T>(future: F) -> PanicGuardResult<T>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::spawn(future).await {
        Ok(result) => PanicGuardResult::Success(result),
        Err(join_error) if join_error.is_panic() => {
            let panic_msg = panic_message(join_error.into_panic());
            error!(panic_msg = %panic_msg, "Job task panicked");
            PanicGuardResult::Panicked(panic_msg)
        }
        Err(join_error) => PanicGuardResult::Panicked(join_error.to_string()),
    }
}

/// Extract the message of a panic payload
pub fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
