// ID Provider Port (for deterministic testing)

/// ID provider interface (allows deterministic IDs in tests)
pub trait IdProvider: Send + Sync {
    /// Generate a new unique job ID
    fn generate_id(&self) -> String;
}

/// UUID v4 provider (production)
pub struct UuidProvider;

impl IdProvider for UuidProvider {
    fn generate_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Produces job-1, job-2, ...
    #[derive(Default)]
    pub struct SequenceIdProvider {
        counter: AtomicU64,
    }

    impl IdProvider for SequenceIdProvider {
        fn generate_id(&self) -> String {
            let next = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
            format!("job-{}", next)
        }
    }
}
