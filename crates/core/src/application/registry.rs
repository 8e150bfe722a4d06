// Job Registry - explicit registration of job runnables

use crate::domain::JobDefinition;
use crate::error::{AppError, Result};
use crate::port::JobRunnable;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Runnables by job type, populated once at process start.
/// Lookups ignore ASCII case.
#[derive(Default, Clone)]
pub struct JobRegistry {
    runnables: BTreeMap<String, Arc<dyn JobRunnable>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a runnable; rejects invalid definitions and duplicate types
    pub fn register(&mut self, runnable: Arc<dyn JobRunnable>) -> Result<()> {
        let definition = runnable.definition();
        definition.validate()?;

        let key = definition.job_type.to_ascii_lowercase();
        if self.runnables.contains_key(&key) {
            return Err(AppError::Validation(format!(
                "job type {} registered twice",
                definition.job_type
            )));
        }
        self.runnables.insert(key, runnable);
        Ok(())
    }

    pub fn with(mut self, runnable: Arc<dyn JobRunnable>) -> Result<Self> {
        self.register(runnable)?;
        Ok(self)
    }

    pub fn get(&self, job_type: &str) -> Option<Arc<dyn JobRunnable>> {
        self.runnables.get(&job_type.to_ascii_lowercase()).cloned()
    }

    pub fn definitions(&self) -> Vec<JobDefinition> {
        self.runnables
            .values()
            .map(|runnable| runnable.definition().clone())
            .collect()
    }

    pub fn job_types(&self) -> Vec<String> {
        self.runnables
            .values()
            .map(|runnable| runnable.definition().job_type.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.runnables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runnables.is_empty()
    }
}
