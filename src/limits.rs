//! Resource limits for build execution (v0.1)
//!
//! Provides configurable limits for:
//! - Concurrency within a layer
//! - Per-step timeouts
//! - Whole-build duration

use std::time::Duration;

/// Limits applied by the executor
#[derive(Debug, Clone)]
pub struct ExecLimits {
    /// Maximum number of steps running concurrently within a layer
    pub max_concurrent_steps: usize,

    /// Maximum execution time per step (None = unbounded)
    pub step_timeout: Option<Duration>,

    /// Maximum execution time for the whole build,
    /// checked at layer boundaries
    pub max_build_duration: Duration,
}

impl Default for ExecLimits {
    fn default() -> Self {
        Self {
            max_concurrent_steps: 8,
            step_timeout: None,
            max_build_duration: Duration::from_secs(3600), // 1 hour
        }
    }
}

impl ExecLimits {
    /// Limits suitable for testing (more restrictive)
    pub fn testing() -> Self {
        Self {
            max_concurrent_steps: 2,
            step_timeout: Some(Duration::from_secs(10)),
            max_build_duration: Duration::from_secs(60),
        }
    }

    /// Unbounded configuration (use with caution!)
    pub fn unlimited() -> Self {
        Self {
            max_concurrent_steps: usize::MAX,
            step_timeout: None,
            max_build_duration: Duration::from_secs(86400), // 24 hours
        }
    }

    /// Concurrency bound usable as a semaphore size
    pub fn concurrency(&self) -> usize {
        // Semaphore permits are u32-bounded; clamp the unlimited profile
        self.max_concurrent_steps.clamp(1, u32::MAX as usize / 2)
    }
}
