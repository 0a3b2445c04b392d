//! Configuration for the runtime loop and reference simulator
//!
//! Covers the simulation timestep, the idle poll interval of the loop
//! thread, and how the simulator evaluates objects within one step.

use std::time::Duration;

/// Enumeration of supported concurrency modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcurrencyMode {
    /// Objects are evaluated in order on the loop thread
    Sequential,
    /// Objects of one step are evaluated in parallel using Rayon
    Rayon,
}

impl Default for ConcurrencyMode {
    fn default() -> Self {
        ConcurrencyMode::Sequential
    }
}

/// Configuration for simulation execution
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Simulated seconds advanced by one step
    pub dt: f64,
    /// Sleep between checks while no simulation is ready to step
    pub idle_poll: Duration,
    /// The concurrency mode to use for execution
    pub concurrency_mode: ConcurrencyMode,
    /// The size of the thread pool for parallel execution
    /// Only relevant when concurrency_mode is Rayon
    pub thread_pool_size: Option<usize>,
    /// Seed for ensemble encoders and other random model state
    pub seed: Option<u64>,
}

impl RuntimeConfig {
    /// Create a new configuration with default values
    ///
    /// Defaults: 1 ms timestep, 10 ms idle poll, sequential evaluation
    pub fn new() -> Self {
        Self {
            dt: 0.001,
            idle_poll: Duration::from_millis(10),
            concurrency_mode: ConcurrencyMode::default(),
            thread_pool_size: None,
            seed: None,
        }
    }

    pub fn with_dt(mut self, dt: f64) -> Self {
        self.dt = dt;
        self
    }

    pub fn with_idle_poll(mut self, interval: Duration) -> Self {
        self.idle_poll = interval;
        self
    }

    /// Set the concurrency mode for the simulation
    pub fn with_concurrency(mut self, mode: ConcurrencyMode) -> Self {
        self.concurrency_mode = mode;
        self
    }

    /// Set the thread pool size for parallel execution
    ///
    /// # Note
    /// This setting only affects execution when concurrency_mode is Rayon
    pub fn with_thread_pool_size(mut self, size: usize) -> Self {
        self.thread_pool_size = Some(size);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::new()
    }
}
