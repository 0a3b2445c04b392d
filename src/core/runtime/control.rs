use crate::core::execution::Topology;
use log::debug;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Flags and published state shared between the loop thread and callers
#[derive(Debug)]
pub(crate) struct LoopShared {
    pub(crate) building: AtomicBool,
    pub(crate) rebuild_requested: AtomicBool,
    pub(crate) finished: AtomicBool,
    pub(crate) paused: AtomicBool,
    pub(crate) generation: AtomicU64,
    time_bits: AtomicU64,
    last_error: Mutex<Option<String>>,
    topology: Mutex<Option<Topology>>,
}

impl LoopShared {
    pub(crate) fn new() -> Self {
        Self {
            building: AtomicBool::new(false),
            // the first loop iteration builds
            rebuild_requested: AtomicBool::new(true),
            finished: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            time_bits: AtomicU64::new(0f64.to_bits()),
            last_error: Mutex::new(None),
            topology: Mutex::new(None),
        }
    }

    pub(crate) fn set_time(&self, t: f64) {
        self.time_bits.store(t.to_bits(), Ordering::Release);
    }

    pub(crate) fn time(&self) -> f64 {
        f64::from_bits(self.time_bits.load(Ordering::Acquire))
    }

    fn last_error(&self) -> MutexGuard<'_, Option<String>> {
        self.last_error.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn record_error(&self, message: String) {
        *self.last_error() = Some(message);
    }

    pub(crate) fn take_error(&self) -> Option<String> {
        self.last_error().take()
    }

    fn topology_slot(&self) -> MutexGuard<'_, Option<Topology>> {
        self.topology.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn publish_topology(&self, topology: Option<Topology>) {
        *self.topology_slot() = topology;
    }

    pub(crate) fn topology(&self) -> Option<Topology> {
        self.topology_slot().clone()
    }
}

/// Cheap handle for steering a runtime loop from any thread
///
/// None of these calls block.
#[derive(Debug, Clone)]
pub struct LoopControl {
    shared: Arc<LoopShared>,
}

impl LoopControl {
    pub(crate) fn new(shared: Arc<LoopShared>) -> Self {
        Self { shared }
    }

    /// A control not attached to any loop
    pub fn detached() -> Self {
        Self::new(Arc::new(LoopShared::new()))
    }

    /// Ask the loop to rebuild after its current step; idempotent
    pub fn request_rebuild(&self) {
        debug!("Rebuild requested");
        self.shared.rebuild_requested.store(true, Ordering::Release);
    }

    pub fn rebuild_pending(&self) -> bool {
        self.shared.rebuild_requested.load(Ordering::Acquire)
    }

    pub fn pause(&self) {
        self.shared.paused.store(true, Ordering::Release);
    }

    pub fn resume(&self) {
        self.shared.paused.store(false, Ordering::Release);
    }

    pub fn is_paused(&self) -> bool {
        self.shared.paused.load(Ordering::Acquire)
    }

    pub fn is_building(&self) -> bool {
        self.shared.building.load(Ordering::Acquire)
    }

    /// Terminal: the loop exits after its current step
    pub fn finish(&self) {
        self.shared.finished.store(true, Ordering::Release);
    }

    pub fn is_finished(&self) -> bool {
        self.shared.finished.load(Ordering::Acquire)
    }

    /// Simulated time of the most recent step
    pub fn time(&self) -> f64 {
        self.shared.time()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rebuild_pending_from_start() {
        let control = LoopControl::detached();
        assert!(control.rebuild_pending());
        assert!(!control.is_paused());
        control.pause();
        assert!(control.is_paused());
        control.resume();
        assert!(!control.is_paused());
    }

    #[test]
    fn test_finish_is_visible_to_clones() {
        let control = LoopControl::detached();
        let other = control.clone();
        control.finish();
        assert!(other.is_finished());
    }
}
