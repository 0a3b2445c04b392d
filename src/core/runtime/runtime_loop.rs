use crate::core::components::{Sample, VizComponent};
use crate::core::error::{Result, VizError};
use crate::core::execution::{RuntimeConfig, SimulatorBuilder, Steppable, Topology};
use crate::core::model::{lock_model, SharedModel};
use crate::core::runtime::control::{LoopControl, LoopShared};
use crate::core::runtime::registry::ComponentRegistry;
use log::{debug, error, info, warn};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// State reachable from both the loop thread and caller threads
struct LoopInner {
    model: SharedModel,
    /// Serializes every graph mutation and every registry change
    build_lock: Arc<Mutex<()>>,
    builder: Arc<dyn SimulatorBuilder>,
    registry: RwLock<ComponentRegistry>,
}

impl LoopInner {
    fn registry(&self) -> RwLockReadGuard<'_, ComponentRegistry> {
        self.registry.read().unwrap_or_else(|e| e.into_inner())
    }

    fn registry_mut(&self) -> RwLockWriteGuard<'_, ComponentRegistry> {
        self.registry.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Attach every component, build, detach every component
    ///
    /// Lock order is build lock, then model, then registry.
    fn build_simulation(&self) -> Result<Box<dyn Steppable>> {
        let _exclusive = lock(&self.build_lock);
        let mut model = lock_model(&self.model);
        let components = self.registry().snapshot();

        for (index, component) in components.iter().enumerate() {
            if let Err(e) = Arc::clone(component).add_graph_objects(&mut *model) {
                for attached in components[..index].iter().rev() {
                    if let Err(undo) = attached.remove_graph_objects(&mut *model) {
                        warn!("Could not detach '{}' after failed build: {}", attached.uid(), undo);
                    }
                }
                return Err(VizError::ComponentBuild {
                    uid: component.uid().to_string(),
                    source: Box::new(e),
                });
            }
        }

        let built = self.builder.build(&model);

        let mut detach_error = None;
        for component in &components {
            if let Err(e) = component.remove_graph_objects(&mut *model) {
                warn!("Component '{}' failed to detach: {}", component.uid(), e);
                detach_error.get_or_insert(VizError::ComponentBuild {
                    uid: component.uid().to_string(),
                    source: Box::new(e),
                });
            }
        }

        let simulation = built?;
        match detach_error {
            Some(e) => Err(e),
            None => Ok(simulation),
        }
    }
}

/// The part of a runtime loop that the loop thread owns while running
struct LoopWorker {
    inner: Arc<LoopInner>,
    shared: Arc<LoopShared>,
    simulation: Option<Box<dyn Steppable>>,
    idle_poll: Duration,
}

impl LoopWorker {
    fn discard(&mut self) {
        if self.simulation.take().is_some() {
            self.shared.publish_topology(None);
        }
    }

    fn build(&mut self) -> Result<()> {
        self.shared.building.store(true, Ordering::Release);
        // the previous simulation is gone before the next one exists
        self.discard();

        let generation = self.shared.generation.load(Ordering::Acquire) + 1;
        let started = Instant::now();
        info!("Building simulation generation {}", generation);

        let outcome = match self.inner.build_simulation() {
            Ok(simulation) => {
                self.shared.publish_topology(Some(simulation.topology().clone()));
                self.shared.set_time(simulation.time());
                self.simulation = Some(simulation);
                self.shared.generation.store(generation, Ordering::Release);
                info!(
                    "Built simulation generation {} in {:?}",
                    generation,
                    started.elapsed()
                );
                Ok(())
            }
            Err(e) => {
                error!("Build failed: {}", e);
                self.shared.record_error(e.to_string());
                Err(e)
            }
        };

        self.shared.building.store(false, Ordering::Release);
        outcome
    }

    fn step(&mut self) -> Result<()> {
        let Some(simulation) = self.simulation.as_mut() else {
            return Err(VizError::RuntimeState("no simulation has been built".to_string()));
        };
        let result = simulation.step();
        let t = simulation.time();
        match result {
            Ok(()) => {
                self.shared.set_time(t);
                Ok(())
            }
            Err(e) => {
                error!("Step failed at t={}: {}", t, e);
                self.shared.record_error(e.to_string());
                self.discard();
                Err(e)
            }
        }
    }

    fn run(mut self) -> Self {
        info!("Runtime loop started");
        while !self.shared.finished.load(Ordering::Acquire) {
            if self.simulation.is_none() || self.shared.paused.load(Ordering::Acquire) {
                thread::sleep(self.idle_poll);
            } else {
                // failures are logged and recorded by step
                let _ = self.step();
            }

            if self.shared.rebuild_requested.swap(false, Ordering::AcqRel) {
                let _ = self.build();
            }
        }
        info!("Runtime loop exited");
        self
    }
}

/// Owns one simulation thread and the components observing it
///
/// Construction has no side effects: the thread only exists between
/// `start` and `stop`. While stopped, `build` and `step` run synchronously
/// on the caller's thread.
pub struct RuntimeLoop {
    name: String,
    shared: Arc<LoopShared>,
    inner: Arc<LoopInner>,
    worker: Mutex<Option<LoopWorker>>,
    thread: Mutex<Option<JoinHandle<LoopWorker>>>,
}

impl RuntimeLoop {
    pub fn new(model: SharedModel, builder: Arc<dyn SimulatorBuilder>, config: &RuntimeConfig) -> Self {
        Self::with_build_lock(model, builder, config, Arc::new(Mutex::new(())))
    }

    /// Create a loop sharing an exclusive build lock with other loops on the same model
    pub fn with_build_lock(
        model: SharedModel,
        builder: Arc<dyn SimulatorBuilder>,
        config: &RuntimeConfig,
        build_lock: Arc<Mutex<()>>,
    ) -> Self {
        let shared = Arc::new(LoopShared::new());
        let inner = Arc::new(LoopInner {
            model,
            build_lock,
            builder,
            registry: RwLock::new(ComponentRegistry::new()),
        });
        let worker = LoopWorker {
            inner: Arc::clone(&inner),
            shared: Arc::clone(&shared),
            simulation: None,
            idle_poll: config.idle_poll,
        };
        Self {
            name: "runtime".to_string(),
            shared,
            inner,
            worker: Mutex::new(Some(worker)),
            thread: Mutex::new(None),
        }
    }

    /// Name used for the loop thread
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn control(&self) -> LoopControl {
        LoopControl::new(Arc::clone(&self.shared))
    }

    /// Insert a component into the registry, waiting out any build in progress
    pub fn register(&self, component: Arc<dyn VizComponent>) -> Result<()> {
        let _exclusive = lock(&self.inner.build_lock);
        debug!("Registering component '{}' ({})", component.uid(), component.kind());
        self.inner.registry_mut().register(component)
    }

    /// Register a component and rebuild so it takes part in the simulation
    pub fn add_component(&self, component: Arc<dyn VizComponent>) -> Result<()> {
        let uid = component.uid().to_string();
        self.register(component)?;
        info!("Added component '{}'", uid);
        self.request_rebuild();
        Ok(())
    }

    /// Remove a component and rebuild without it, waiting out any build in progress
    pub fn remove_component(&self, uid: &str) -> Result<Arc<dyn VizComponent>> {
        let removed = {
            let _exclusive = lock(&self.inner.build_lock);
            self.inner
                .registry_mut()
                .remove(uid)
                .ok_or_else(|| VizError::ComponentNotFound(uid.to_string()))?
        };
        info!("Removed component '{}'", uid);
        self.request_rebuild();
        Ok(removed)
    }

    pub fn component(&self, uid: &str) -> Option<Arc<dyn VizComponent>> {
        self.inner.registry().get(uid).cloned()
    }

    /// Components in build order
    pub fn components(&self) -> Vec<Arc<dyn VizComponent>> {
        self.inner.registry().snapshot()
    }

    /// Client-poll path: everything a component buffered since the last drain
    pub fn drain(&self, uid: &str) -> Result<Vec<Sample>> {
        let component = self
            .component(uid)
            .ok_or_else(|| VizError::ComponentNotFound(uid.to_string()))?;
        Ok(component.drain_for_client())
    }

    /// Client-message path: route a raw message to the addressed component
    pub fn deliver(&self, uid: &str, raw: &str) -> Result<()> {
        let component = self
            .component(uid)
            .ok_or_else(|| VizError::ComponentNotFound(uid.to_string()))?;
        component.on_message(raw);
        Ok(())
    }

    pub fn request_rebuild(&self) {
        self.control().request_rebuild();
    }

    /// Ask the loop thread to exit after its current step
    pub fn finish(&self) {
        self.control().finish();
    }

    pub fn is_building(&self) -> bool {
        self.shared.building.load(Ordering::Acquire)
    }

    pub fn is_finished(&self) -> bool {
        self.shared.finished.load(Ordering::Acquire)
    }

    pub fn rebuild_pending(&self) -> bool {
        self.shared.rebuild_requested.load(Ordering::Acquire)
    }

    /// Number of successful builds so far
    pub fn generation(&self) -> u64 {
        self.shared.generation.load(Ordering::Acquire)
    }

    /// Simulated time after the most recent step
    pub fn time(&self) -> f64 {
        self.shared.time()
    }

    /// Topology of the live simulation, if there is one
    pub fn topology(&self) -> Option<Topology> {
        self.shared.topology()
    }

    pub fn has_simulation(&self) -> bool {
        self.shared.topology().is_some()
    }

    /// Most recent build or step failure, cleared by reading
    pub fn take_build_error(&self) -> Option<String> {
        self.shared.take_error()
    }

    fn idle_worker(&self) -> Result<MutexGuard<'_, Option<LoopWorker>>> {
        let worker = lock(&self.worker);
        if worker.is_none() {
            return Err(VizError::RuntimeState(format!(
                "runtime '{}' is running on its own thread",
                self.name
            )));
        }
        Ok(worker)
    }

    /// Rebuild on the calling thread; only while the loop thread is not running
    pub fn build(&self) -> Result<()> {
        let mut guard = self.idle_worker()?;
        self.shared.rebuild_requested.store(false, Ordering::Release);
        match guard.as_mut() {
            Some(worker) => worker.build(),
            None => Err(VizError::RuntimeState("runtime is running".to_string())),
        }
    }

    /// Step on the calling thread; only while the loop thread is not running
    pub fn step(&self) -> Result<()> {
        let mut guard = self.idle_worker()?;
        match guard.as_mut() {
            Some(worker) => worker.step(),
            None => Err(VizError::RuntimeState("runtime is running".to_string())),
        }
    }

    /// Spawn the loop thread
    pub fn start(&self) -> Result<()> {
        if self.is_finished() {
            return Err(VizError::RuntimeState(format!("runtime '{}' has finished", self.name)));
        }
        let worker = self.idle_worker()?.take().ok_or_else(|| {
            VizError::RuntimeState(format!("runtime '{}' is already running", self.name))
        })?;
        let handle = thread::Builder::new()
            .name(format!("simviz-{}", self.name))
            .spawn(move || worker.run())?;
        *lock(&self.thread) = Some(handle);
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        lock(&self.thread).is_some()
    }

    /// Finish and wait for the loop thread to exit
    pub fn stop(&self) -> Result<()> {
        self.finish();
        let handle = lock(&self.thread).take();
        if let Some(handle) = handle {
            let worker = handle
                .join()
                .map_err(|_| VizError::RuntimeState(format!("runtime '{}' thread panicked", self.name)))?;
            *lock(&self.worker) = Some(worker);
        }
        Ok(())
    }
}

impl Drop for RuntimeLoop {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("{}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::components::{SimControl, Value};
    use crate::core::execution::ReferenceBuilder;
    use crate::core::model::{ModelGraph, ModelGraphAdapter, NodeSpec};
    use crate::core::types::ObjectId;

    fn runtime() -> (RuntimeLoop, SharedModel, ObjectId) {
        let mut graph = ModelGraph::new();
        let root = graph.root();
        let stim = graph.add_node(root, Some("stim"), NodeSpec::constant(vec![1.0])).unwrap();
        let model = Arc::new(Mutex::new(graph));
        let config = RuntimeConfig::default();
        let builder = Arc::new(ReferenceBuilder::new(config.clone()).unwrap());
        (RuntimeLoop::new(Arc::clone(&model), builder, &config), model, stim)
    }

    #[test]
    fn test_construction_has_no_side_effects() {
        let (runtime, _, _) = runtime();
        assert!(!runtime.is_running());
        assert!(!runtime.has_simulation());
        assert!(runtime.rebuild_pending());
        assert_eq!(runtime.generation(), 0);
    }

    #[test]
    fn test_sync_build_and_step() {
        let (runtime, model, stim) = runtime();
        runtime.register(Arc::new(Value::new("value0", stim))).unwrap();
        let before = lock_model(&model).snapshot();

        runtime.build().unwrap();
        assert_eq!(lock_model(&model).snapshot(), before);
        assert_eq!(runtime.generation(), 1);
        assert!(!runtime.rebuild_pending());

        runtime.step().unwrap();
        runtime.step().unwrap();
        assert_eq!(runtime.drain("value0").unwrap().len(), 2);
        assert!((runtime.time() - 0.002).abs() < 1e-12);
    }

    #[test]
    fn test_step_without_simulation_fails() {
        let (runtime, _, _) = runtime();
        assert!(matches!(runtime.step(), Err(VizError::RuntimeState(_))));
    }

    #[test]
    fn test_failed_attach_rolls_back_and_reports() {
        let (runtime, model, _) = runtime();
        runtime.register(Arc::new(SimControl::new("sim"))).unwrap();
        runtime.register(Arc::new(Value::new("ghost", ObjectId(99)))).unwrap();
        let before = lock_model(&model).snapshot();

        let err = runtime.build().unwrap_err();
        assert!(matches!(err, VizError::ComponentBuild { ref uid, .. } if uid == "ghost"));
        assert_eq!(lock_model(&model).snapshot(), before);
        assert!(!runtime.has_simulation());
        assert!(!runtime.is_building());
        assert!(runtime.take_build_error().unwrap().contains("ghost"));
        assert!(runtime.components().iter().all(|c| !c.has_graph_objects()));
    }

    #[test]
    fn test_unknown_component_addressing() {
        let (runtime, _, _) = runtime();
        assert!(matches!(runtime.drain("nope"), Err(VizError::ComponentNotFound(_))));
        assert!(matches!(runtime.deliver("nope", "x"), Err(VizError::ComponentNotFound(_))));
        assert!(matches!(runtime.remove_component("nope"), Err(VizError::ComponentNotFound(_))));
    }

    #[test]
    fn test_start_stop_lifecycle() {
        let (runtime, _, stim) = runtime();
        runtime.register(Arc::new(Value::new("value0", stim))).unwrap();
        runtime.start().unwrap();
        assert!(runtime.is_running());
        assert!(matches!(runtime.step(), Err(VizError::RuntimeState(_))));
        assert!(runtime.start().is_err());
        runtime.stop().unwrap();
        assert!(!runtime.is_running());
        assert!(runtime.start().is_err());
    }
}
