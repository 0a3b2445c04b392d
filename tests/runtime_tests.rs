use simviz::core::model::{lock_model, ModelGraphAdapter};
use simviz::{
    ComponentDeclaration, ComponentKind, EnsembleSpec, Environment, ModelGraph, NodeSpec, ObjectId, ReferenceBuilder,
    RuntimeConfig, RuntimeLoop, Sample, Session, SimulatorBuilder, Steppable, Topology, VizError,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Counts how many simulations are alive at once
struct CountingBuilder {
    inner: ReferenceBuilder,
    live: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    fail_next: AtomicBool,
}

struct Counted {
    simulation: Box<dyn Steppable>,
    live: Arc<AtomicUsize>,
}

impl Drop for Counted {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Steppable for Counted {
    fn step(&mut self) -> simviz::Result<()> {
        self.simulation.step()
    }

    fn time(&self) -> f64 {
        self.simulation.time()
    }

    fn steps(&self) -> u64 {
        self.simulation.steps()
    }

    fn topology(&self) -> &Topology {
        self.simulation.topology()
    }

    fn probe(&self, id: ObjectId) -> Option<Vec<f64>> {
        self.simulation.probe(id)
    }
}

impl CountingBuilder {
    fn new(config: &RuntimeConfig) -> Self {
        Self {
            inner: ReferenceBuilder::new(config.clone()).unwrap(),
            live: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
            fail_next: AtomicBool::new(false),
        }
    }
}

impl SimulatorBuilder for CountingBuilder {
    fn build(&self, model: &ModelGraph) -> simviz::Result<Box<dyn Steppable>> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(VizError::Build("refusing this one".to_string()));
        }
        let simulation = self.inner.build(model)?;
        let now = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        Ok(Box::new(Counted {
            simulation,
            live: Arc::clone(&self.live),
        }))
    }
}

struct Fixture {
    session: Session,
    builder: Arc<CountingBuilder>,
    stim: ObjectId,
}

/// A model with a node, an ensemble fed by it, and one plot of each kind
fn fixture() -> Fixture {
    let mut model = ModelGraph::new();
    let root = model.root();
    let stim = model.add_node(root, Some("stim"), NodeSpec::constant(vec![0.5, -0.5])).unwrap();
    let ens = model.add_ensemble(root, Some("ens"), EnsembleSpec::new(20, 2).with_seed(3)).unwrap();
    model
        .connect(simviz::core::model::ConnectionSpec::new(stim.value(), ens.value()).with_synapse(0.005))
        .unwrap();

    let mut env = Environment::new(model);
    env.bind("stim", stim).unwrap();
    env.bind("ens", ens).unwrap();
    env.declare("plot", ComponentDeclaration::value(stim)).unwrap();
    env.declare("xy", ComponentDeclaration::xy_value(ens)).unwrap();
    env.declare("spikes", ComponentDeclaration::raster(ens)).unwrap();
    env.declare("knob", ComponentDeclaration::slider(stim)).unwrap();

    let config = RuntimeConfig::default().with_idle_poll(Duration::from_millis(1));
    let builder = Arc::new(CountingBuilder::new(&config));
    let session = Session::new(env, Arc::clone(&builder) as Arc<dyn SimulatorBuilder>, config).unwrap();
    Fixture { session, builder, stim }
}

fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}

fn snapshot(session: &Session) -> simviz::core::model::GraphSnapshot {
    lock_model(session.model()).snapshot()
}

#[test]
fn test_build_leaves_model_unchanged() {
    let f = fixture();
    let runtime = f.session.create_runtime().unwrap();
    let before = snapshot(&f.session);
    let topology_before = Topology::of(&lock_model(f.session.model()));

    runtime.build().unwrap();

    assert_eq!(snapshot(&f.session), before);
    assert_eq!(Topology::of(&lock_model(f.session.model())), topology_before);
    assert!(runtime.components().iter().all(|c| !c.has_graph_objects()));
    // the slider's output replacement was undone too
    let model = lock_model(f.session.model());
    let stim = model.object(f.stim).and_then(|o| o.as_node()).unwrap();
    assert_eq!(stim.output.evaluate(0.0, &[]), vec![0.5, -0.5]);
}

#[test]
fn test_at_most_one_simulation_alive() {
    let f = fixture();
    let runtime = f.session.create_runtime().unwrap();
    for _ in 0..5 {
        runtime.build().unwrap();
        runtime.step().unwrap();
    }
    assert_eq!(f.builder.live.load(Ordering::SeqCst), 1);
    assert_eq!(f.builder.peak.load(Ordering::SeqCst), 1);
    assert_eq!(runtime.generation(), 5);

    runtime.start().unwrap();
    for _ in 0..5 {
        runtime.request_rebuild();
        let generation = runtime.generation();
        assert!(wait_until(Duration::from_secs(5), || runtime.generation() > generation));
    }
    runtime.stop().unwrap();
    assert_eq!(f.builder.peak.load(Ordering::SeqCst), 1);
}

#[test]
fn test_rebuild_is_idempotent() {
    let f = fixture();
    let runtime = f.session.create_runtime().unwrap();
    runtime.build().unwrap();
    let first = runtime.topology().unwrap();
    runtime.step().unwrap();
    runtime.build().unwrap();
    assert_eq!(runtime.topology().unwrap(), first);
    assert_eq!(runtime.time(), 0.0);
}

#[test]
fn test_privileged_components_come_first() {
    let f = fixture();
    let runtime = f.session.create_runtime().unwrap();
    let kinds: Vec<ComponentKind> = runtime.components().iter().map(|c| c.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            ComponentKind::NetGraph,
            ComponentKind::SimControl,
            ComponentKind::Value,
            ComponentKind::XYValue,
            ComponentKind::Raster,
            ComponentKind::Slider,
        ]
    );
}

#[test]
fn test_failed_build_recovers_on_next_request() {
    let f = fixture();
    let runtime = f.session.create_runtime().unwrap();
    runtime.build().unwrap();

    f.builder.fail_next.store(true, Ordering::SeqCst);
    assert!(runtime.build().is_err());
    assert!(!runtime.has_simulation());
    assert!(runtime.topology().is_none());
    assert_eq!(f.builder.live.load(Ordering::SeqCst), 0);
    assert!(runtime.take_build_error().unwrap().contains("refusing"));
    assert!(runtime.components().iter().all(|c| !c.has_graph_objects()));

    runtime.build().unwrap();
    assert!(runtime.has_simulation());
    assert!(runtime.take_build_error().is_none());
}

#[test]
fn test_threaded_loop_streams_samples() {
    let f = fixture();
    let runtime = f.session.create_runtime().unwrap();
    runtime.start().unwrap();
    assert!(matches!(runtime.build(), Err(VizError::RuntimeState(_))));
    assert!(wait_until(Duration::from_secs(5), || runtime.time() > 0.02));

    let samples = runtime.drain("plot").unwrap();
    assert!(!samples.is_empty());
    let times: Vec<f64> = samples
        .iter()
        .filter_map(|s| match s {
            Sample::Values { t, .. } => Some(*t),
            _ => None,
        })
        .collect();
    assert!(times.windows(2).all(|w| w[0] < w[1]));

    // a drain takes everything buffered so far, so a second one only sees new steps
    let last = *times.last().unwrap();
    let later = runtime.drain("plot").unwrap();
    assert!(later.iter().all(|s| matches!(s, Sample::Values { t, .. } if *t > last)));

    assert!(matches!(runtime.drain("nope"), Err(VizError::ComponentNotFound(_))));
    runtime.stop().unwrap();
    assert!(!runtime.is_running());
    assert!(runtime.start().is_err());
}

#[test]
fn test_pause_stops_time() {
    let f = fixture();
    let runtime = f.session.create_runtime().unwrap();
    runtime.start().unwrap();
    assert!(wait_until(Duration::from_secs(5), || runtime.time() > 0.0));

    runtime.deliver("_viz_sim_control", "pause").unwrap();
    thread::sleep(Duration::from_millis(30));
    let paused_at = runtime.time();
    thread::sleep(Duration::from_millis(30));
    assert_eq!(runtime.time(), paused_at);

    runtime.deliver("_viz_sim_control", "continue").unwrap();
    assert!(wait_until(Duration::from_secs(5), || runtime.time() > paused_at));
    runtime.stop().unwrap();
}

#[test]
fn test_slider_message_reaches_simulation() {
    let f = fixture();
    let runtime = f.session.create_runtime().unwrap();
    runtime.build().unwrap();
    runtime.deliver("knob", "1,0.25").unwrap();
    // the probe is filtered, so give it time to settle
    for _ in 0..100 {
        runtime.step().unwrap();
    }
    let last = runtime
        .drain("plot")
        .unwrap()
        .into_iter()
        .filter_map(|s| match s {
            Sample::Values { values, .. } => Some(values),
            _ => None,
        })
        .last()
        .unwrap();
    assert!((last[0] - 0.5).abs() < 0.01);
    assert!((last[1] - 0.25).abs() < 0.01);
}

#[test]
fn test_loops_from_one_session_are_independent() {
    let f = fixture();
    let a: RuntimeLoop = f.session.create_runtime().unwrap();
    let b: RuntimeLoop = f.session.create_runtime().unwrap();
    a.build().unwrap();
    a.step().unwrap();
    assert!(!b.has_simulation());
    assert!(b.drain("plot").unwrap().is_empty());
    assert!(!a.drain("plot").unwrap().is_empty());
}
