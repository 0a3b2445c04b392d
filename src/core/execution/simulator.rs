use crate::core::error::{Result, VizError};
use crate::core::execution::config::{ConcurrencyMode, RuntimeConfig};
use crate::core::model::{ModelGraph, NodeOutput, ObjectKind};
use crate::core::spa::mat_vec;
use crate::core::types::{Endpoint, ObjectId};
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

/// Membrane time constant of ensemble neurons
const TAU_RC: f64 = 0.02;

/// A built, steppable simulation
///
/// A simulation is a frozen snapshot of the model graph it was built from.
pub trait Steppable: Send {
    /// Advance simulated time by one timestep
    fn step(&mut self) -> Result<()>;

    /// Current simulated time in seconds
    fn time(&self) -> f64;

    /// Number of steps taken
    fn steps(&self) -> u64;

    /// Label-based signature of the graph this simulation was built from
    fn topology(&self) -> &Topology;

    /// Latest decoded value of an object, if the simulation contains it
    fn probe(&self, id: ObjectId) -> Option<Vec<f64>>;
}

/// Constructs simulations from a model graph
pub trait SimulatorBuilder: Send + Sync {
    fn build(&self, model: &ModelGraph) -> Result<Box<dyn Steppable>>;
}

/// Sorted node and connection labels; ids of ephemeral probes are not part of it
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Topology {
    pub objects: Vec<String>,
    pub connections: Vec<(String, String)>,
}

impl Topology {
    pub fn of(model: &ModelGraph) -> Self {
        let endpoint_label = |e: &Endpoint| match e {
            Endpoint::Value(id) => model.describe(*id),
            Endpoint::Neurons(id) => format!("{}.neurons", model.describe(*id)),
        };
        let mut objects: Vec<String> = model
            .objects()
            .filter(|o| !o.is_network())
            .map(|o| model.describe(o.id))
            .collect();
        objects.sort();
        let mut connections: Vec<(String, String)> = model
            .connections()
            .map(|(_, c)| (endpoint_label(&c.pre), endpoint_label(&c.post)))
            .collect();
        connections.sort();
        Self { objects, connections }
    }
}

/// Builder for the in-crate reference `Simulator`
pub struct ReferenceBuilder {
    config: RuntimeConfig,
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl ReferenceBuilder {
    pub fn new(config: RuntimeConfig) -> Result<Self> {
        let pool = match (config.concurrency_mode, config.thread_pool_size) {
            (ConcurrencyMode::Rayon, Some(size)) => Some(Arc::new(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(size)
                    .thread_name(|i| format!("simviz-eval-{}", i))
                    .build()
                    .map_err(|e| VizError::Build(format!("thread pool: {}", e)))?,
            )),
            _ => None,
        };
        Ok(Self { config, pool })
    }
}

impl SimulatorBuilder for ReferenceBuilder {
    fn build(&self, model: &ModelGraph) -> Result<Box<dyn Steppable>> {
        Ok(Box::new(Simulator::new(model, &self.config, self.pool.clone())?))
    }
}

enum SimKind {
    Node(NodeOutput),
    Ensemble(EnsembleState),
}

struct EnsembleState {
    encoders: Vec<Vec<f64>>,
    gains: Vec<f64>,
    biases: Vec<f64>,
    voltages: Vec<f64>,
}

impl EnsembleState {
    fn new(n_neurons: usize, dimensions: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let encoders = (0..n_neurons)
            .map(|_| {
                let raw: Vec<f64> = (0..dimensions).map(|_| StandardNormal.sample(&mut rng)).collect();
                let norm = raw.iter().map(|x| x * x).sum::<f64>().sqrt();
                if norm > 0.0 {
                    raw.into_iter().map(|x| x / norm).collect()
                } else {
                    raw
                }
            })
            .collect();
        let gains = (0..n_neurons).map(|_| rng.gen_range(1.0..2.0)).collect();
        let biases = (0..n_neurons).map(|_| rng.gen_range(0.5..1.5)).collect();
        Self {
            encoders,
            gains,
            biases,
            voltages: vec![0.0; n_neurons],
        }
    }
}

struct SimObject {
    id: ObjectId,
    kind: SimKind,
    size_in: usize,
    size_out: usize,
    input: Vec<f64>,
    neuron_input: Vec<f64>,
    value: Vec<f64>,
    spikes: Vec<f64>,
}

impl SimObject {
    fn evaluate(&mut self, t: f64, dt: f64) -> Result<()> {
        match &mut self.kind {
            SimKind::Node(output) => {
                let value = output.evaluate(t, &self.input);
                if value.len() != self.size_out {
                    return Err(VizError::Step(format!(
                        "node {} produced {} values, expected {}",
                        self.id,
                        value.len(),
                        self.size_out
                    )));
                }
                self.value = value;
            }
            SimKind::Ensemble(state) => {
                self.value.copy_from_slice(&self.input);
                for i in 0..state.voltages.len() {
                    let drive: f64 = state.encoders[i].iter().zip(&self.input).map(|(e, x)| e * x).sum();
                    let current = state.gains[i] * drive + state.biases[i] + self.neuron_input[i];
                    let v = &mut state.voltages[i];
                    *v += (current - *v) * dt / TAU_RC;
                    if *v > 1.0 {
                        self.spikes[i] = 1.0 / dt;
                        *v = 0.0;
                    } else {
                        self.spikes[i] = 0.0;
                        if *v < 0.0 {
                            *v = 0.0;
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

struct SimConnection {
    pre: usize,
    pre_neurons: bool,
    post: usize,
    post_neurons: bool,
    decay: Option<f64>,
    transform: Option<Vec<Vec<f64>>>,
    filtered: Vec<f64>,
}

/// Reference simulator stepping a frozen copy of the model graph
///
/// Every connection reads the previous step's output of its source, so
/// evaluation order within a step does not matter and recurrent graphs
/// need no special handling.
pub struct Simulator {
    objects: Vec<SimObject>,
    connections: Vec<SimConnection>,
    index: HashMap<ObjectId, usize>,
    topology: Topology,
    dt: f64,
    time: f64,
    steps: u64,
    concurrency_mode: ConcurrencyMode,
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl Simulator {
    pub fn new(model: &ModelGraph, config: &RuntimeConfig, pool: Option<Arc<rayon::ThreadPool>>) -> Result<Self> {
        if !(config.dt > 0.0) {
            return Err(VizError::Build(format!("dt must be positive, got {}", config.dt)));
        }
        let mut objects = Vec::new();
        let mut index = HashMap::new();
        for obj in model.objects() {
            let (kind, size_in, size_out, n_neurons) = match &obj.kind {
                ObjectKind::Network { .. } => continue,
                ObjectKind::Node(node) => (SimKind::Node(node.output.clone()), node.size_in, node.size_out(), 0),
                ObjectKind::Ensemble(ens) => {
                    let seed = ens
                        .seed
                        .unwrap_or_else(|| config.seed.unwrap_or(0).wrapping_add(obj.id.raw()));
                    (
                        SimKind::Ensemble(EnsembleState::new(ens.n_neurons, ens.dimensions, seed)),
                        ens.dimensions,
                        ens.dimensions,
                        ens.n_neurons,
                    )
                }
            };
            index.insert(obj.id, objects.len());
            objects.push(SimObject {
                id: obj.id,
                kind,
                size_in,
                size_out,
                input: vec![0.0; size_in],
                neuron_input: vec![0.0; n_neurons],
                value: vec![0.0; size_out],
                spikes: vec![0.0; n_neurons],
            });
        }

        let mut connections = Vec::new();
        for (id, spec) in model.connections() {
            let lookup = |e: &Endpoint| {
                index
                    .get(&e.object())
                    .copied()
                    .ok_or_else(|| VizError::Build(format!("{} refers to missing {}", id, e.object())))
            };
            let post = lookup(&spec.post)?;
            let width = if spec.post.is_neurons() {
                objects[post].neuron_input.len()
            } else {
                objects[post].size_in
            };
            connections.push(SimConnection {
                pre: lookup(&spec.pre)?,
                pre_neurons: spec.pre.is_neurons(),
                post,
                post_neurons: spec.post.is_neurons(),
                decay: spec.synapse.filter(|tau| *tau > 0.0).map(|tau| (-config.dt / tau).exp()),
                transform: spec.transform.clone(),
                filtered: vec![0.0; width],
            });
        }

        debug!(
            "Built simulator with {} objects and {} connections",
            objects.len(),
            connections.len()
        );

        Ok(Self {
            objects,
            connections,
            index,
            topology: Topology::of(model),
            dt: config.dt,
            time: 0.0,
            steps: 0,
            concurrency_mode: config.concurrency_mode,
            pool,
        })
    }

    fn route_connections(&mut self) {
        for obj in &mut self.objects {
            obj.input.iter_mut().for_each(|x| *x = 0.0);
            obj.neuron_input.iter_mut().for_each(|x| *x = 0.0);
        }
        for conn in &mut self.connections {
            let source = &self.objects[conn.pre];
            let raw = if conn.pre_neurons { &source.spikes } else { &source.value };
            let x = match &conn.transform {
                Some(matrix) => mat_vec(matrix, raw),
                None => raw.clone(),
            };
            match conn.decay {
                Some(decay) => {
                    for (y, x) in conn.filtered.iter_mut().zip(&x) {
                        *y = decay * *y + (1.0 - decay) * x;
                    }
                }
                None => conn.filtered.copy_from_slice(&x),
            }
            let target = &mut self.objects[conn.post];
            let sink = if conn.post_neurons {
                &mut target.neuron_input
            } else {
                &mut target.input
            };
            for (acc, y) in sink.iter_mut().zip(&conn.filtered) {
                *acc += y;
            }
        }
    }

    fn evaluate_objects(&mut self) -> Result<()> {
        let (t, dt) = (self.time, self.dt);
        match self.concurrency_mode {
            ConcurrencyMode::Sequential => self.objects.iter_mut().try_for_each(|o| o.evaluate(t, dt)),
            ConcurrencyMode::Rayon => {
                let objects = &mut self.objects;
                match &self.pool {
                    Some(pool) => pool.install(|| objects.par_iter_mut().try_for_each(|o| o.evaluate(t, dt))),
                    None => objects.par_iter_mut().try_for_each(|o| o.evaluate(t, dt)),
                }
            }
        }
    }
}

impl Steppable for Simulator {
    fn step(&mut self) -> Result<()> {
        self.steps += 1;
        self.time = self.steps as f64 * self.dt;
        self.route_connections();
        self.evaluate_objects()
    }

    fn time(&self) -> f64 {
        self.time
    }

    fn steps(&self) -> u64 {
        self.steps
    }

    fn topology(&self) -> &Topology {
        &self.topology
    }

    fn probe(&self, id: ObjectId) -> Option<Vec<f64>> {
        self.index.get(&id).map(|i| self.objects[*i].value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{ConnectionSpec, EnsembleSpec, NodeSpec};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn chain() -> (ModelGraph, ObjectId, ObjectId) {
        let mut graph = ModelGraph::new();
        let root = graph.root();
        let stim = graph.add_node(root, Some("stim"), NodeSpec::constant(vec![0.5, -0.5])).unwrap();
        let out = graph.add_node(root, Some("out"), NodeSpec::passthrough(2)).unwrap();
        graph.connect(ConnectionSpec::new(stim.value(), out.value())).unwrap();
        (graph, stim, out)
    }

    #[test]
    fn test_values_propagate_with_one_step_delay() {
        let (graph, _stim, out) = chain();
        let mut sim = Simulator::new(&graph, &RuntimeConfig::default(), None).unwrap();
        sim.step().unwrap();
        assert_eq!(sim.probe(out).unwrap(), vec![0.0, 0.0]);
        sim.step().unwrap();
        assert_eq!(sim.probe(out).unwrap(), vec![0.5, -0.5]);
        assert_eq!(sim.steps(), 2);
        assert!((sim.time() - 0.002).abs() < 1e-12);
    }

    #[test]
    fn test_synapse_filters_toward_input() {
        let mut graph = ModelGraph::new();
        let root = graph.root();
        let stim = graph.add_node(root, None, NodeSpec::constant(vec![1.0])).unwrap();
        let out = graph.add_node(root, None, NodeSpec::passthrough(1)).unwrap();
        graph
            .connect(ConnectionSpec::new(stim.value(), out.value()).with_synapse(0.01))
            .unwrap();
        let mut sim = Simulator::new(&graph, &RuntimeConfig::default(), None).unwrap();
        let mut last = 0.0;
        for _ in 0..100 {
            sim.step().unwrap();
            let v = sim.probe(out).unwrap()[0];
            assert!(v >= last);
            last = v;
        }
        assert!(last > 0.99 && last <= 1.0);
    }

    #[test]
    fn test_function_node_sees_time_and_input() {
        let mut graph = ModelGraph::new();
        let root = graph.root();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let f = graph
            .add_node(
                root,
                None,
                NodeSpec::new(
                    0,
                    NodeOutput::function(1, move |t, _| {
                        counter.fetch_add(1, Ordering::SeqCst);
                        vec![t]
                    }),
                ),
            )
            .unwrap();
        let mut sim = Simulator::new(&graph, &RuntimeConfig::default().with_dt(0.5), None).unwrap();
        sim.step().unwrap();
        sim.step().unwrap();
        assert_eq!(sim.probe(f).unwrap(), vec![1.0]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_wrong_output_width_fails_step() {
        let mut graph = ModelGraph::new();
        let root = graph.root();
        graph
            .add_node(root, None, NodeSpec::new(0, NodeOutput::function(2, |_, _| vec![1.0])))
            .unwrap();
        let mut sim = Simulator::new(&graph, &RuntimeConfig::default(), None).unwrap();
        assert!(matches!(sim.step(), Err(VizError::Step(_))));
    }

    #[test]
    fn test_ensemble_spikes() {
        let mut graph = ModelGraph::new();
        let root = graph.root();
        let ens = graph
            .add_ensemble(root, Some("a"), EnsembleSpec::new(20, 1).with_seed(1))
            .unwrap();
        let probe = graph.add_node(root, None, NodeSpec::passthrough(20)).unwrap();
        graph.connect(ConnectionSpec::new(ens.neurons(), probe.value())).unwrap();
        let mut sim = Simulator::new(&graph, &RuntimeConfig::default(), None).unwrap();
        let mut spikes = 0;
        for _ in 0..200 {
            sim.step().unwrap();
            spikes += sim.probe(probe).unwrap().iter().filter(|s| **s > 0.0).count();
        }
        assert!(spikes > 0);
    }

    #[test]
    fn test_rayon_matches_sequential() {
        let (graph, _stim, out) = chain();
        let builder = ReferenceBuilder::new(
            RuntimeConfig::new()
                .with_concurrency(ConcurrencyMode::Rayon)
                .with_thread_pool_size(2),
        )
        .unwrap();
        let mut parallel = builder.build(&graph).unwrap();
        let mut sequential = Simulator::new(&graph, &RuntimeConfig::default(), None).unwrap();
        for _ in 0..5 {
            parallel.step().unwrap();
            sequential.step().unwrap();
        }
        assert_eq!(parallel.probe(out), sequential.probe(out));
    }

    #[test]
    fn test_topology_uses_labels() {
        let (graph, _, _) = chain();
        let topology = Topology::of(&graph);
        assert_eq!(topology.objects, vec!["out".to_string(), "stim".to_string()]);
        assert_eq!(topology.connections, vec![("stim".to_string(), "out".to_string())]);
    }
}
