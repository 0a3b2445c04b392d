use log::info;
use simviz::core::model::ConnectionSpec;
use simviz::core::spa::shared;
use simviz::core::types::Endpoint;
use simviz::{
    ComponentDeclaration, Environment, ModelGraph, NodeSpec, ReferenceBuilder, RuntimeConfig, Sample, Session,
    SpaTarget, Vocabulary,
};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const DIMENSIONS: usize = 16;

fn main() -> simviz::Result<()> {
    env_logger::init();

    let mut vocab = Vocabulary::with_seed(DIMENSIONS, 1);
    for key in ["A", "B", "C"] {
        vocab.create_pointer(key)?;
    }
    let vocab = shared(vocab);

    let mut model = ModelGraph::new();
    let state = model.add_network(model.root(), Some("state"))?;
    let input = model.add_node(state, Some("state.in"), NodeSpec::passthrough(DIMENSIONS))?;
    let output = model.add_node(state, Some("state.out"), NodeSpec::passthrough(DIMENSIONS))?;
    model.connect(ConnectionSpec::new(Endpoint::Value(input), Endpoint::Value(output)).with_synapse(0.01))?;
    model.set_spa_target(
        state,
        "default",
        SpaTarget {
            output,
            output_vocab: Arc::clone(&vocab),
            input,
            input_vocab: vocab,
        },
    )?;

    let mut env = Environment::new(model);
    env.bind("state", state)?;
    env.declare("pointer", ComponentDeclaration::pointer(state, "default"))?;

    let config = RuntimeConfig::default().with_seed(1);
    let builder = Arc::new(ReferenceBuilder::new(config.clone())?);
    let session = Session::new(env, builder, config)?;
    let runtime = session.create_runtime()?;
    info!("Components: {:?}", runtime.components().iter().map(|c| c.uid().to_string()).collect::<Vec<_>>());

    runtime.deliver("pointer", "A")?;
    runtime.start()?;
    for target in ["A", "B", "0.5*A+0.5*C"] {
        runtime.deliver("pointer", target)?;
        thread::sleep(Duration::from_millis(200));
        let latest = runtime.drain("pointer")?.into_iter().rev().find_map(|sample| match sample {
            Sample::Text { text } => Some(text),
            _ => None,
        });
        println!("{:>12} -> {}", target, latest.unwrap_or_default());
    }
    runtime.stop()?;

    if let Some(error) = runtime.take_build_error() {
        println!("last build error: {}", error);
    }
    println!("{}", session.dumps());
    Ok(())
}
