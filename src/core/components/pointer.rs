use crate::core::components::base::ComponentBase;
use crate::core::components::traits::{AttachContext, VizComponent};
use crate::core::components::types::{ComponentKind, Sample};
use crate::core::error::{Result, VizError};
use crate::core::model::{ConnectionSpec, ModelGraphAdapter, NodeOutput, NodeSpec, SpaTarget};
use crate::core::spa::{dot, mat_vec, read_vocab, write_vocab, Vocabulary};
use crate::core::types::ObjectId;
use log::debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

/// Similarities at or below this are not reported
pub const SIMILARITY_THRESHOLD: f64 = 0.01;
/// Gain pulling the module's state toward an override target
pub const OVERRIDE_GAIN: f64 = 3.0;
/// Synapse on both connections between the module and the inspector node
const POINTER_SYNAPSE: f64 = 0.01;

const EMPTY_MESSAGE: &str = ":empty:";
const CHECK_ONLY_PREFIX: &str = ":check only:";
pub const GOOD_POINTER: &str = "good_pointer";
pub const BAD_POINTER: &str = "bad_pointer";

/// Semantic pointer inspector for one target of an SPA module
///
/// Every step reports the vocabulary keys the module's output resembles.
/// A client may set an override expression; the inspector then drives the
/// module's input toward it.
pub struct Pointer {
    base: ComponentBase,
    network: ObjectId,
    target: String,
    binding: OnceLock<SpaTarget>,
    show_pairs: AtomicBool,
    override_target: Mutex<Option<Vec<f64>>>,
}

impl Pointer {
    pub fn new(uid: &str, network: ObjectId, target: &str) -> Self {
        Self {
            base: ComponentBase::new(uid),
            network,
            target: target.to_string(),
            binding: OnceLock::new(),
            show_pairs: AtomicBool::new(false),
            override_target: Mutex::new(None),
        }
    }

    pub fn target_name(&self) -> &str {
        &self.target
    }

    fn override_target(&self) -> MutexGuard<'_, Option<Vec<f64>>> {
        self.override_target.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn binding(&self) -> Result<&SpaTarget> {
        self.binding
            .get()
            .ok_or_else(|| VizError::RuntimeState(format!("pointer {} is not attached", self.uid())))
    }

    fn drive(&self, binding: &SpaTarget, x: &[f64]) -> Vec<f64> {
        let target = self.override_target().clone();
        let Some(target) = target else {
            return vec![0.0; read_vocab(&binding.input_vocab).dimensions()];
        };
        let pull: Vec<f64> = target
            .iter()
            .zip(x)
            .map(|(goal, current)| (goal - current) * OVERRIDE_GAIN)
            .collect();
        if Arc::ptr_eq(&binding.output_vocab, &binding.input_vocab) {
            return pull;
        }
        let matrix = read_vocab(&binding.output_vocab).transform_to(&read_vocab(&binding.input_vocab));
        mat_vec(&matrix, &pull)
    }

    fn check(&self, binding: &SpaTarget, candidate: &str) -> &'static str {
        if candidate.is_empty() {
            return GOOD_POINTER;
        }
        let mut scratch = read_vocab(&binding.output_vocab).clone();
        match scratch.parse(candidate) {
            Ok(_) => GOOD_POINTER,
            Err(_) => BAD_POINTER,
        }
    }
}

/// `"<score><key>;..."` for every reference vector more similar to `x` than the threshold
pub fn similarity_text(vocab: &Vocabulary, x: &[f64], include_pairs: bool) -> String {
    let mut matches: Vec<(f64, String)> = vocab
        .keys()
        .iter()
        .zip(vocab.vectors())
        .map(|(key, v)| (dot(v, x), key.clone()))
        .filter(|(score, _)| *score > SIMILARITY_THRESHOLD)
        .collect();
    if include_pairs {
        matches.extend(
            vocab
                .pairs()
                .into_iter()
                .map(|(key, v)| (dot(&v, x), key))
                .filter(|(score, _)| *score > SIMILARITY_THRESHOLD),
        );
    }
    matches
        .iter()
        .map(|(score, key)| format!("{:.2}{}", score, key))
        .collect::<Vec<_>>()
        .join(";")
}

/// Shortest of fixed or exponent notation with six significant digits
pub fn format_g(x: f64) -> String {
    if x == 0.0 {
        return "0".to_string();
    }
    if !x.is_finite() {
        return x.to_string();
    }
    let sci = format!("{:.5e}", x);
    let (mantissa, exponent) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };
    if !(-4..6).contains(&exponent) {
        let sign = if exponent < 0 { '-' } else { '+' };
        return format!("{}e{}{:02}", trim_fraction(mantissa), sign, exponent.abs());
    }
    let decimals = (5 - exponent) as usize;
    trim_fraction(&format!("{:.*}", decimals, x)).to_string()
}

fn trim_fraction(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}

impl VizComponent for Pointer {
    fn uid(&self) -> &str {
        self.base.uid()
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Pointer
    }

    fn attach(&self, ctx: &AttachContext<'_>) -> Result<()> {
        let binding = ctx.model.spa_target(self.network, &self.target).cloned().ok_or_else(|| {
            VizError::UnknownIdentifier(format!("{} has no target '{}'", ctx.label_of(self.network), self.target))
        })?;
        let _ = self.binding.set(binding);
        self.show_pairs
            .store(ctx.config.get_bool("show_pairs", false), Ordering::Relaxed);
        self.base.attach(ctx.label_of(self.network), ctx.config.clone())
    }

    fn label(&self) -> String {
        self.base.label()
    }

    fn add_graph_objects(self: Arc<Self>, model: &mut dyn ModelGraphAdapter) -> Result<()> {
        let binding = self.binding()?.clone();
        let size_in = read_vocab(&binding.output_vocab).dimensions();
        let size_out = read_vocab(&binding.input_vocab).dimensions();
        let label = format!("{}.pointer", self.uid());
        let component = Arc::clone(&self);
        self.base.graph().attach(model, move |handles, model| {
            let output = NodeOutput::function(size_out, move |t, x| component.on_step(t, x));
            let node = handles.add_node(model, Some(label.as_str()), NodeSpec::new(size_in, output))?;
            handles.connect(
                model,
                ConnectionSpec::new(binding.output.value(), node.value()).with_synapse(POINTER_SYNAPSE),
            )?;
            handles.connect(
                model,
                ConnectionSpec::new(node.value(), binding.input.value()).with_synapse(POINTER_SYNAPSE),
            )?;
            Ok(())
        })
    }

    fn remove_graph_objects(&self, model: &mut dyn ModelGraphAdapter) -> Result<()> {
        self.base.graph().detach(model)
    }

    fn has_graph_objects(&self) -> bool {
        self.base.graph().is_attached()
    }

    fn on_step(&self, t: f64, values: &[f64]) -> Vec<f64> {
        let Ok(binding) = self.binding() else {
            return Vec::new();
        };
        let text = similarity_text(
            &read_vocab(&binding.output_vocab),
            values,
            self.show_pairs.load(Ordering::Relaxed),
        );
        self.base.push(Sample::Text {
            text: format!("{} {}", format_g(t), text),
        });
        self.drive(binding, values)
    }

    fn drain_for_client(&self) -> Vec<Sample> {
        self.base.drain()
    }

    /// `:empty:` clears the override, `:check only:<expr>` validates an
    /// expression without applying it, anything else becomes the override
    fn on_message(&self, raw: &str) {
        let Ok(binding) = self.binding() else {
            *self.override_target() = None;
            return;
        };
        if raw == EMPTY_MESSAGE {
            *self.override_target() = None;
        } else if let Some(candidate) = raw.strip_prefix(CHECK_ONLY_PREFIX) {
            self.base.push(Sample::Text {
                text: self.check(binding, candidate).to_string(),
            });
        } else {
            let parsed = write_vocab(&binding.output_vocab).parse(raw);
            *self.override_target() = match parsed {
                Ok(v) => Some(v),
                Err(e) => {
                    debug!("Pointer {} cleared override after bad expression {:?}: {}", self.uid(), raw, e);
                    None
                }
            };
        }
    }

    fn client_spec(&self) -> serde_json::Value {
        let mut spec = self.base.layout_spec("Pointer");
        spec["target"] = self.target.clone().into();
        spec["show_pairs"] = self.show_pairs.load(Ordering::Relaxed).into();
        spec
    }
}
