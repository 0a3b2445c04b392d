use crate::core::components::{AttachContext, VizComponent};
use crate::core::config::{
    check_identifier, declare_viz_schemas, lock_config, ConfigHandle, ConfigStore, ConfigValue, Constructor,
    LoadReport, Namespace, SharedConfig, Statement,
};
use crate::core::error::{Result, VizError};
use crate::core::execution::{RuntimeConfig, SimulatorBuilder};
use crate::core::model::{lock_model, SharedModel};
use crate::core::runtime::{LoopControl, RuntimeLoop};
use crate::core::session::declaration::ComponentDeclaration;
use crate::core::session::environment::{Environment, ROOT_NAME};
use crate::core::types::{ObjectId, Uid};
use log::{debug, error, info, warn};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Uid of the control panel created when none is declared
pub const DEFAULT_SIM_CONTROL: &str = "_viz_sim_control";
/// Uid of the graph view created when none is declared
pub const DEFAULT_NET_GRAPH: &str = "_viz_net_graph";
/// Prefix of uids generated for client-created components
pub const COMPONENT_PREFIX: &str = "_viz_";

#[derive(Debug, Clone)]
enum Binding {
    Object(ObjectId),
    Component(ComponentDeclaration),
}

#[derive(Debug)]
struct Entry {
    seq: u64,
    binding: Binding,
}

/// Every identifier the session knows, with its creation order
#[derive(Default)]
struct Bindings {
    entries: HashMap<Uid, Entry>,
    objects: BTreeMap<ObjectId, Uid>,
    prefix_counters: HashMap<String, usize>,
    next_seq: u64,
}

impl Bindings {
    fn contains(&self, uid: &str) -> bool {
        self.entries.contains_key(uid)
    }

    fn insert(&mut self, uid: &str, binding: Binding) -> Result<()> {
        if self.contains(uid) {
            return Err(VizError::DuplicateIdentifier(uid.to_string()));
        }
        if let Binding::Object(id) = binding {
            self.objects.entry(id).or_insert_with(|| uid.to_string());
        }
        self.entries.insert(
            uid.to_string(),
            Entry {
                seq: self.next_seq,
                binding,
            },
        );
        self.next_seq += 1;
        Ok(())
    }

    fn remove(&mut self, uid: &str) -> Option<Binding> {
        let entry = self.entries.remove(uid)?;
        if let Binding::Object(id) = entry.binding {
            if self.objects.get(&id).map(String::as_str) == Some(uid) {
                self.objects.remove(&id);
            }
        }
        Some(entry.binding)
    }

    /// First free `<prefix><n>`, resuming from the last index handed out for this prefix
    fn next_uid(&mut self, prefix: &str) -> Uid {
        let mut index = self.prefix_counters.get(prefix).copied().unwrap_or(0);
        let mut uid = format!("{}{}", prefix, index);
        while self.contains(&uid) {
            index += 1;
            uid = format!("{}{}", prefix, index);
        }
        self.prefix_counters.insert(prefix.to_string(), index + 1);
        uid
    }

    fn seq(&self, uid: &str) -> u64 {
        self.entries.get(uid).map_or(u64::MAX, |e| e.seq)
    }

    fn object(&self, uid: &str) -> Option<ObjectId> {
        match self.entries.get(uid)?.binding {
            Binding::Object(id) => Some(id),
            Binding::Component(_) => None,
        }
    }

    fn uid_of(&self, id: ObjectId) -> Option<Uid> {
        self.objects.get(&id).cloned()
    }

    fn declaration(&self, uid: &str) -> Option<&ComponentDeclaration> {
        match &self.entries.get(uid)?.binding {
            Binding::Component(declaration) => Some(declaration),
            Binding::Object(_) => None,
        }
    }

    fn declarations(&self) -> Vec<(Uid, ComponentDeclaration)> {
        let mut found: Vec<(u64, &Uid, &ComponentDeclaration)> = self
            .entries
            .iter()
            .filter_map(|(uid, entry)| match &entry.binding {
                Binding::Component(declaration) => Some((entry.seq, uid, declaration)),
                Binding::Object(_) => None,
            })
            .collect();
        found.sort_by_key(|(seq, _, _)| *seq);
        found
            .into_iter()
            .map(|(_, uid, declaration)| (uid.clone(), declaration.clone()))
            .collect()
    }
}

impl Namespace for Bindings {
    fn declare(&mut self, uid: &str, constructor: &Constructor) -> Result<String> {
        let declaration = ComponentDeclaration::from_constructor(constructor, |name| self.object(name))?;
        let type_name = declaration.kind.type_name().to_string();
        if let Some(entry) = self.entries.get_mut(uid) {
            match &mut entry.binding {
                Binding::Component(existing) if existing.kind == declaration.kind => *existing = declaration,
                _ => return Err(VizError::DuplicateIdentifier(uid.to_string())),
            }
        } else {
            self.insert(uid, Binding::Component(declaration))?;
        }
        Ok(type_name)
    }
}

/// Per-model organizer of names, persisted config and component declarations
///
/// A session owns the model shared by every runtime loop it creates. Loops
/// created from one session share a build lock so only one of them mutates
/// the model at a time.
pub struct Session {
    id: Uuid,
    filename: Option<PathBuf>,
    model: SharedModel,
    build_lock: Arc<Mutex<()>>,
    config: SharedConfig,
    bindings: Bindings,
    builder: Arc<dyn SimulatorBuilder>,
    runtime_config: RuntimeConfig,
}

impl Session {
    /// Bind an environment without a config file
    pub fn new(env: Environment, builder: Arc<dyn SimulatorBuilder>, runtime_config: RuntimeConfig) -> Result<Self> {
        let mut session = Self::bind(env, builder, runtime_config, None)?;
        session.ensure_defaults()?;
        Ok(session)
    }

    /// Bind an environment loaded from `filename`, then apply `<filename>.cfg` if it exists
    pub fn from_file(
        filename: impl AsRef<Path>,
        env: Environment,
        builder: Arc<dyn SimulatorBuilder>,
        runtime_config: RuntimeConfig,
    ) -> Result<Self> {
        let mut session = Self::bind(env, builder, runtime_config, Some(filename.as_ref().to_path_buf()))?;
        let report = session.load_config()?;
        if !report.is_clean() {
            warn!(
                "Session {}: {} config line(s) could not be applied",
                session.id,
                report.errors.len()
            );
        }
        Ok(session)
    }

    fn bind(
        env: Environment,
        builder: Arc<dyn SimulatorBuilder>,
        runtime_config: RuntimeConfig,
        filename: Option<PathBuf>,
    ) -> Result<Self> {
        let (model, names, declarations) = env.into_parts();
        let mut bindings = Bindings::default();

        let root = model.root();
        let root_named = names.iter().any(|(_, id)| *id == root);
        let root_name_taken = names.iter().any(|(uid, _)| uid == ROOT_NAME)
            || declarations.iter().any(|(uid, _)| uid == ROOT_NAME);
        if !root_named && !root_name_taken {
            bindings.insert(ROOT_NAME, Binding::Object(root))?;
        }
        for (uid, id) in names {
            bindings.insert(&uid, Binding::Object(id))?;
        }
        for (uid, declaration) in declarations {
            bindings.insert(&uid, Binding::Component(declaration))?;
        }
        for object in model.objects() {
            if !bindings.objects.contains_key(&object.id) {
                let uid = bindings.next_uid(object.kind_name().uid_prefix());
                bindings.insert(&uid, Binding::Object(object.id))?;
            }
        }

        let mut store = ConfigStore::new();
        declare_viz_schemas(&mut store);
        for object in model.objects() {
            if let Some(uid) = bindings.objects.get(&object.id) {
                store.register(uid, object.kind_name().as_str())?;
            }
        }
        for (uid, declaration) in bindings.declarations() {
            store.register(&uid, declaration.kind.type_name())?;
        }

        let id = Uuid::new_v4();
        info!(
            "Session {} bound {} object(s) and {} component declaration(s)",
            id,
            bindings.objects.len(),
            bindings.declarations().len()
        );
        Ok(Self {
            id,
            filename,
            model: Arc::new(Mutex::new(model)),
            build_lock: Arc::new(Mutex::new(())),
            config: Arc::new(Mutex::new(store)),
            bindings,
            builder,
            runtime_config,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn model(&self) -> &SharedModel {
        &self.model
    }

    pub fn config(&self) -> &SharedConfig {
        &self.config
    }

    pub fn runtime_config(&self) -> &RuntimeConfig {
        &self.runtime_config
    }

    pub fn filename(&self) -> Option<&Path> {
        self.filename.as_deref()
    }

    /// `<filename>.cfg`, if the session came from a file
    pub fn config_path(&self) -> Option<PathBuf> {
        self.filename.as_ref().map(|filename| {
            let mut path = filename.as_os_str().to_owned();
            path.push(".cfg");
            PathBuf::from(path)
        })
    }

    fn bind_declaration(&mut self, uid: &str, declaration: ComponentDeclaration) -> Result<()> {
        let type_name = declaration.kind.type_name();
        self.bindings.insert(uid, Binding::Component(declaration))?;
        if let Err(e) = lock_config(&self.config).register(uid, type_name) {
            self.bindings.remove(uid);
            return Err(e);
        }
        Ok(())
    }

    /// Declare the privileged components and root layout the client always needs
    fn ensure_defaults(&mut self) -> Result<()> {
        let declared = self.bindings.declarations();
        for (uid, declaration) in [
            (DEFAULT_SIM_CONTROL, ComponentDeclaration::sim_control()),
            (DEFAULT_NET_GRAPH, ComponentDeclaration::net_graph()),
        ] {
            let present = declared.iter().any(|(_, d)| d.kind == declaration.kind);
            if !present && !self.bindings.contains(uid) {
                debug!("Session {}: adding default {}", self.id, declaration.kind);
                self.bind_declaration(uid, declaration)?;
            }
        }

        let root = lock_model(&self.model).root();
        if let Some(root_uid) = self.bindings.uid_of(root) {
            let mut store = lock_config(&self.config);
            if store.get(&root_uid, "pos")?.is_none() {
                store.set(&root_uid, "pos", ConfigValue::pair(0.0, 0.0))?;
            }
            if store.get(&root_uid, "size")?.is_none() {
                store.set(&root_uid, "size", ConfigValue::pair(1.0, 1.0))?;
            }
        }
        Ok(())
    }

    /// Apply `<filename>.cfg`; a missing file is an empty config
    pub fn load_config(&mut self) -> Result<LoadReport> {
        let path = self
            .config_path()
            .ok_or_else(|| VizError::RuntimeState("session has no file to load config from".to_string()))?;
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No config at {}", path.display());
                String::new()
            }
            Err(e) => return Err(e.into()),
        };
        self.load_config_text(&text)
    }

    /// Apply config statements line by line, then fill in defaults
    pub fn load_config_text(&mut self, text: &str) -> Result<LoadReport> {
        let report = lock_config(&self.config).load(text, &mut self.bindings);
        self.ensure_defaults()?;
        Ok(report)
    }

    /// Serialize the config store, declarations first, in creation order
    pub fn dumps(&self) -> String {
        let store = lock_config(&self.config);
        let bindings = &self.bindings;
        store.dump_with(
            |uid| bindings.seq(uid),
            |uid| {
                let declaration = bindings.declaration(uid)?;
                match declaration.constructor(|id| bindings.uid_of(id)) {
                    Ok(constructor) => Some(Statement::Declare {
                        uid: uid.to_string(),
                        constructor,
                    }),
                    Err(e) => {
                        warn!("Cannot persist declaration of '{}': {}", uid, e);
                        None
                    }
                }
            },
        )
    }

    /// Write `<filename>.cfg`
    pub fn save_config(&self) -> Result<()> {
        let path = self
            .config_path()
            .ok_or_else(|| VizError::RuntimeState("session has no file to save config to".to_string()))?;
        let mut text = self.dumps();
        text.push('\n');
        fs::write(&path, text)?;
        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Reserve a fresh `<prefix><n>` identifier
    pub fn generate_uid(&mut self, prefix: &str) -> Result<Uid> {
        check_identifier(prefix)?;
        Ok(self.bindings.next_uid(prefix))
    }

    pub fn get_uid(&self, id: ObjectId) -> Option<Uid> {
        self.bindings.uid_of(id)
    }

    pub fn lookup(&self, uid: &str) -> Option<ObjectId> {
        self.bindings.object(uid)
    }

    /// Object label, else its uid, else a kind-based description
    pub fn get_label(&self, id: ObjectId) -> String {
        let model = lock_model(&self.model);
        if let Some(label) = model.object(id).and_then(|o| o.label.clone()) {
            return label;
        }
        match self.bindings.uid_of(id) {
            Some(uid) => uid,
            None => model.describe(id),
        }
    }

    /// Unbind an identifier and drop its config
    pub fn remove_uid(&mut self, uid: &str) -> Result<()> {
        self.bindings
            .remove(uid)
            .ok_or_else(|| VizError::UnknownIdentifier(uid.to_string()))?;
        lock_config(&self.config).unregister(uid);
        Ok(())
    }

    pub fn declaration(&self, uid: &str) -> Option<&ComponentDeclaration> {
        self.bindings.declaration(uid)
    }

    /// Component declarations in creation order
    pub fn declarations(&self) -> Vec<(Uid, ComponentDeclaration)> {
        self.bindings.declarations()
    }

    /// Statement that recreates the component declared as `uid`
    pub fn declaration_code(&self, uid: &str) -> Result<String> {
        let declaration = self
            .bindings
            .declaration(uid)
            .ok_or_else(|| VizError::UnknownIdentifier(uid.to_string()))?;
        Ok(format!("{} = {}", uid, declaration.code(|id| self.bindings.uid_of(id))?))
    }

    /// Create and attach a component; the model lock is released before returning
    fn instantiate(
        &self,
        uid: &str,
        declaration: &ComponentDeclaration,
        control: LoopControl,
    ) -> Result<Arc<dyn VizComponent>> {
        let component = declaration.create(uid)?;
        let model = lock_model(&self.model);
        let ctx = AttachContext {
            model: &model,
            names: &self.bindings.objects,
            config: ConfigHandle::new(Arc::clone(&self.config), uid),
            control,
        };
        component.attach(&ctx)?;
        Ok(component)
    }

    /// A fresh runtime loop holding one instance of every declared component
    ///
    /// Declarations that fail to attach are logged and left out.
    pub fn create_runtime(&self) -> Result<RuntimeLoop> {
        let short_id = self.id.simple().to_string();
        let runtime = RuntimeLoop::with_build_lock(
            Arc::clone(&self.model),
            Arc::clone(&self.builder),
            &self.runtime_config,
            Arc::clone(&self.build_lock),
        )
        .with_name(&short_id[..8]);

        for (uid, declaration) in self.declarations() {
            match self.instantiate(&uid, &declaration, runtime.control()) {
                Ok(component) => runtime.register(component)?,
                Err(e) => error!("Skipping component '{}': {}", uid, e),
            }
        }
        info!(
            "Session {}: runtime '{}' created with {} component(s)",
            self.id,
            runtime.name(),
            runtime.components().len()
        );
        Ok(runtime)
    }

    /// Declare a component on behalf of a client and add it to `runtime`
    pub fn add_component(&mut self, runtime: &RuntimeLoop, declaration: ComponentDeclaration) -> Result<Uid> {
        let uid = self.generate_uid(COMPONENT_PREFIX)?;
        self.bind_declaration(&uid, declaration.clone())?;
        let added = self
            .instantiate(&uid, &declaration, runtime.control())
            .and_then(|component| runtime.add_component(component));
        if let Err(e) = added {
            self.bindings.remove(&uid);
            lock_config(&self.config).unregister(&uid);
            return Err(e);
        }
        Ok(uid)
    }

    /// Remove a component from `runtime` and forget its declaration
    pub fn remove_component(&mut self, runtime: &RuntimeLoop, uid: &str) -> Result<()> {
        runtime.remove_component(uid)?;
        self.remove_uid(uid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::components::ComponentKind;
    use crate::core::execution::ReferenceBuilder;
    use crate::core::model::{ModelGraph, NodeSpec};

    fn session_with(env: Environment) -> Session {
        let config = RuntimeConfig::default();
        let builder = Arc::new(ReferenceBuilder::new(config.clone()).unwrap());
        Session::new(env, builder, config).unwrap()
    }

    fn stim_env() -> (Environment, ObjectId) {
        let mut model = ModelGraph::new();
        let stim = model.add_node(model.root(), None, NodeSpec::constant(vec![0.5])).unwrap();
        let mut env = Environment::new(model);
        env.bind("stim", stim).unwrap();
        (env, stim)
    }

    #[test]
    fn test_defaults_are_added() {
        let (env, _) = stim_env();
        let session = session_with(env);
        let kinds: Vec<ComponentKind> = session.declarations().into_iter().map(|(_, d)| d.kind).collect();
        assert_eq!(kinds, vec![ComponentKind::SimControl, ComponentKind::NetGraph]);
        assert!(session.declaration(DEFAULT_SIM_CONTROL).is_some());

        let store = lock_config(session.config());
        assert_eq!(store.get(ROOT_NAME, "pos").unwrap(), ConfigValue::pair(0.0, 0.0));
        assert_eq!(store.get(ROOT_NAME, "size").unwrap(), ConfigValue::pair(1.0, 1.0));
    }

    #[test]
    fn test_declared_sim_control_suppresses_default() {
        let (mut env, _) = stim_env();
        env.declare("sim", ComponentDeclaration::sim_control()).unwrap();
        let session = session_with(env);
        assert!(session.declaration(DEFAULT_SIM_CONTROL).is_none());
        assert!(session.declaration(DEFAULT_NET_GRAPH).is_some());
    }

    #[test]
    fn test_generate_uid_skips_collisions() {
        let mut model = ModelGraph::new();
        let node = model.add_node(model.root(), None, NodeSpec::constant(vec![0.5])).unwrap();
        let mut env = Environment::new(model);
        env.bind("node0", node).unwrap();
        let mut session = session_with(env);

        assert_eq!(session.generate_uid("node").unwrap(), "node1");
        assert_eq!(session.generate_uid("node").unwrap(), "node2");
        assert_eq!(session.generate_uid("ensemble").unwrap(), "ensemble0");
        assert!(matches!(session.generate_uid("my-node"), Err(VizError::InvalidIdentifier(_))));
        assert!(matches!(session.generate_uid(""), Err(VizError::InvalidIdentifier(_))));
    }

    #[test]
    fn test_unnamed_objects_get_generated_uids() {
        let mut model = ModelGraph::new();
        let root = model.root();
        let a = model.add_node(root, None, NodeSpec::constant(vec![0.5])).unwrap();
        let b = model.add_node(root, Some("labelled"), NodeSpec::constant(vec![0.5])).unwrap();
        let session = session_with(Environment::new(model));

        assert_eq!(session.get_uid(root).as_deref(), Some(ROOT_NAME));
        assert_eq!(session.get_uid(a).as_deref(), Some("node0"));
        assert_eq!(session.get_uid(b).as_deref(), Some("node1"));
        assert_eq!(session.get_label(a), "node0");
        assert_eq!(session.get_label(b), "labelled");
        assert_eq!(session.lookup("node1"), Some(b));
    }

    #[test]
    fn test_declaration_code_and_dump() {
        let (mut env, stim) = stim_env();
        env.declare("plot", ComponentDeclaration::value(stim)).unwrap();
        let session = session_with(env);
        assert_eq!(session.declaration_code("plot").unwrap(), "plot = Value(stim)");

        let dump = session.dumps();
        let plot_line = dump.lines().position(|l| l == "plot = Value(stim)").unwrap();
        let plot_field = dump.lines().position(|l| l.starts_with("config[plot].")).unwrap();
        let root_line = dump.lines().position(|l| l.starts_with("config[model].")).unwrap();
        assert!(root_line < plot_line);
        assert!(plot_line < plot_field);
    }

    #[test]
    fn test_load_rebinds_declarations_and_skips_bad_lines() {
        let (env, _) = stim_env();
        let mut session = session_with(env);
        let report = session
            .load_config_text("plot = Value(stim)\nconfig[plot].x = 40\nconfig[ghost].x = 1\nwhat is this\n")
            .unwrap();
        assert_eq!(report.applied, 2);
        assert_eq!(report.errors.len(), 2);
        assert_eq!(report.errors[0].line, 3);
        assert_eq!(session.declaration("plot").map(|d| d.kind), Some(ComponentKind::Value));
        assert_eq!(lock_config(session.config()).get("plot", "x").unwrap(), ConfigValue::Number(40.0));

        let clash = session.load_config_text("stim = Value(stim)").unwrap();
        assert!(matches!(clash.errors[0].error, VizError::DuplicateIdentifier(_)));
    }

    #[test]
    fn test_create_runtime_and_client_components() {
        let (env, stim) = stim_env();
        let mut session = session_with(env);
        let runtime = session.create_runtime().unwrap();
        assert_eq!(runtime.components().len(), 2);

        let uid = session.add_component(&runtime, ComponentDeclaration::value(stim)).unwrap();
        assert_eq!(uid, "_viz_0");
        assert!(runtime.component(&uid).is_some());
        assert!(lock_config(session.config()).contains(&uid));

        runtime.build().unwrap();
        runtime.step().unwrap();
        assert!(!runtime.drain(&uid).unwrap().is_empty());

        session.remove_component(&runtime, &uid).unwrap();
        assert!(runtime.component(&uid).is_none());
        assert!(session.declaration(&uid).is_none());
        assert!(!lock_config(session.config()).contains(&uid));
        assert!(matches!(session.remove_uid(&uid), Err(VizError::UnknownIdentifier(_))));
    }

    #[test]
    fn test_failed_client_component_leaves_no_binding() {
        let (env, _) = stim_env();
        let mut session = session_with(env);
        let runtime = session.create_runtime().unwrap();
        let root = lock_model(session.model()).root();
        // the root is a network, which has no neurons
        assert!(session.add_component(&runtime, ComponentDeclaration::raster(root)).is_err());
        assert_eq!(session.declarations().len(), 2);
        assert_eq!(runtime.components().len(), 2);
    }
}
