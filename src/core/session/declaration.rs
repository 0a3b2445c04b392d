use crate::core::components::{
    ComponentKind, NetGraph, Pointer, Raster, SimControl, Slider, Value, VizComponent, XYValue,
};
use crate::core::config::{Constructor, ConfigValue};
use crate::core::error::{Result, VizError};
use crate::core::types::{ObjectId, Uid};
use std::sync::Arc;

/// Target name used by a pointer declared without one
pub const DEFAULT_SPA_TARGET: &str = "default";

/// A request to visualize something, independent of any running loop
///
/// Declarations are what the session persists; each runtime loop creates
/// fresh component instances from them.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentDeclaration {
    pub kind: ComponentKind,
    pub target: Option<ObjectId>,
    /// Named input/output pair of an SPA module, pointers only
    pub spa_target: Option<String>,
}

impl ComponentDeclaration {
    fn bound(kind: ComponentKind, target: ObjectId) -> Self {
        Self {
            kind,
            target: Some(target),
            spa_target: None,
        }
    }

    pub fn sim_control() -> Self {
        Self {
            kind: ComponentKind::SimControl,
            target: None,
            spa_target: None,
        }
    }

    pub fn net_graph() -> Self {
        Self {
            kind: ComponentKind::NetGraph,
            target: None,
            spa_target: None,
        }
    }

    pub fn slider(target: ObjectId) -> Self {
        Self::bound(ComponentKind::Slider, target)
    }

    pub fn value(target: ObjectId) -> Self {
        Self::bound(ComponentKind::Value, target)
    }

    pub fn xy_value(target: ObjectId) -> Self {
        Self::bound(ComponentKind::XYValue, target)
    }

    pub fn raster(target: ObjectId) -> Self {
        Self::bound(ComponentKind::Raster, target)
    }

    pub fn pointer(network: ObjectId, spa_target: &str) -> Self {
        Self {
            kind: ComponentKind::Pointer,
            target: Some(network),
            spa_target: Some(spa_target.to_string()),
        }
    }

    /// The call that recreates this declaration, naming objects by uid
    pub fn constructor(&self, uid_of: impl Fn(ObjectId) -> Option<Uid>) -> Result<Constructor> {
        let mut constructor = Constructor::new(self.kind.type_name());
        if let Some(target) = self.target {
            let uid = uid_of(target).ok_or(VizError::ObjectNotFound(target))?;
            constructor.args.push(uid);
        }
        if let Some(spa_target) = &self.spa_target {
            constructor
                .kwargs
                .push(("target".to_string(), ConfigValue::Str(spa_target.clone())));
        }
        Ok(constructor)
    }

    /// Source text of the constructor call, e.g. `Value(stim)`
    pub fn code(&self, uid_of: impl Fn(ObjectId) -> Option<Uid>) -> Result<String> {
        Ok(self.constructor(uid_of)?.to_string())
    }

    /// Resolve a parsed constructor call against bound object names
    pub fn from_constructor(
        constructor: &Constructor,
        lookup: impl Fn(&str) -> Option<ObjectId>,
    ) -> Result<Self> {
        let kind = ComponentKind::from_type_name(&constructor.kind)
            .ok_or_else(|| VizError::UnknownType(constructor.kind.clone()))?;

        let expected_args = usize::from(kind.has_target());
        if constructor.args.len() != expected_args {
            return Err(VizError::parse(
                0,
                format!(
                    "{} takes {} positional argument(s), got {}",
                    kind,
                    expected_args,
                    constructor.args.len()
                ),
            ));
        }
        let target = match constructor.args.first() {
            Some(name) => Some(lookup(name).ok_or_else(|| VizError::UnknownIdentifier(name.clone()))?),
            None => None,
        };

        let mut spa_target = None;
        for (key, value) in &constructor.kwargs {
            match (kind, key.as_str()) {
                (ComponentKind::Pointer, "target") => {
                    let name = value
                        .as_str()
                        .ok_or_else(|| VizError::parse(0, format!("pointer target must be a string, got {}", value)))?;
                    spa_target = Some(name.to_string());
                }
                _ => {
                    return Err(VizError::UnknownField {
                        type_name: kind.type_name().to_string(),
                        field: key.clone(),
                    })
                }
            }
        }
        if kind == ComponentKind::Pointer && spa_target.is_none() {
            spa_target = Some(DEFAULT_SPA_TARGET.to_string());
        }

        Ok(Self {
            kind,
            target,
            spa_target,
        })
    }

    fn target(&self) -> Result<ObjectId> {
        self.target
            .ok_or_else(|| VizError::RuntimeState(format!("{} declaration has no target", self.kind)))
    }

    /// Instantiate an unattached component
    pub fn create(&self, uid: &str) -> Result<Arc<dyn VizComponent>> {
        Ok(match self.kind {
            ComponentKind::SimControl => Arc::new(SimControl::new(uid)),
            ComponentKind::NetGraph => Arc::new(NetGraph::new(uid)),
            ComponentKind::Slider => Arc::new(Slider::new(uid, self.target()?)),
            ComponentKind::Value => Arc::new(Value::new(uid, self.target()?)),
            ComponentKind::XYValue => Arc::new(XYValue::new(uid, self.target()?)),
            ComponentKind::Raster => Arc::new(Raster::new(uid, self.target()?)),
            ComponentKind::Pointer => Arc::new(Pointer::new(
                uid,
                self.target()?,
                self.spa_target.as_deref().unwrap_or(DEFAULT_SPA_TARGET),
            )),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{parse_statement, Statement};

    fn names(id: ObjectId) -> Option<Uid> {
        (id == ObjectId(3)).then(|| "net.state".to_string())
    }

    fn lookup(name: &str) -> Option<ObjectId> {
        (name == "net.state").then_some(ObjectId(3))
    }

    #[test]
    fn test_code_for_each_shape() {
        assert_eq!(ComponentDeclaration::sim_control().code(names).unwrap(), "SimControl()");
        assert_eq!(ComponentDeclaration::value(ObjectId(3)).code(names).unwrap(), "Value(net.state)");
        assert_eq!(
            ComponentDeclaration::pointer(ObjectId(3), "default").code(names).unwrap(),
            "Pointer(net.state, target='default')"
        );
        assert!(ComponentDeclaration::value(ObjectId(4)).code(names).is_err());
    }

    #[test]
    fn test_code_reparses_to_same_declaration() {
        let declaration = ComponentDeclaration::pointer(ObjectId(3), "vision");
        let line = format!("p0 = {}", declaration.code(names).unwrap());
        let Statement::Declare { constructor, .. } = parse_statement(&line).unwrap() else {
            panic!("expected a declaration");
        };
        assert_eq!(ComponentDeclaration::from_constructor(&constructor, lookup).unwrap(), declaration);
    }

    #[test]
    fn test_from_constructor_errors() {
        let mut bad_kind = Constructor::new("Plot");
        bad_kind.args.push("net.state".to_string());
        assert!(matches!(
            ComponentDeclaration::from_constructor(&bad_kind, lookup),
            Err(VizError::UnknownType(_))
        ));

        let mut unknown_target = Constructor::new("Value");
        unknown_target.args.push("elsewhere".to_string());
        assert!(matches!(
            ComponentDeclaration::from_constructor(&unknown_target, lookup),
            Err(VizError::UnknownIdentifier(_))
        ));

        assert!(ComponentDeclaration::from_constructor(&Constructor::new("Value"), lookup).is_err());

        let mut stray = Constructor::new("Value");
        stray.args.push("net.state".to_string());
        stray.kwargs.push(("target".to_string(), ConfigValue::Str("x".to_string())));
        assert!(matches!(
            ComponentDeclaration::from_constructor(&stray, lookup),
            Err(VizError::UnknownField { .. })
        ));
    }

    #[test]
    fn test_pointer_target_defaults() {
        let mut constructor = Constructor::new("Pointer");
        constructor.args.push("net.state".to_string());
        let declaration = ComponentDeclaration::from_constructor(&constructor, lookup).unwrap();
        assert_eq!(declaration.spa_target.as_deref(), Some(DEFAULT_SPA_TARGET));
        assert_eq!(declaration.create("p0").unwrap().kind(), ComponentKind::Pointer);
    }
}
