use crate::core::config::check_identifier;
use crate::core::error::{Result, VizError};
use crate::core::model::ModelGraph;
use crate::core::session::declaration::ComponentDeclaration;
use crate::core::types::{ObjectId, Uid};

/// Name the root network is bound to unless the environment says otherwise
pub const ROOT_NAME: &str = "model";

/// The bound execution environment a session is created from
///
/// Holds the model plus every name the user gave to objects and every
/// component they declared, in declaration order.
pub struct Environment {
    model: ModelGraph,
    names: Vec<(Uid, ObjectId)>,
    declarations: Vec<(Uid, ComponentDeclaration)>,
}

impl Environment {
    pub fn new(model: ModelGraph) -> Self {
        Self {
            model,
            names: Vec::new(),
            declarations: Vec::new(),
        }
    }

    pub fn model(&self) -> &ModelGraph {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut ModelGraph {
        &mut self.model
    }

    fn check_free(&self, uid: &str) -> Result<()> {
        check_identifier(uid)?;
        let taken = self.names.iter().any(|(name, _)| name == uid)
            || self.declarations.iter().any(|(name, _)| name == uid);
        if taken {
            return Err(VizError::DuplicateIdentifier(uid.to_string()));
        }
        Ok(())
    }

    /// Bind a user-visible name to a model object
    pub fn bind(&mut self, uid: &str, id: ObjectId) -> Result<&mut Self> {
        self.check_free(uid)?;
        if self.model.object(id).is_none() {
            return Err(VizError::ObjectNotFound(id));
        }
        self.names.push((uid.to_string(), id));
        Ok(self)
    }

    /// Declare a component under `uid`
    pub fn declare(&mut self, uid: &str, declaration: ComponentDeclaration) -> Result<&mut Self> {
        self.check_free(uid)?;
        self.declarations.push((uid.to_string(), declaration));
        Ok(self)
    }

    pub fn names(&self) -> &[(Uid, ObjectId)] {
        &self.names
    }

    pub fn declarations(&self) -> &[(Uid, ComponentDeclaration)] {
        &self.declarations
    }

    pub(crate) fn into_parts(self) -> (ModelGraph, Vec<(Uid, ObjectId)>, Vec<(Uid, ComponentDeclaration)>) {
        (self.model, self.names, self.declarations)
    }
}
