use crate::core::components::VizComponent;
use crate::core::error::{Result, VizError};
use std::sync::Arc;

/// Ordered set of live components owned by one runtime loop
///
/// Privileged components (simulation control, network graph) are always
/// inserted at the front; everything else appends in arrival order.
#[derive(Default)]
pub struct ComponentRegistry {
    components: Vec<Arc<dyn VizComponent>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component; uids must be unique
    pub fn register(&mut self, component: Arc<dyn VizComponent>) -> Result<()> {
        if self.contains(component.uid()) {
            return Err(VizError::DuplicateIdentifier(component.uid().to_string()));
        }
        if component.kind().is_privileged() {
            self.components.insert(0, component);
        } else {
            self.components.push(component);
        }
        Ok(())
    }

    pub fn get(&self, uid: &str) -> Option<&Arc<dyn VizComponent>> {
        self.components.iter().find(|c| c.uid() == uid)
    }

    pub fn contains(&self, uid: &str) -> bool {
        self.get(uid).is_some()
    }

    /// Remove a component by uid
    pub fn remove(&mut self, uid: &str) -> Option<Arc<dyn VizComponent>> {
        let index = self.components.iter().position(|c| c.uid() == uid)?;
        Some(self.components.remove(index))
    }

    /// All components in build order
    pub fn components(&self) -> &[Arc<dyn VizComponent>] {
        &self.components
    }

    /// Owned copy of the build order, so callers can release the registry lock
    pub fn snapshot(&self) -> Vec<Arc<dyn VizComponent>> {
        self.components.clone()
    }
}
