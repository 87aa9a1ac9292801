//! Side-loaded resource accumulation for a single transform call.

use std::collections::HashSet;

use crate::document::Resource;

/// Tracks which resources have been queued for `included` and collects them
/// in discovery order.
///
/// A resource is marked before its own body is built, so a relationship
/// cycle back to it only yields an identifier instead of recursing again.
#[derive(Debug, Default)]
pub struct IncludeAccumulator {
    already_included: HashSet<(String, String)>,
    included: Vec<Resource>,
}

impl IncludeAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// True iff `(type, id)` was previously marked.
    pub fn exists(&self, type_: &str, id: &str) -> bool {
        self.already_included
            .contains(&(type_.to_string(), id.to_string()))
    }

    /// Mark `(type, id)` as queued for inclusion. Idempotent.
    pub fn mark_included(&mut self, type_: &str, id: &str) {
        self.already_included
            .insert((type_.to_string(), id.to_string()));
    }

    /// Append a resource. Callers check `exists` and mark first.
    pub fn append(&mut self, resource: Resource) {
        self.included.push(resource);
    }

    /// Resources collected so far, in discovery order.
    pub fn snapshot(&self) -> &[Resource] {
        &self.included
    }

    pub fn len(&self) -> usize {
        self.included.len()
    }

    pub fn is_empty(&self) -> bool {
        self.included.is_empty()
    }

    pub fn into_resources(self) -> Vec<Resource> {
        self.included
    }
}
