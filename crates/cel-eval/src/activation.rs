//! Variable bindings for evaluation.
//!
//! Bindings hold results, not just values: binding a name to an unknown is how
//! a host marks an input as unavailable for partial evaluation.

use std::collections::HashMap;

use crate::value::{CelResult, CelVal};

/// Resolves variable names during evaluation.
pub trait Activation: Send + Sync {
    /// `None` when the name is not bound here.
    fn resolve(&self, name: &str) -> Option<CelResult>;

    fn has(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }
}

/// An activation backed by a HashMap.
#[derive(Debug, Clone, Default)]
pub struct MapActivation {
    bindings: HashMap<String, CelResult>,
}

impl MapActivation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<CelVal>) {
        self.bindings.insert(name.into(), Ok(value.into()));
    }

    /// Bind a name to a result, which may be an error or an unknown.
    pub fn insert_result(&mut self, name: impl Into<String>, result: CelResult) {
        self.bindings.insert(name.into(), result);
    }

    pub fn remove(&mut self, name: &str) -> Option<CelResult> {
        self.bindings.remove(name)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }
}

impl FromIterator<(String, CelResult)> for MapActivation {
    fn from_iter<I: IntoIterator<Item = (String, CelResult)>>(iter: I) -> Self {
        Self {
            bindings: iter.into_iter().collect(),
        }
    }
}

impl Activation for MapActivation {
    fn resolve(&self, name: &str) -> Option<CelResult> {
        self.bindings.get(name).cloned()
    }

    fn has(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }
}

/// Local bindings layered over a parent; locals shadow the parent.
pub struct HierarchicalActivation<'a> {
    parent: &'a dyn Activation,
    local: MapActivation,
}

impl<'a> HierarchicalActivation<'a> {
    pub fn new(parent: &'a dyn Activation) -> Self {
        Self {
            parent,
            local: MapActivation::new(),
        }
    }

    pub fn with_binding(mut self, name: impl Into<String>, value: impl Into<CelVal>) -> Self {
        self.local.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<CelVal>) {
        self.local.insert(name, value);
    }

    pub fn insert_result(&mut self, name: impl Into<String>, result: CelResult) {
        self.local.insert_result(name, result);
    }
}

impl Activation for HierarchicalActivation<'_> {
    fn resolve(&self, name: &str) -> Option<CelResult> {
        self.local.resolve(name).or_else(|| self.parent.resolve(name))
    }

    fn has(&self, name: &str) -> bool {
        self.local.has(name) || self.parent.has(name)
    }
}

/// No bindings at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyActivation;

impl Activation for EmptyActivation {
    fn resolve(&self, _name: &str) -> Option<CelResult> {
        None
    }
}

impl<T: Activation + ?Sized> Activation for &T {
    fn resolve(&self, name: &str) -> Option<CelResult> {
        (**self).resolve(name)
    }

    fn has(&self, name: &str) -> bool {
        (**self).has(name)
    }
}
