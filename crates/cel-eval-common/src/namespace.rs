//! Container-relative name resolution.

use std::collections::HashMap;

/// The container (package) an expression is evaluated in, plus import aliases.
///
/// A name `x` referenced inside container `a.b` may denote `a.b.x`, `a.x` or
/// `x`; candidates are produced from most to least qualified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Namespace {
    name: String,
    aliases: HashMap<String, String>,
}

impl Namespace {
    /// The root namespace.
    pub fn root() -> Self {
        Self::default()
    }

    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            aliases: HashMap::new(),
        }
    }

    /// Map the simple name `alias` to a fully qualified name.
    pub fn with_alias(mut self, alias: impl Into<String>, qualified: impl Into<String>) -> Self {
        self.aliases.insert(alias.into(), qualified.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn aliases(&self) -> &HashMap<String, String> {
        &self.aliases
    }

    /// Candidate fully qualified names for `name`, most qualified first.
    ///
    /// A leading `.` makes the name absolute.
    pub fn resolve_candidate_names(&self, name: &str) -> Vec<String> {
        if let Some(qualified) = name.strip_prefix('.') {
            return vec![self.find_alias(qualified).unwrap_or_else(|| qualified.to_string())];
        }
        if let Some(alias) = self.find_alias(name) {
            return vec![alias];
        }
        if self.name.is_empty() {
            return vec![name.to_string()];
        }
        let mut candidates = vec![format!("{}.{}", self.name, name)];
        let mut container = self.name.as_str();
        while let Some(dot) = container.rfind('.') {
            container = &container[..dot];
            candidates.push(format!("{}.{}", container, name));
        }
        candidates.push(name.to_string());
        candidates
    }

    /// Expand an alias on the first segment of `name`.
    pub fn find_alias(&self, name: &str) -> Option<String> {
        let (simple, qualifier) = match name.find('.') {
            Some(dot) => (&name[..dot], &name[dot..]),
            None => (name, ""),
        };
        self.aliases
            .get(simple)
            .map(|alias| format!("{}{}", alias, qualifier))
    }
}
