//! Abstract name resolution for module globals and lexical closures.
//!
//! A [`Namespace`] is embedded directly as a [`crate::node::ConstValue::Namespace`]
//! wherever the parser needs to synthesize a `resolve(namespace, name)` call, so it
//! must carry a stable, hashable, serializable identity rather than a live
//! reference to host-language state.

use serde::{Deserialize, Serialize};

/// A function identity stable enough to key a closure namespace.
pub type FunctionId = String;

/// Where a non-local name should be looked up.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Namespace {
    /// Resolves names against a module's globals.
    Module(String),
    /// Resolves names against the lexical environment of an enclosing function.
    Closure(FunctionId),
}

impl Namespace {
    pub fn module(name: impl Into<String>) -> Self {
        Namespace::Module(name.into())
    }

    pub fn closure(function: impl Into<FunctionId>) -> Self {
        Namespace::Closure(function.into())
    }
}

/// A source of truth a [`Namespace`] resolves against.
///
/// The IR and parser only need `contains`/`lookup`; how a resolver is
/// populated (reading a real module, a test fixture, ...) is out of scope.
pub trait Resolver {
    fn contains(&self, name: &str) -> bool;
    fn lookup(&self, name: &str) -> Option<NamespaceValue>;
}

/// A value a namespace can resolve a name to. Left deliberately small: the
/// surface language only ever resolves to callables (operators, builtins) or
/// plain scalars used as globals in test fixtures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NamespaceValue {
    Primitive(crate::primitives::Primitive),
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

/// A simple in-memory [`Resolver`] backed by a map, suitable for tests and
/// for the CLI's global/operator namespaces.
#[derive(Debug, Clone, Default)]
pub struct MapResolver {
    entries: std::collections::HashMap<String, NamespaceValue>,
}

impl MapResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: NamespaceValue) -> Self {
        self.entries.insert(name.into(), value);
        self
    }
}

impl Resolver for MapResolver {
    fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    fn lookup(&self, name: &str) -> Option<NamespaceValue> {
        self.entries.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::Primitive;

    #[test]
    fn map_resolver_lookup() {
        let ns = MapResolver::new().with("add", NamespaceValue::Primitive(Primitive::Add));
        assert!(ns.contains("add"));
        assert_eq!(ns.lookup("add"), Some(NamespaceValue::Primitive(Primitive::Add)));
        assert!(!ns.contains("sub"));
    }

    #[test]
    fn namespace_variants_distinct() {
        let m = Namespace::module("operator");
        let c = Namespace::closure("outer");
        assert_ne!(m, c);
    }
}
