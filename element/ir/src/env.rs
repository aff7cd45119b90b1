use super::{DeclRef, ScopeId, Value};
use element_utils::Id;
use linked_hash_map::LinkedHashMap;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// A lexical environment: an optional scope of declarations, the values
/// bound to ports of the function being called, and the environment the
/// scope is nested in.
///
/// Environments are shared between function values that capture them, so
/// the cache of resolved members uses interior mutability. Static
/// environments (the root scope and the bodies of namespaces and structs)
/// are created once per context, which makes their cache a per-compilation
/// cache keyed by qualified name.
#[derive(Default)]
pub struct Env {
    scope: Option<ScopeId>,
    bindings: LinkedHashMap<Id, Value>,
    cache: RefCell<HashMap<DeclRef, Value>>,
    parent: Option<Rc<Env>>,
}

impl Env {
    pub fn new(
        scope: Option<ScopeId>,
        bindings: LinkedHashMap<Id, Value>,
        parent: Option<Rc<Env>>,
    ) -> Rc<Self> {
        Rc::new(Self {
            scope,
            bindings,
            cache: RefCell::default(),
            parent,
        })
    }

    pub fn scope(&self) -> Option<ScopeId> {
        self.scope
    }

    pub fn parent(&self) -> Option<&Rc<Env>> {
        self.parent.as_ref()
    }

    pub fn binding(&self, name: Id) -> Option<&Value> {
        self.bindings.get(&name)
    }

    pub fn cached(&self, decl: DeclRef) -> Option<Value> {
        self.cache.borrow().get(&decl).cloned()
    }

    pub fn insert_cache(&self, decl: DeclRef, value: Value) {
        self.cache.borrow_mut().insert(decl, value);
    }

    /// Forget every resolved member. The values are dropped after the cache
    /// is released since dropping them may drop other environments.
    pub fn clear_cache(&self) {
        let cache = self.cache.take();
        drop(cache);
    }
}

impl std::fmt::Debug for Env {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Env")
            .field("scope", &self.scope)
            .field("bindings", &self.bindings.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
