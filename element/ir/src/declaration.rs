//! Declarations and the scopes that hold them.
use super::TraceSite;
use element_frontend::{DeclKind, Expression};
use element_utils::{GetName, Id, Span, WithPos};
use linked_hash_map::LinkedHashMap;
use std::rc::Rc;

/// Handle to a [Declaration] owned by a [super::CompilationContext].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclRef(u32);

impl DeclRef {
    pub(crate) fn new(idx: usize) -> Self {
        DeclRef(idx.try_into().expect("too many declarations"))
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Handle to a [Scope] owned by a [super::CompilationContext].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u32);

impl ScopeId {
    /// The scope shared by the top level of every source file.
    pub const ROOT: ScopeId = ScopeId(0);

    pub(crate) fn new(idx: usize) -> Self {
        ScopeId(idx.try_into().expect("too many scopes"))
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Members of a namespace, struct or function body, in declaration order.
#[derive(Debug, Default)]
pub struct Scope {
    pub members: LinkedHashMap<Id, DeclRef>,
    pub parent: Option<ScopeId>,
    /// The declaration whose body this scope is. `None` for the root scope.
    pub owner: Option<DeclRef>,
}

/// A formal parameter.
#[derive(Debug, Clone)]
pub struct Port {
    pub name: Id,
    pub constraint: Option<Rc<Expression>>,
    pub span: Span,
}

impl GetName for Port {
    fn name(&self) -> Id {
        self.name
    }
}

#[derive(Debug, Clone)]
pub enum DeclBody {
    Scope(ScopeId),
    Terminal,
    Expression(Rc<Expression>),
}

/// A loaded declaration.
#[derive(Debug, Clone)]
pub struct Declaration {
    pub name: Id,
    pub kind: DeclKind,
    pub intrinsic: bool,
    pub ports: Option<Vec<Port>>,
    /// Return constraint of functions and constraints, aliased struct of
    /// struct aliases.
    pub declared_type: Option<Rc<Expression>>,
    pub body: DeclBody,
    /// The scope this declaration is a member of.
    pub parent: ScopeId,
    /// Dotted path from the root scope, e.g. `Num.add`.
    pub qualified_name: String,
    pub span: Span,
}

impl Declaration {
    pub fn is_alias(&self) -> bool {
        self.kind == DeclKind::Struct && self.declared_type.is_some()
    }

    /// The declared ports, empty when no port list was written.
    pub fn inputs(&self) -> &[Port] {
        self.ports.as_deref().unwrap_or(&[])
    }

    pub fn body_scope(&self) -> Option<ScopeId> {
        match self.body {
            DeclBody::Scope(scope) => Some(scope),
            _ => None,
        }
    }

    /// Where names in this declaration's signature are resolved: its own
    /// body if it has one, otherwise the scope it is declared in.
    pub fn lookup_scope(&self) -> ScopeId {
        self.body_scope().unwrap_or(self.parent)
    }

    pub fn trace_site(&self) -> TraceSite {
        TraceSite::new(self.qualified_name.clone(), self.span)
    }
}

impl GetName for Declaration {
    fn name(&self) -> Id {
        self.name
    }
}

impl WithPos for Declaration {
    fn copy_span(&self) -> Option<Span> {
        Some(self.span)
    }
}
