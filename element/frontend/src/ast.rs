//! Abstract Syntax Tree for Element
use element_utils::{Id, Span, WithPos};

/// A parsed source file: the declarations found at its top level.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Name the source was registered under (a path or `<prelude>`)
    pub name: Id,
    pub items: Vec<Declaration>,
}

/// The syntactic form a declaration was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclKind {
    Namespace,
    Struct,
    Constraint,
    Function,
}

impl std::fmt::Display for DeclKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DeclKind::Namespace => "namespace",
            DeclKind::Struct => "struct",
            DeclKind::Constraint => "constraint",
            DeclKind::Function => "function",
        };
        write!(f, "{s}")
    }
}

/// A named item in a scope.
#[derive(Debug, Clone)]
pub struct Declaration {
    pub kind: DeclKind,
    /// Marked with the `intrinsic` qualifier
    pub intrinsic: bool,
    pub name: Id,
    /// `None` when no port list was written; `Some(vec![])` for `()`.
    pub ports: Option<Vec<PortDef>>,
    /// The `: Type` annotation. On a struct this names the aliased struct.
    pub declared_type: Option<Expression>,
    pub body: Body,
    pub span: Span,
}

/// A formal parameter of a declaration.
#[derive(Debug, Clone)]
pub struct PortDef {
    pub name: Id,
    pub constraint: Option<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum Body {
    /// `{ ... }`
    Scope(Vec<Declaration>),
    /// `;`
    Terminal,
    /// `= expression;`
    Expression(Expression),
}

impl Body {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Body::Terminal)
    }
}

#[derive(Debug, Clone)]
pub enum Expression {
    Literal {
        value: f32,
        span: Span,
    },
    Identifier {
        name: Id,
        span: Span,
    },
    /// `target.member`
    Index {
        target: Box<Expression>,
        member: Id,
        span: Span,
    },
    /// `callee(args...)`
    Call {
        callee: Box<Expression>,
        args: Vec<Expression>,
        span: Span,
    },
}

impl Expression {
    pub fn span(&self) -> Span {
        match self {
            Expression::Literal { span, .. }
            | Expression::Identifier { span, .. }
            | Expression::Index { span, .. }
            | Expression::Call { span, .. } => *span,
        }
    }
}

impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expression::Literal { value, .. } => write!(f, "{value}"),
            Expression::Identifier { name, .. } => write!(f, "{name}"),
            Expression::Index { target, member, .. } => {
                write!(f, "{target}.{member}")
            }
            Expression::Call { callee, args, .. } => {
                write!(f, "{callee}(")?;
                for (idx, arg) in args.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
        }
    }
}

impl WithPos for Declaration {
    fn copy_span(&self) -> Option<Span> {
        Some(self.span)
    }
}

impl WithPos for PortDef {
    fn copy_span(&self) -> Option<Span> {
        Some(self.span)
    }
}

impl WithPos for Expression {
    fn copy_span(&self) -> Option<Span> {
        Some(self.span())
    }
}
