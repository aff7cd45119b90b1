//! Nodes of the numeric dataflow graph.
use super::GroupRef;
use smallvec::SmallVec;
use strum_macros::{Display, EnumIter, EnumString};

/// Handle to an [Expr] stored in an [super::ExprPool].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprRef(u32);

impl ExprRef {
    pub(super) fn new(idx: usize) -> Self {
        ExprRef(idx.try_into().expect("too many expressions in the pool"))
    }

    /// Get the underlying number for this reference. Clients should only rely on this being unique
    /// for structurally different expressions in a single pool.
    pub fn index(&self) -> u32 {
        self.0
    }
}

/// A 32-bit number with total equality so constants can be hashed.
///
/// Numbers compare by their bits, so `-0.0` and `0.0` are different
/// constants. Every NaN is the same number.
#[derive(Debug, Copy, Clone)]
pub struct Number(f32);

impl Number {
    pub fn new(value: f32) -> Self {
        if value.is_nan() {
            Number(f32::NAN)
        } else {
            Number(value)
        }
    }

    pub fn value(&self) -> f32 {
        self.0
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for Number {}

impl std::hash::Hash for Number {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state)
    }
}

impl std::fmt::Display for Number {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum UnaryOp {
    Not,
    Ln,
    Abs,
    Ceil,
    Floor,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sqrt,
}

impl UnaryOp {
    pub fn evaluate(&self, a: f32) -> f32 {
        match self {
            UnaryOp::Not => truth(a == 0.0),
            UnaryOp::Ln => a.ln(),
            UnaryOp::Abs => a.abs(),
            UnaryOp::Ceil => a.ceil(),
            UnaryOp::Floor => a.floor(),
            UnaryOp::Sin => a.sin(),
            UnaryOp::Cos => a.cos(),
            UnaryOp::Tan => a.tan(),
            UnaryOp::Asin => a.asin(),
            UnaryOp::Acos => a.acos(),
            UnaryOp::Atan => a.atan(),
            UnaryOp::Sqrt => a.sqrt(),
        }
    }

    /// Whether the result is a truth value rather than a number.
    pub fn is_logical(&self) -> bool {
        matches!(self, UnaryOp::Not)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    Min,
    Max,
    Log,
    Atan2,
    Eq,
    Neq,
    Lt,
    Leq,
    Gt,
    Geq,
    And,
    Or,
}

impl BinaryOp {
    pub fn evaluate(&self, a: f32, b: f32) -> f32 {
        match self {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b,
            // truncated remainder, takes the sign of the dividend
            BinaryOp::Rem => a % b,
            BinaryOp::Pow => a.powf(b),
            BinaryOp::Min => a.min(b),
            BinaryOp::Max => a.max(b),
            BinaryOp::Log => a.log(b),
            BinaryOp::Atan2 => a.atan2(b),
            BinaryOp::Eq => truth(a == b),
            BinaryOp::Neq => truth(a != b),
            BinaryOp::Lt => truth(a < b),
            BinaryOp::Leq => truth(a <= b),
            BinaryOp::Gt => truth(a > b),
            BinaryOp::Geq => truth(a >= b),
            BinaryOp::And => truth(a != 0.0 && b != 0.0),
            BinaryOp::Or => truth(a != 0.0 || b != 0.0),
        }
    }

    /// Whether the result is a truth value rather than a number.
    pub fn is_logical(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::Neq
                | BinaryOp::Lt
                | BinaryOp::Leq
                | BinaryOp::Gt
                | BinaryOp::Geq
                | BinaryOp::And
                | BinaryOp::Or
        )
    }
}

fn truth(b: bool) -> f32 {
    if b { 1.0 } else { 0.0 }
}

/// A node of the expression graph.
///
/// Operands are handles into the owning pool, so equal nodes built in the
/// same pool share one handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expr {
    Constant(Number),
    /// The `index`th value supplied by the host at evaluation time.
    Input(usize),
    Unary(UnaryOp, ExprRef),
    Binary(BinaryOp, ExprRef, ExprRef),
    /// Selects `operands[selector]`. Never empty.
    Mux(ExprRef, SmallVec<[ExprRef; 4]>),
    /// The value carried in `slot` of `group`, only meaningful inside the
    /// group's own defining expressions.
    State { group: GroupRef, slot: usize },
    /// Output `index` of `group`.
    Element { group: GroupRef, index: usize },
}

impl Expr {
    pub fn as_constant(&self) -> Option<f32> {
        match self {
            Expr::Constant(n) => Some(n.value()),
            _ => None,
        }
    }

    /// Direct operands of this node. Group references are not followed.
    pub fn operands(&self) -> SmallVec<[ExprRef; 4]> {
        match self {
            Expr::Constant(_)
            | Expr::Input(_)
            | Expr::State { .. }
            | Expr::Element { .. } => SmallVec::new(),
            Expr::Unary(_, a) => smallvec::smallvec![*a],
            Expr::Binary(_, a, b) => smallvec::smallvec![*a, *b],
            Expr::Mux(sel, ops) => {
                let mut all = SmallVec::with_capacity(ops.len() + 1);
                all.push(*sel);
                all.extend(ops.iter().copied());
                all
            }
        }
    }

    /// The group this node reads from, if any.
    pub fn group(&self) -> Option<GroupRef> {
        match self {
            Expr::State { group, .. } | Expr::Element { group, .. } => {
                Some(*group)
            }
            _ => None,
        }
    }
}

/// Clamp a constant selector to a valid index into `len` operands.
pub fn clamp_selector(selector: f32, len: usize) -> usize {
    debug_assert!(len > 0, "mux with no operands");
    if selector >= len as f32 {
        len - 1
    } else if selector < 0.0 {
        0
    } else {
        selector as usize
    }
}
