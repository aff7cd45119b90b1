use super::ExprRef;

/// Handle to a [Group] stored in an [super::ExprPool].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupRef(u32);

impl GroupRef {
    pub(super) fn new(idx: usize) -> Self {
        GroupRef(idx.try_into().expect("too many groups in the pool"))
    }

    pub fn index(&self) -> u32 {
        self.0
    }
}

/// A unit of state shared by every element that reads one of its outputs.
///
/// The defining expressions of a group may read the carried values through
/// `Expr::State` nodes of the same group, and may also refer to the group's
/// own outputs through `Expr::Element`, which makes the graph cyclic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Group {
    /// Carries `initial[i]` into the first step and `new_value[i]` into every
    /// step after that.
    Persist {
        initial: Vec<ExprRef>,
        new_value: Vec<ExprRef>,
    },
    /// Starting from `initial`, applies `body` while `condition` holds.
    Loop {
        initial: Vec<ExprRef>,
        condition: ExprRef,
        body: Vec<ExprRef>,
    },
}

impl Group {
    /// Number of state slots, which is also the number of outputs.
    pub fn size(&self) -> usize {
        self.initial().len()
    }

    pub fn initial(&self) -> &[ExprRef] {
        match self {
            Group::Persist { initial, .. } | Group::Loop { initial, .. } => {
                initial
            }
        }
    }

    /// The per-slot expressions that compute the next state: `new_value` for
    /// persist groups, `body` for loops.
    pub fn next_state(&self) -> &[ExprRef] {
        match self {
            Group::Persist { new_value, .. } => new_value,
            Group::Loop { body, .. } => body,
        }
    }

    /// Every expression this group is defined by.
    pub fn defining_exprs(&self) -> impl Iterator<Item = ExprRef> + '_ {
        let condition = match self {
            Group::Loop { condition, .. } => Some(*condition),
            Group::Persist { .. } => None,
        };
        self.initial()
            .iter()
            .copied()
            .chain(condition)
            .chain(self.next_state().iter().copied())
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Group::Persist { .. } => "persist",
            Group::Loop { .. } => "loop",
        }
    }
}
