use super::{Expr, ExprRef, Group, GroupRef, Number, expression::{BinaryOp, UnaryOp}};
use element_utils::{ElementResult, Error};
use smallvec::SmallVec;
use std::collections::{HashMap, HashSet};

/// An `ExprPool` is an "arena"-style storage area for the expression graph.
///
/// Some invariants for the underlying storage:
/// * `ExprRef`s and `GroupRef`s are always within the same pool.
/// * Expressions are hash-consed: adding a node that is structurally equal to
///   an existing one returns the existing handle. Comparing handles is
///   therefore the same as comparing structure, with groups compared by
///   identity.
/// * Groups are reserved before they are defined so that their own defining
///   expressions can refer to them.
pub struct ExprPool {
    exprs: Vec<Expr>,
    interned: HashMap<Expr, ExprRef>,
    groups: Vec<Option<Group>>,
}

impl Default for ExprPool {
    fn default() -> Self {
        Self::new()
    }
}

impl ExprPool {
    pub fn new() -> Self {
        Self {
            exprs: Vec::with_capacity(1024),
            interned: HashMap::with_capacity(1024),
            groups: Vec::new(),
        }
    }

    fn add(&mut self, expr: Expr) -> ExprRef {
        if let Some(existing) = self.interned.get(&expr) {
            return *existing;
        }
        let idx = ExprRef::new(self.exprs.len());
        self.exprs.push(expr.clone());
        self.interned.insert(expr, idx);
        idx
    }

    pub fn get(&self, expr: ExprRef) -> &Expr {
        &self.exprs[expr.index() as usize]
    }

    pub fn len(&self) -> usize {
        self.exprs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exprs.is_empty()
    }

    pub fn num_groups(&self) -> usize {
        self.groups.len()
    }

    pub fn as_constant(&self, expr: ExprRef) -> Option<f32> {
        self.get(expr).as_constant()
    }

    pub fn constant(&mut self, value: f32) -> ExprRef {
        self.add(Expr::Constant(Number::new(value)))
    }

    pub fn input(&mut self, index: usize) -> ExprRef {
        self.add(Expr::Input(index))
    }

    pub fn unary(&mut self, op: UnaryOp, operand: ExprRef) -> ExprRef {
        self.add(Expr::Unary(op, operand))
    }

    pub fn binary(&mut self, op: BinaryOp, a: ExprRef, b: ExprRef) -> ExprRef {
        self.add(Expr::Binary(op, a, b))
    }

    /// Build a multiplexer. A multiplexer needs at least one operand.
    pub fn mux<I>(&mut self, selector: ExprRef, operands: I) -> ElementResult<ExprRef>
    where
        I: IntoIterator<Item = ExprRef>,
    {
        let operands: SmallVec<[ExprRef; 4]> = operands.into_iter().collect();
        if operands.is_empty() {
            return Err(Error::malformed_graph("mux requires at least one operand"));
        }
        Ok(self.add(Expr::Mux(selector, operands)))
    }

    /// Read the carried value of `slot`. Only valid inside the defining
    /// expressions of `group`.
    pub fn state(&mut self, group: GroupRef, slot: usize) -> ElementResult<ExprRef> {
        self.check_slot(group, slot)?;
        Ok(self.add(Expr::State { group, slot }))
    }

    /// Output `index` of `group`. The group may still be undefined, which is
    /// how a group refers to its own outputs.
    pub fn element(&mut self, group: GroupRef, index: usize) -> ElementResult<ExprRef> {
        self.check_slot(group, index)?;
        Ok(self.add(Expr::Element { group, index }))
    }

    fn check_slot(&self, group: GroupRef, slot: usize) -> ElementResult<()> {
        match self.groups.get(group.index() as usize) {
            None => Err(Error::malformed_graph(format!(
                "group #{} does not exist",
                group.index()
            ))),
            Some(Some(def)) if slot >= def.size() => {
                Err(Error::malformed_graph(format!(
                    "group #{} has {} slots, slot {slot} is out of range",
                    group.index(),
                    def.size()
                )))
            }
            Some(_) => Ok(()),
        }
    }

    /// Allocate a handle for a group whose definition is provided later with
    /// [ExprPool::define_group].
    pub fn reserve_group(&mut self) -> GroupRef {
        let idx = GroupRef::new(self.groups.len());
        self.groups.push(None);
        idx
    }

    pub fn define_group(&mut self, handle: GroupRef, group: Group) -> ElementResult<()> {
        let idx = handle.index() as usize;
        match self.groups.get(idx) {
            None => {
                return Err(Error::malformed_graph(format!(
                    "group #{idx} was never reserved"
                )));
            }
            Some(Some(_)) => {
                return Err(Error::malformed_graph(format!(
                    "group #{idx} is already defined"
                )));
            }
            Some(None) => (),
        }
        if group.size() == 0 {
            return Err(Error::malformed_graph(format!(
                "{} group #{idx} has no state",
                group.kind_name()
            )));
        }
        if group.initial().len() != group.next_state().len() {
            return Err(Error::malformed_graph(format!(
                "{} group #{idx} has {} initial values but {} next values",
                group.kind_name(),
                group.initial().len(),
                group.next_state().len()
            )));
        }
        if let Some(bad) = group
            .defining_exprs()
            .find(|e| e.index() as usize >= self.exprs.len())
        {
            return Err(Error::malformed_graph(format!(
                "group #{idx} refers to unknown expression {}",
                bad.index()
            )));
        }
        self.groups[idx] = Some(group);
        Ok(())
    }

    /// The definition of `group`, or `None` while it is only reserved.
    pub fn group(&self, group: GroupRef) -> Option<&Group> {
        self.groups
            .get(group.index() as usize)
            .and_then(Option::as_ref)
    }

    /// State nodes for the first `count` slots of `group`.
    pub fn states(&mut self, group: GroupRef, count: usize) -> ElementResult<Vec<ExprRef>> {
        (0..count).map(|slot| self.state(group, slot)).collect()
    }

    /// Build a persist group. `new_value` receives the state nodes and
    /// returns the next value of each slot.
    pub fn persist<F>(&mut self, initial: Vec<ExprRef>, new_value: F) -> ElementResult<GroupRef>
    where
        F: FnOnce(&mut Self, &[ExprRef]) -> ElementResult<Vec<ExprRef>>,
    {
        let handle = self.reserve_group();
        let states = self.states(handle, initial.len())?;
        let new_value = new_value(self, &states)?;
        self.define_group(handle, Group::Persist { initial, new_value })?;
        Ok(handle)
    }

    /// Build a loop group. `step` receives the state nodes and returns the
    /// loop condition and the next value of each slot.
    pub fn loop_group<F>(&mut self, initial: Vec<ExprRef>, step: F) -> ElementResult<GroupRef>
    where
        F: FnOnce(&mut Self, &[ExprRef]) -> ElementResult<(ExprRef, Vec<ExprRef>)>,
    {
        let handle = self.reserve_group();
        let states = self.states(handle, initial.len())?;
        let (condition, body) = step(self, &states)?;
        self.define_group(
            handle,
            Group::Loop {
                initial,
                condition,
                body,
            },
        )?;
        Ok(handle)
    }

    /// Structural equality of two graphs in this pool where groups are
    /// compared by their definitions rather than by handle. Cycles through
    /// groups are assumed equal once entered.
    pub fn equivalent(&self, a: ExprRef, b: ExprRef) -> bool {
        let mut groups: HashMap<GroupRef, GroupRef> = HashMap::new();
        let mut seen: HashSet<(ExprRef, ExprRef)> = HashSet::new();
        let mut pending = vec![(a, b)];
        while let Some((a, b)) = pending.pop() {
            if a == b && self.is_group_free(a) {
                continue;
            }
            if !seen.insert((a, b)) {
                continue;
            }
            let same = match (self.get(a), self.get(b)) {
                (Expr::Constant(x), Expr::Constant(y)) => x == y,
                (Expr::Input(x), Expr::Input(y)) => x == y,
                (Expr::Unary(op_a, x), Expr::Unary(op_b, y)) => {
                    pending.push((*x, *y));
                    op_a == op_b
                }
                (Expr::Binary(op_a, xa, ya), Expr::Binary(op_b, xb, yb)) => {
                    pending.push((*xa, *xb));
                    pending.push((*ya, *yb));
                    op_a == op_b
                }
                (Expr::Mux(sel_a, ops_a), Expr::Mux(sel_b, ops_b)) => {
                    pending.push((*sel_a, *sel_b));
                    pending.extend(ops_a.iter().copied().zip(ops_b.iter().copied()));
                    ops_a.len() == ops_b.len()
                }
                (
                    Expr::State { group: ga, slot: ia },
                    Expr::State { group: gb, slot: ib },
                )
                | (
                    Expr::Element { group: ga, index: ia },
                    Expr::Element { group: gb, index: ib },
                ) => ia == ib && self.match_groups(*ga, *gb, &mut groups, &mut pending),
                _ => false,
            };
            if !same {
                return false;
            }
        }
        true
    }

    fn match_groups(
        &self,
        ga: GroupRef,
        gb: GroupRef,
        groups: &mut HashMap<GroupRef, GroupRef>,
        pending: &mut Vec<(ExprRef, ExprRef)>,
    ) -> bool {
        if let Some(mapped) = groups.get(&ga) {
            return *mapped == gb;
        }
        if groups.values().any(|mapped| *mapped == gb) {
            return false;
        }
        groups.insert(ga, gb);
        match (self.group(ga), self.group(gb)) {
            (Some(da), Some(db)) => {
                if std::mem::discriminant(da) != std::mem::discriminant(db)
                    || da.size() != db.size()
                {
                    return false;
                }
                pending.extend(da.defining_exprs().zip(db.defining_exprs()));
                true
            }
            (None, None) => ga == gb,
            _ => false,
        }
    }

    /// Whether no group is reachable from `expr`.
    fn is_group_free(&self, expr: ExprRef) -> bool {
        let mut pending = vec![expr];
        let mut visited = HashSet::new();
        while let Some(e) = pending.pop() {
            if !visited.insert(e) {
                continue;
            }
            let node = self.get(e);
            if node.group().is_some() {
                return false;
            }
            pending.extend(node.operands());
        }
        true
    }
}
