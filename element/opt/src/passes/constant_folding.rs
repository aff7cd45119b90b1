use crate::analysis::StateDependency;
use crate::traversal::Named;
use element_ir::{
    clamp_selector, BinaryOp, Expr, ExprPool, ExprRef, Group, GroupRef, StructInstance,
    Value,
};
use element_utils::{ElementResult, Error};
use itertools::Itertools;
use linked_hash_map::LinkedHashMap;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// Folds constant sub-expressions, applies algebraic identities and bypasses
/// group state that is never read back.
///
/// One instance is one optimization run: its caches are shared by every call
/// so structurally identical sub-graphs are optimized once. Groups are
/// rewritten as a whole. A group whose defining expressions lead back to one
/// of its own elements is marked in progress while they are optimized, and
/// such a back reference becomes an element of the new group without
/// recursing again.
#[derive(Default)]
pub struct ConstantFolding {
    /// Optimized form of every expression seen so far.
    cache: HashMap<ExprRef, ExprRef>,
    /// Original group to its optimized replacement.
    groups: HashMap<GroupRef, GroupRef>,
    /// Groups whose defining expressions are being optimized.
    in_progress: HashSet<GroupRef>,
}

impl Named for ConstantFolding {
    fn name() -> &'static str {
        "constant-folding"
    }

    fn description() -> &'static str {
        "fold constants, apply arithmetic identities and remove dead group state"
    }
}

/// Work item of the explicit traversal stack.
enum Visit {
    /// Schedule the operands of a node.
    Enter(ExprRef),
    /// All operands are optimized, rebuild the node.
    Exit(ExprRef),
}

impl ConstantFolding {
    /// Number of expressions with a memoized result.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// Optimize the graph rooted at `root`. New nodes are added to `pool`.
    ///
    /// The traversal keeps its own stack, so the depth of an expression is
    /// not limited by the call stack. Only nesting of groups recurses.
    pub fn optimize(&mut self, pool: &mut ExprPool, root: ExprRef) -> ElementResult<ExprRef> {
        // Results that depend on a group still in progress. They are only
        // valid for this traversal and never enter the shared cache.
        let mut provisional: HashMap<ExprRef, ExprRef> = HashMap::new();
        let mut pending = vec![Visit::Enter(root)];

        while let Some(visit) = pending.pop() {
            match visit {
                Visit::Enter(e) => {
                    if self.cache.contains_key(&e) || provisional.contains_key(&e) {
                        continue;
                    }
                    if let Expr::Element { group, index } = *pool.get(e) {
                        let (result, stable) = self.optimize_element(pool, group, index)?;
                        if stable {
                            self.cache.insert(e, result);
                        } else {
                            provisional.insert(e, result);
                        }
                        continue;
                    }
                    let operands = pool.get(e).operands();
                    pending.push(Visit::Exit(e));
                    pending.extend(operands.into_iter().rev().map(Visit::Enter));
                }
                Visit::Exit(e) => {
                    if self.cache.contains_key(&e) || provisional.contains_key(&e) {
                        continue;
                    }
                    let node = pool.get(e).clone();
                    let mut stable = true;
                    let mut operands = Vec::with_capacity(node.operands().len());
                    for op in node.operands() {
                        if let Some(r) = self.cache.get(&op) {
                            operands.push(*r);
                        } else if let Some(r) = provisional.get(&op) {
                            stable = false;
                            operands.push(*r);
                        } else {
                            return Err(Error::internal(format!(
                                "operand {} of expression {} was not optimized",
                                op.index(),
                                e.index()
                            )));
                        }
                    }
                    let (result, own_stable) = self.fold(pool, e, &node, &operands)?;
                    if stable && own_stable {
                        self.cache.insert(e, result);
                    } else {
                        provisional.insert(e, result);
                    }
                }
            }
        }

        self.cache
            .get(&root)
            .or_else(|| provisional.get(&root))
            .copied()
            .ok_or_else(|| {
                Error::internal(format!("expression {} was not optimized", root.index()))
            })
    }

    /// Optimize every defining expression of `group` and return the group
    /// that replaces it. Repeated calls return the same replacement.
    pub fn optimize_group(
        &mut self,
        pool: &mut ExprPool,
        group: GroupRef,
    ) -> ElementResult<GroupRef> {
        if let Some(optimized) = self.groups.get(&group) {
            return Ok(*optimized);
        }
        let definition = pool.group(group).cloned().ok_or_else(|| {
            Error::malformed_graph(format!(
                "group #{} is referenced but never defined",
                group.index()
            ))
        })?;
        log::debug!(
            "Optimizing {} group #{} with {} slots",
            definition.kind_name(),
            group.index(),
            definition.size()
        );

        let optimized = pool.reserve_group();
        self.groups.insert(group, optimized);
        self.in_progress.insert(group);

        let initial = self.optimize_all(pool, definition.initial())?;
        let replacement = match &definition {
            Group::Persist { new_value, .. } => Group::Persist {
                initial,
                new_value: self.optimize_all(pool, new_value)?,
            },
            Group::Loop {
                condition, body, ..
            } => Group::Loop {
                initial,
                condition: self.optimize(pool, *condition)?,
                body: self.optimize_all(pool, body)?,
            },
        };
        pool.define_group(optimized, replacement)?;

        self.in_progress.remove(&group);
        log::trace!("group #{} became #{}", group.index(), optimized.index());
        Ok(optimized)
    }

    /// Rewrite every expression inside a compiled value. Struct instances are
    /// rebuilt so that their serializability reflects the folded fields.
    pub fn optimize_value(&mut self, pool: &mut ExprPool, value: &Value) -> ElementResult<Value> {
        Ok(match value {
            Value::Num(e) => Value::Num(self.optimize(pool, *e)?),
            Value::Bool(e) => Value::Bool(self.optimize(pool, *e)?),
            Value::Instance(instance) => {
                let mut fields = LinkedHashMap::new();
                for (name, field) in instance.fields() {
                    fields.insert(*name, self.optimize_value(pool, field)?);
                }
                Value::Instance(Rc::new(StructInstance::new(
                    instance.declaring(),
                    fields,
                    pool,
                )))
            }
            other => other.clone(),
        })
    }

    fn optimize_all(
        &mut self,
        pool: &mut ExprPool,
        exprs: &[ExprRef],
    ) -> ElementResult<Vec<ExprRef>> {
        exprs.iter().map(|e| self.optimize(pool, *e)).collect()
    }

    /// Optimized form of `Element(group, index)`, and whether it may be
    /// memoized.
    fn optimize_element(
        &mut self,
        pool: &mut ExprPool,
        group: GroupRef,
        index: usize,
    ) -> ElementResult<(ExprRef, bool)> {
        if self.in_progress.contains(&group) {
            let optimized = self.groups.get(&group).copied().ok_or_else(|| {
                Error::internal(format!("group #{} has no replacement", group.index()))
            })?;
            log::trace!(
                "element {index} of group #{} refers back to a group in progress",
                group.index()
            );
            return Ok((pool.element(optimized, index)?, false));
        }
        let optimized = self.optimize_group(pool, group)?;
        let next = pool
            .group(optimized)
            .and_then(|def| def.next_state().get(index).copied())
            .ok_or_else(|| {
                Error::malformed_graph(format!(
                    "group #{} has no slot {index}",
                    group.index()
                ))
            })?;
        if StateDependency::depends_on(pool, next, optimized) {
            Ok((pool.element(optimized, index)?, true))
        } else {
            log::debug!(
                "slot {index} of group #{} does not read its state",
                group.index()
            );
            Ok((next, true))
        }
    }

    /// Rebuild `node`, originally at `expr`, over its optimized `operands`.
    fn fold(
        &self,
        pool: &mut ExprPool,
        expr: ExprRef,
        node: &Expr,
        operands: &[ExprRef],
    ) -> ElementResult<(ExprRef, bool)> {
        let result = match node {
            Expr::Constant(_) | Expr::Input(_) => expr,
            Expr::State { group, slot } => {
                return match self.groups.get(group) {
                    Some(optimized) => Ok((pool.state(*optimized, *slot)?, true)),
                    None => Ok((expr, false)),
                };
            }
            Expr::Element { .. } => {
                return Err(Error::internal("group elements are optimized separately"));
            }
            Expr::Unary(op, _) => {
                let a = operands[0];
                match pool.as_constant(a) {
                    Some(c) => pool.constant(op.evaluate(c)),
                    None => pool.unary(*op, a),
                }
            }
            Expr::Binary(op, ..) => fold_binary(pool, *op, operands[0], operands[1]),
            Expr::Mux(..) => fold_mux(pool, operands[0], &operands[1..])?,
        };
        Ok((result, true))
    }
}

/// Constant evaluation and algebraic identities. The first matching rule
/// wins.
fn fold_binary(pool: &mut ExprPool, op: BinaryOp, a: ExprRef, b: ExprRef) -> ExprRef {
    let ca = pool.as_constant(a);
    let cb = pool.as_constant(b);
    if let (Some(x), Some(y)) = (ca, cb) {
        return pool.constant(op.evaluate(x, y));
    }
    match op {
        BinaryOp::Pow => {
            if cb == Some(0.0) || ca == Some(1.0) {
                return pool.constant(1.0);
            }
            if ca == Some(0.0) {
                return pool.constant(0.0);
            }
            if cb == Some(1.0) {
                return a;
            }
            if cb == Some(2.0) {
                return pool.binary(BinaryOp::Mul, a, a);
            }
        }
        BinaryOp::Add => {
            if ca == Some(0.0) {
                return b;
            }
            if cb == Some(0.0) {
                return a;
            }
        }
        BinaryOp::Sub => {
            if cb == Some(0.0) {
                return a;
            }
            if a == b {
                return pool.constant(0.0);
            }
        }
        BinaryOp::Mul => {
            if ca == Some(0.0) || cb == Some(0.0) {
                return pool.constant(0.0);
            }
            if ca == Some(1.0) {
                return b;
            }
            if cb == Some(1.0) {
                return a;
            }
        }
        BinaryOp::Div => {
            if cb == Some(1.0) {
                return a;
            }
            if a == b {
                return pool.constant(1.0);
            }
            if let Some(c) = cb {
                let reciprocal = pool.constant(1.0 / c);
                return pool.binary(BinaryOp::Mul, a, reciprocal);
            }
        }
        BinaryOp::Rem => {
            if ca == Some(0.0) || a == b {
                return pool.constant(0.0);
            }
        }
        _ => (),
    }
    pool.binary(op, a, b)
}

fn fold_mux(
    pool: &mut ExprPool,
    selector: ExprRef,
    operands: &[ExprRef],
) -> ElementResult<ExprRef> {
    let Some(first) = operands.first().copied() else {
        return Err(Error::malformed_graph("mux requires at least one operand"));
    };
    if operands.iter().all_equal() {
        return Ok(first);
    }
    if let Some(s) = pool.as_constant(selector) {
        return Ok(operands[clamp_selector(s, operands.len())]);
    }
    pool.mux(selector, operands.iter().copied())
}

#[cfg(test)]
mod tests {
    use super::ConstantFolding;
    use crate::{analysis::StateDependency, traversal::Named};
    use element_ir::{BinaryOp, Expr, ExprPool, ExprRef, Group, UnaryOp};

    fn fold(pool: &mut ExprPool, expr: ExprRef) -> ExprRef {
        ConstantFolding::default().optimize(pool, expr).unwrap()
    }

    #[test]
    fn pass_is_named() {
        assert_eq!(ConstantFolding::name(), "constant-folding");
    }

    #[test]
    fn constants_are_evaluated() {
        let mut pool = ExprPool::new();
        let two = pool.constant(2.0);
        let three = pool.constant(3.0);
        let product = pool.binary(BinaryOp::Mul, two, three);
        let folded = fold(&mut pool, product);
        assert_eq!(pool.as_constant(folded), Some(6.0));

        let nine = pool.constant(9.0);
        let root = pool.unary(UnaryOp::Sqrt, nine);
        let folded = fold(&mut pool, root);
        assert_eq!(pool.as_constant(folded), Some(3.0));
    }

    #[test]
    fn additive_and_multiplicative_identities() {
        let mut pool = ExprPool::new();
        let x = pool.input(0);
        let zero = pool.constant(0.0);
        let one = pool.constant(1.0);

        let e = pool.binary(BinaryOp::Add, zero, x);
        assert_eq!(fold(&mut pool, e), x);
        let e = pool.binary(BinaryOp::Add, x, zero);
        assert_eq!(fold(&mut pool, e), x);
        let e = pool.binary(BinaryOp::Sub, x, zero);
        assert_eq!(fold(&mut pool, e), x);
        let e = pool.binary(BinaryOp::Sub, x, x);
        let folded = fold(&mut pool, e);
        assert_eq!(pool.as_constant(folded), Some(0.0));
        let e = pool.binary(BinaryOp::Mul, x, zero);
        let folded = fold(&mut pool, e);
        assert_eq!(pool.as_constant(folded), Some(0.0));
        let e = pool.binary(BinaryOp::Mul, one, x);
        assert_eq!(fold(&mut pool, e), x);
        let e = pool.binary(BinaryOp::Rem, zero, x);
        let folded = fold(&mut pool, e);
        assert_eq!(pool.as_constant(folded), Some(0.0));
        let e = pool.binary(BinaryOp::Rem, x, x);
        let folded = fold(&mut pool, e);
        assert_eq!(pool.as_constant(folded), Some(0.0));
    }

    #[test]
    fn negative_zero_keeps_its_sign() {
        let mut pool = ExprPool::new();
        let one = pool.constant(1.0);
        let minus_one = pool.constant(-1.0);
        let zero = pool.constant(0.0);
        let negative_zero = pool.binary(BinaryOp::Mul, minus_one, zero);
        let e = pool.binary(BinaryOp::Div, one, negative_zero);
        let folded = fold(&mut pool, e);
        assert_eq!(pool.as_constant(folded), Some(f32::NEG_INFINITY));

        let x = pool.input(0);
        let minus_zero = pool.constant(-0.0);
        let e = pool.binary(BinaryOp::Add, minus_zero, x);
        assert_eq!(fold(&mut pool, e), x);
    }

    #[test]
    fn power_rules_apply_in_order() {
        let mut pool = ExprPool::new();
        let x = pool.input(0);
        let zero = pool.constant(0.0);
        let one = pool.constant(1.0);
        let two = pool.constant(2.0);

        let e = pool.binary(BinaryOp::Pow, x, zero);
        let folded = fold(&mut pool, e);
        assert_eq!(pool.as_constant(folded), Some(1.0));
        let e = pool.binary(BinaryOp::Pow, one, x);
        let folded = fold(&mut pool, e);
        assert_eq!(pool.as_constant(folded), Some(1.0));
        let e = pool.binary(BinaryOp::Pow, zero, x);
        let folded = fold(&mut pool, e);
        assert_eq!(pool.as_constant(folded), Some(0.0));
        let e = pool.binary(BinaryOp::Pow, x, one);
        assert_eq!(fold(&mut pool, e), x);
        let e = pool.binary(BinaryOp::Pow, x, two);
        let square = pool.binary(BinaryOp::Mul, x, x);
        assert_eq!(fold(&mut pool, e), square);
    }

    #[test]
    fn division_is_strength_reduced() {
        let mut pool = ExprPool::new();
        let x = pool.input(0);
        let one = pool.constant(1.0);
        let four = pool.constant(4.0);

        let e = pool.binary(BinaryOp::Div, x, one);
        assert_eq!(fold(&mut pool, e), x);
        let e = pool.binary(BinaryOp::Div, x, x);
        let folded = fold(&mut pool, e);
        assert_eq!(pool.as_constant(folded), Some(1.0));
        let e = pool.binary(BinaryOp::Div, x, four);
        let quarter = pool.constant(0.25);
        let expected = pool.binary(BinaryOp::Mul, x, quarter);
        assert_eq!(fold(&mut pool, e), expected);
    }

    #[test]
    fn identities_see_folded_operands() {
        let mut pool = ExprPool::new();
        let x = pool.input(0);
        let two = pool.constant(2.0);
        let zero = pool.constant(0.0);
        let diff = pool.binary(BinaryOp::Sub, two, two);
        let e = pool.binary(BinaryOp::Add, x, diff);
        assert_eq!(fold(&mut pool, e), x);
        // both sides fold to the same node
        let a = pool.binary(BinaryOp::Add, x, zero);
        let e = pool.binary(BinaryOp::Div, a, x);
        let folded = fold(&mut pool, e);
        assert_eq!(pool.as_constant(folded), Some(1.0));
    }

    #[test]
    fn mux_selection_is_clamped() {
        let mut pool = ExprPool::new();
        let a = pool.input(0);
        let b = pool.input(1);
        let c = pool.input(2);
        let five = pool.constant(5.0);
        let minus_one = pool.constant(-1.0);
        let one_half = pool.constant(1.5);

        let e = pool.mux(five, [a, b, c]).unwrap();
        assert_eq!(fold(&mut pool, e), c);
        let e = pool.mux(minus_one, [a, b, c]).unwrap();
        assert_eq!(fold(&mut pool, e), a);
        let e = pool.mux(one_half, [a, b, c]).unwrap();
        assert_eq!(fold(&mut pool, e), b);
    }

    #[test]
    fn mux_with_equal_operands_collapses() {
        let mut pool = ExprPool::new();
        let sel = pool.input(0);
        let a = pool.input(1);
        let b = pool.input(2);
        let e = pool.mux(sel, [a, a, a]).unwrap();
        assert_eq!(fold(&mut pool, e), a);
        let e = pool.mux(sel, [b]).unwrap();
        assert_eq!(fold(&mut pool, e), b);

        let zero = pool.constant(0.0);
        let b_plus_zero = pool.binary(BinaryOp::Add, b, zero);
        let e = pool.mux(sel, [b, b_plus_zero]).unwrap();
        assert_eq!(fold(&mut pool, e), b);

        let e = pool.mux(sel, [a, b]).unwrap();
        assert_eq!(fold(&mut pool, e), e);
    }

    #[test]
    fn shared_cache_returns_identical_results() {
        let mut pool = ExprPool::new();
        let x = pool.input(0);
        let y = pool.input(1);
        let three = pool.constant(3.0);
        let sum = pool.binary(BinaryOp::Add, x, y);
        let e = pool.binary(BinaryOp::Div, sum, three);

        let mut folding = ConstantFolding::default();
        let first = folding.optimize(&mut pool, e).unwrap();
        let cached = folding.cached();
        let size = pool.len();
        let second = folding.optimize(&mut pool, e).unwrap();
        assert_eq!(first, second);
        assert_eq!(folding.cached(), cached);
        assert_eq!(pool.len(), size);
    }

    #[test]
    fn optimizing_twice_reaches_a_fixed_point() {
        let mut pool = ExprPool::new();
        let x = pool.input(0);
        let y = pool.input(1);
        let zero = pool.constant(0.0);
        let two = pool.constant(2.0);
        let eight = pool.constant(8.0);
        let sq = pool.binary(BinaryOp::Pow, x, two);
        let scaled = pool.binary(BinaryOp::Div, sq, eight);
        let padded = pool.binary(BinaryOp::Add, zero, scaled);
        let sel = pool.binary(BinaryOp::Lt, y, x);
        let mux = pool.mux(sel, [padded, y]).unwrap();
        let g = pool
            .persist(vec![zero], |pool, state| {
                let grown = pool.binary(BinaryOp::Add, state[0], mux);
                Ok(vec![pool.binary(BinaryOp::Mul, grown, two)])
            })
            .unwrap();
        let out = pool.element(g, 0).unwrap();
        let root = pool.binary(BinaryOp::Sub, out, zero);

        let once = fold(&mut pool, root);
        let twice = fold(&mut pool, once);
        assert!(pool.equivalent(once, twice));
        assert!(!pool.equivalent(root, once));
    }

    #[test]
    fn self_referencing_groups_terminate() {
        let mut pool = ExprPool::new();
        let zero = pool.constant(0.0);
        let one = pool.constant(1.0);
        let g = pool.reserve_group();
        let previous = pool.element(g, 0).unwrap();
        let state = pool.state(g, 0).unwrap();
        let sum = pool.binary(BinaryOp::Add, previous, state);
        let next = pool.binary(BinaryOp::Mul, sum, one);
        pool.define_group(
            g,
            Group::Persist {
                initial: vec![zero],
                new_value: vec![next],
            },
        )
        .unwrap();

        let result = fold(&mut pool, previous);
        let Expr::Element { group, index } = *pool.get(result) else {
            panic!("expected a group element");
        };
        assert_eq!(index, 0);
        assert_ne!(group, g);
        let optimized = pool.group(group).unwrap().clone();
        let new_next = optimized.next_state()[0];
        let Expr::Binary(BinaryOp::Add, lhs, rhs) = *pool.get(new_next) else {
            panic!("expected the multiplication by one to fold away");
        };
        assert_eq!(*pool.get(lhs), Expr::Element { group, index: 0 });
        assert_eq!(*pool.get(rhs), Expr::State { group, slot: 0 });
        assert_eq!(StateDependency::groups(&pool, result), vec![group]);
    }

    #[test]
    fn dead_persist_state_is_removed() {
        let mut pool = ExprPool::new();
        let x = pool.input(0);
        let zero = pool.constant(0.0);
        let one = pool.constant(1.0);
        let g = pool
            .persist(vec![zero], |pool, state| {
                let ignored = pool.binary(BinaryOp::Mul, state[0], zero);
                Ok(vec![pool.binary(BinaryOp::Add, ignored, x)])
            })
            .unwrap();
        let out = pool.element(g, 0).unwrap();
        let e = pool.binary(BinaryOp::Add, out, one);

        let result = fold(&mut pool, e);
        let expected = pool.binary(BinaryOp::Add, x, one);
        assert_eq!(result, expected);
        assert!(StateDependency::groups(&pool, result).is_empty());
    }

    #[test]
    fn dead_loop_state_is_removed() {
        let mut pool = ExprPool::new();
        let x = pool.input(0);
        let zero = pool.constant(0.0);
        let ten = pool.constant(10.0);
        let g = pool
            .loop_group(vec![zero, zero], |pool, state| {
                let condition = pool.binary(BinaryOp::Lt, state[0], ten);
                let one = pool.constant(1.0);
                let counter = pool.binary(BinaryOp::Add, state[0], one);
                Ok((condition, vec![counter, x]))
            })
            .unwrap();
        let live = pool.element(g, 0).unwrap();
        let dead = pool.element(g, 1).unwrap();

        let mut folding = ConstantFolding::default();
        let live = folding.optimize(&mut pool, live).unwrap();
        let dead = folding.optimize(&mut pool, dead).unwrap();
        assert_eq!(dead, x);
        let Expr::Element { group, index: 0 } = *pool.get(live) else {
            panic!("expected the counter to stay in a loop");
        };
        assert_eq!(pool.group(group).unwrap().kind_name(), "loop");
    }

    #[test]
    fn other_group_state_does_not_keep_a_slot() {
        let mut pool = ExprPool::new();
        let x = pool.input(0);
        let zero = pool.constant(0.0);
        let inner = pool
            .persist(vec![zero], |pool, state| {
                Ok(vec![pool.binary(BinaryOp::Add, state[0], x)])
            })
            .unwrap();
        let inner_out = pool.element(inner, 0).unwrap();
        let outer = pool
            .persist(vec![zero], |_, _| Ok(vec![inner_out]))
            .unwrap();
        let e = pool.element(outer, 0).unwrap();

        let result = fold(&mut pool, e);
        let Expr::Element { group, .. } = *pool.get(result) else {
            panic!("expected the inner group to remain");
        };
        assert_eq!(StateDependency::groups(&pool, result), vec![group]);
        assert!(pool.equivalent(result, inner_out));
    }

    #[test]
    fn nested_reads_of_own_state_keep_a_slot() {
        let mut pool = ExprPool::new();
        let zero = pool.constant(0.0);
        let outer = pool.reserve_group();
        let outer_state = pool.state(outer, 0).unwrap();
        let inner = pool
            .persist(vec![outer_state], |_, state| Ok(vec![state[0]]))
            .unwrap();
        let inner_out = pool.element(inner, 0).unwrap();
        pool.define_group(
            outer,
            Group::Persist {
                initial: vec![zero],
                new_value: vec![inner_out],
            },
        )
        .unwrap();
        let e = pool.element(outer, 0).unwrap();

        let result = fold(&mut pool, e);
        let Expr::Element { group, .. } = *pool.get(result) else {
            panic!("expected the outer group to remain");
        };
        assert_ne!(group, outer);
        assert_eq!(StateDependency::groups(&pool, result).len(), 2);
    }

    #[test]
    fn groups_are_optimized_once() {
        let mut pool = ExprPool::new();
        let zero = pool.constant(0.0);
        let g = pool
            .persist(vec![zero, zero], |pool, state| {
                let one = pool.constant(1.0);
                Ok(vec![
                    pool.binary(BinaryOp::Add, state[0], one),
                    pool.binary(BinaryOp::Add, state[1], state[0]),
                ])
            })
            .unwrap();
        let mut folding = ConstantFolding::default();
        let a = folding.optimize_group(&mut pool, g).unwrap();
        let b = folding.optimize_group(&mut pool, g).unwrap();
        assert_eq!(a, b);
        let groups = pool.num_groups();
        let first = pool.element(g, 0).unwrap();
        let second = pool.element(g, 1).unwrap();
        let first = folding.optimize(&mut pool, first).unwrap();
        let second = folding.optimize(&mut pool, second).unwrap();
        assert_eq!(pool.num_groups(), groups);
        assert_eq!(*pool.get(first), Expr::Element { group: a, index: 0 });
        assert_eq!(*pool.get(second), Expr::Element { group: a, index: 1 });
    }

    #[test]
    fn undefined_groups_are_malformed() {
        let mut pool = ExprPool::new();
        let g = pool.reserve_group();
        let e = pool.element(g, 0).unwrap();
        assert!(ConstantFolding::default().optimize(&mut pool, e).is_err());
    }
}
