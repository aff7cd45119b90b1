use element_ir::{ExprPool, ExprRef, GroupRef};
use std::collections::HashSet;

/// Answers whether an expression reads the carried state of a group.
pub struct StateDependency;

impl StateDependency {
    /// Whether `expr` reaches a `State` or `Element` node of `group`.
    ///
    /// The walk passes through the defining expressions of every other group
    /// it meets, so a slot that reads a nested group which in turn reads
    /// `group` counts as dependent. Nodes of other groups are not dependencies
    /// by themselves.
    pub fn depends_on(pool: &ExprPool, expr: ExprRef, group: GroupRef) -> bool {
        let mut visited: HashSet<ExprRef> = HashSet::new();
        let mut entered: HashSet<GroupRef> = HashSet::new();
        let mut pending = vec![expr];
        while let Some(e) = pending.pop() {
            if !visited.insert(e) {
                continue;
            }
            let node = pool.get(e);
            match node.group() {
                Some(g) if g == group => return true,
                Some(g) => {
                    if entered.insert(g) {
                        if let Some(def) = pool.group(g) {
                            pending.extend(def.defining_exprs());
                        }
                    }
                }
                None => pending.extend(node.operands()),
            }
        }
        false
    }

    /// Groups reachable from `expr`, in the order they are first met.
    pub fn groups(pool: &ExprPool, expr: ExprRef) -> Vec<GroupRef> {
        let mut visited: HashSet<ExprRef> = HashSet::new();
        let mut seen: HashSet<GroupRef> = HashSet::new();
        let mut order = Vec::new();
        let mut pending = vec![expr];
        while let Some(e) = pending.pop() {
            if !visited.insert(e) {
                continue;
            }
            let node = pool.get(e);
            pending.extend(node.operands());
            if let Some(g) = node.group() {
                if seen.insert(g) {
                    order.push(g);
                    if let Some(def) = pool.group(g) {
                        pending.extend(def.defining_exprs());
                    }
                }
            }
        }
        order
    }
}

#[cfg(test)]
mod tests {
    use super::StateDependency;
    use element_ir::{BinaryOp, ExprPool};

    #[test]
    fn direct_state_reads_are_dependencies() {
        let mut pool = ExprPool::new();
        let zero = pool.constant(0.0);
        let g = pool
            .persist(vec![zero], |pool, state| {
                let one = pool.constant(1.0);
                Ok(vec![pool.binary(BinaryOp::Add, state[0], one)])
            })
            .unwrap();
        let next = pool.group(g).unwrap().next_state()[0];
        assert!(StateDependency::depends_on(&pool, next, g));
        assert!(!StateDependency::depends_on(&pool, zero, g));
    }

    #[test]
    fn other_groups_are_followed_not_counted() {
        let mut pool = ExprPool::new();
        let zero = pool.constant(0.0);
        let inner = pool
            .persist(vec![zero], |_, state| Ok(vec![state[0]]))
            .unwrap();
        let inner_out = pool.element(inner, 0).unwrap();
        // reads another group's output but never its own state
        let outer = pool
            .persist(vec![zero], |_, _| Ok(vec![inner_out]))
            .unwrap();
        let next = pool.group(outer).unwrap().next_state()[0];
        assert!(!StateDependency::depends_on(&pool, next, outer));
        assert_eq!(StateDependency::groups(&pool, next), vec![inner]);
    }

    #[test]
    fn nested_groups_reading_back_are_dependencies() {
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
            element_ir::Group::Persist {
                initial: vec![zero],
                new_value: vec![inner_out],
            },
        )
        .unwrap();
        assert!(StateDependency::depends_on(&pool, inner_out, outer));
        assert_eq!(StateDependency::groups(&pool, inner_out), vec![inner, outer]);
    }
}
