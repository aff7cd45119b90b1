//! Implements a formatter for the expression graph.
//! Expressions are printed as trees; groups are printed once, after the
//! expressions that refer to them, and referenced by handle.
use super::{Expr, ExprPool, ExprRef, Group, GroupRef};
use itertools::Itertools;
use std::collections::HashSet;
use std::io;

/// Printer for the expression graph.
pub struct Printer;

impl Printer {
    /// Render a single expression without the groups it refers to.
    pub fn expr_to_str(pool: &ExprPool, expr: ExprRef) -> String {
        match pool.get(expr) {
            Expr::Constant(n) => n.to_string(),
            Expr::Input(idx) => format!("input({idx})"),
            Expr::Unary(op, a) => {
                format!("{op}({})", Self::expr_to_str(pool, *a))
            }
            Expr::Binary(op, a, b) => format!(
                "{op}({}, {})",
                Self::expr_to_str(pool, *a),
                Self::expr_to_str(pool, *b)
            ),
            Expr::Mux(sel, ops) => format!(
                "mux({}, [{}])",
                Self::expr_to_str(pool, *sel),
                ops.iter().map(|op| Self::expr_to_str(pool, *op)).join(", ")
            ),
            Expr::State { group, slot } => {
                format!("state(#{}, {slot})", group.index())
            }
            Expr::Element { group, index } => {
                format!("#{}[{index}]", group.index())
            }
        }
    }

    /// Groups reachable from `roots`, in the order they are first reached.
    pub fn reachable_groups(pool: &ExprPool, roots: &[ExprRef]) -> Vec<GroupRef> {
        let mut order = Vec::new();
        let mut seen_groups = HashSet::new();
        let mut seen = HashSet::new();
        let mut pending: Vec<ExprRef> = roots.iter().rev().copied().collect();
        while let Some(e) = pending.pop() {
            if !seen.insert(e) {
                continue;
            }
            let node = pool.get(e);
            if let Some(group) = node.group() {
                if seen_groups.insert(group) {
                    order.push(group);
                    if let Some(def) = pool.group(group) {
                        pending.extend(def.defining_exprs().collect_vec().into_iter().rev());
                    }
                }
            }
            pending.extend(node.operands().into_iter().rev());
        }
        order
    }

    pub fn write_group<F: io::Write>(
        pool: &ExprPool,
        handle: GroupRef,
        f: &mut F,
    ) -> io::Result<()> {
        let fmt_list = |exprs: &[ExprRef]| {
            exprs.iter().map(|e| Self::expr_to_str(pool, *e)).join(", ")
        };
        match pool.group(handle) {
            None => writeln!(f, "#{} = <undefined>", handle.index()),
            Some(Group::Persist { initial, new_value }) => {
                writeln!(f, "#{} = persist {{", handle.index())?;
                writeln!(f, "  initial: [{}]", fmt_list(initial))?;
                writeln!(f, "  next: [{}]", fmt_list(new_value))?;
                writeln!(f, "}}")
            }
            Some(Group::Loop {
                initial,
                condition,
                body,
            }) => {
                writeln!(f, "#{} = loop {{", handle.index())?;
                writeln!(f, "  initial: [{}]", fmt_list(initial))?;
                writeln!(
                    f,
                    "  condition: {}",
                    Self::expr_to_str(pool, *condition)
                )?;
                writeln!(f, "  body: [{}]", fmt_list(body))?;
                writeln!(f, "}}")
            }
        }
    }

    /// Write each named expression followed by every group they reach.
    pub fn write_graph<F: io::Write>(
        pool: &ExprPool,
        outputs: &[(String, ExprRef)],
        f: &mut F,
    ) -> io::Result<()> {
        for (name, expr) in outputs {
            writeln!(f, "{name} = {}", Self::expr_to_str(pool, *expr))?;
        }
        let roots = outputs.iter().map(|(_, e)| *e).collect_vec();
        for group in Self::reachable_groups(pool, &roots) {
            Self::write_group(pool, group, f)?;
        }
        Ok(())
    }
}
