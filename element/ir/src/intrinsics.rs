//! Host implementations of intrinsic declarations.
//!
//! An `intrinsic` declaration in source is bound to one of these by its
//! qualified name. Structs construct values, constraints match values and
//! functions build expression graph nodes.
use super::{
    BinaryOp, CompilationContext, ExprRef, Group, GroupRef, MessageCode,
    StructInstance, Trace, UnaryOp, Value,
};
use element_utils::ElementResult;
use itertools::Itertools;
use lazy_static::lazy_static;
use linked_hash_map::LinkedHashMap;
use std::collections::HashMap;
use std::rc::Rc;
use strum::IntoEnumIterator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntrinsicStruct {
    Num,
    Bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntrinsicConstraint {
    /// Matches every value.
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntrinsicFunction {
    Unary(UnaryOp),
    Binary(BinaryOp),
    If,
    Persist,
    For,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intrinsic {
    Struct(IntrinsicStruct),
    Constraint(IntrinsicConstraint),
    Function(IntrinsicFunction),
}

lazy_static! {
    static ref INTRINSICS: HashMap<String, Intrinsic> = {
        let mut map = HashMap::new();
        map.insert("Num".to_string(), Intrinsic::Struct(IntrinsicStruct::Num));
        map.insert("Bool".to_string(), Intrinsic::Struct(IntrinsicStruct::Bool));
        map.insert(
            "Any".to_string(),
            Intrinsic::Constraint(IntrinsicConstraint::Any),
        );
        for op in UnaryOp::iter().filter(|op| !op.is_logical()) {
            map.insert(
                format!("Num.{op}"),
                Intrinsic::Function(IntrinsicFunction::Unary(op)),
            );
        }
        for op in BinaryOp::iter()
            .filter(|op| !matches!(op, BinaryOp::And | BinaryOp::Or))
        {
            map.insert(
                format!("Num.{op}"),
                Intrinsic::Function(IntrinsicFunction::Binary(op)),
            );
        }
        map.insert(
            "Bool.not".to_string(),
            Intrinsic::Function(IntrinsicFunction::Unary(UnaryOp::Not)),
        );
        for op in [BinaryOp::And, BinaryOp::Or] {
            map.insert(
                format!("Bool.{op}"),
                Intrinsic::Function(IntrinsicFunction::Binary(op)),
            );
        }
        map.insert("if".to_string(), Intrinsic::Function(IntrinsicFunction::If));
        map.insert(
            "persist".to_string(),
            Intrinsic::Function(IntrinsicFunction::Persist),
        );
        map.insert("for".to_string(), Intrinsic::Function(IntrinsicFunction::For));
        map
    };
}

/// The implementation registered under `qualified_name`.
pub fn lookup(qualified_name: &str) -> Option<Intrinsic> {
    INTRINSICS.get(qualified_name).copied()
}

/// Qualified names of every registered intrinsic, sorted.
pub fn names() -> Vec<&'static str> {
    INTRINSICS.keys().map(String::as_str).sorted().collect()
}

impl CompilationContext {
    /// Construct a value of an intrinsic struct.
    pub(crate) fn construct_intrinsic(
        &mut self,
        kind: IntrinsicStruct,
        args: &[Value],
        trace: &Trace,
    ) -> ElementResult<Value> {
        let [arg] = args else {
            return self.log_error(
                MessageCode::ArgumentCountMismatch,
                format!("Expected '1' arguments but got '{}'", args.len()),
                trace,
            );
        };
        let Some(expr) = self.operand(arg, trace)? else {
            return Ok(Value::Error);
        };
        Ok(match (kind, arg) {
            (IntrinsicStruct::Num, _) => Value::Num(expr),
            (IntrinsicStruct::Bool, Value::Bool(_)) => Value::Bool(expr),
            (IntrinsicStruct::Bool, _) => {
                let zero = self.pool.constant(0.0);
                Value::Bool(self.pool.binary(BinaryOp::Neq, expr, zero))
            }
        })
    }

    /// Run an intrinsic function. Argument count and port constraints have
    /// already been checked against the declaration.
    pub(crate) fn call_intrinsic(
        &mut self,
        function: IntrinsicFunction,
        args: &[Value],
        trace: &Trace,
    ) -> ElementResult<Value> {
        match (function, args) {
            (IntrinsicFunction::Unary(op), [a]) => {
                let Some(a) = self.operand(a, trace)? else {
                    return Ok(Value::Error);
                };
                let expr = self.pool.unary(op, a);
                Ok(if op.is_logical() {
                    Value::Bool(expr)
                } else {
                    Value::Num(expr)
                })
            }
            (IntrinsicFunction::Binary(op), [a, b]) => {
                let (Some(a), Some(b)) =
                    (self.operand(a, trace)?, self.operand(b, trace)?)
                else {
                    return Ok(Value::Error);
                };
                let expr = self.pool.binary(op, a, b);
                Ok(if op.is_logical() {
                    Value::Bool(expr)
                } else {
                    Value::Num(expr)
                })
            }
            (IntrinsicFunction::If, [condition, if_true, if_false]) => {
                let Some(condition) = self.operand(condition, trace)? else {
                    return Ok(Value::Error);
                };
                self.select(condition, if_true, if_false, trace)
            }
            (IntrinsicFunction::Persist, [initial, next]) => {
                self.build_persist(initial, next, trace)
            }
            (IntrinsicFunction::For, [initial, condition, body]) => {
                self.build_loop(initial, condition, body, trace)
            }
            _ => self.log_error(
                MessageCode::ArgumentCountMismatch,
                format!(
                    "Intrinsic {function:?} cannot take '{}' arguments",
                    args.len()
                ),
                trace,
            ),
        }
    }

    /// The graph node of a numeric argument. Reports a type error for
    /// anything else.
    fn operand(
        &mut self,
        value: &Value,
        trace: &Trace,
    ) -> ElementResult<Option<ExprRef>> {
        match value {
            Value::Num(e) | Value::Bool(e) => Ok(Some(*e)),
            Value::Error => Ok(None),
            other => {
                let desc = self.describe(other);
                self.log_error(
                    MessageCode::TypeError,
                    format!("Expected a Num or Bool but got {desc}"),
                    trace,
                )?;
                Ok(None)
            }
        }
    }

    /// `Mux(condition, [if_false, if_true])`, applied field by field to
    /// instances of the same struct.
    fn select(
        &mut self,
        condition: ExprRef,
        if_true: &Value,
        if_false: &Value,
        trace: &Trace,
    ) -> ElementResult<Value> {
        match (if_true, if_false) {
            (Value::Error, _) | (_, Value::Error) => Ok(Value::Error),
            (Value::Num(t), Value::Num(f)) => {
                Ok(Value::Num(self.pool.mux(condition, [*f, *t])?))
            }
            (Value::Bool(t), Value::Bool(f)) => {
                Ok(Value::Bool(self.pool.mux(condition, [*f, *t])?))
            }
            (Value::Instance(t), Value::Instance(f))
                if self.value_identity(if_true, trace)?
                    == self.value_identity(if_false, trace)? =>
            {
                let mut fields = LinkedHashMap::new();
                for ((name, tv), fv) in
                    t.fields().iter().zip(f.fields().values())
                {
                    let selected = self.select(condition, tv, fv, trace)?;
                    if selected.is_error() {
                        return Ok(Value::Error);
                    }
                    fields.insert(*name, selected);
                }
                Ok(Value::Instance(Rc::new(StructInstance::new(
                    t.declaring(),
                    fields,
                    &self.pool,
                ))))
            }
            (t, f) => {
                let (t, f) = (self.describe(t), self.describe(f));
                self.log_error(
                    MessageCode::TypeError,
                    format!("Branches of 'if' have different types: {t} and {f}"),
                    trace,
                )
            }
        }
    }

    fn build_persist(
        &mut self,
        initial: &Value,
        next: &Value,
        trace: &Trace,
    ) -> ElementResult<Value> {
        let Some(slots) = self.state_slots(initial, "persist", trace)? else {
            return Ok(Value::Error);
        };
        let group = self.pool.reserve_group();
        let states = self.pool.states(group, slots.len())?;
        let state = initial.with_leaves(&mut states.into_iter(), &self.pool);

        let next_value = self.call_value(next.clone(), vec![state], trace)?;
        let Some(new_value) =
            self.next_state(&next_value, slots.len(), "persist", trace)?
        else {
            return Ok(Value::Error);
        };

        log::trace!("persist group #{} with {} slots", group.index(), slots.len());
        self.pool.define_group(
            group,
            Group::Persist {
                initial: slots,
                new_value,
            },
        )?;
        self.group_outputs(initial, group)
    }

    fn build_loop(
        &mut self,
        initial: &Value,
        condition: &Value,
        body: &Value,
        trace: &Trace,
    ) -> ElementResult<Value> {
        let Some(slots) = self.state_slots(initial, "for", trace)? else {
            return Ok(Value::Error);
        };
        let group = self.pool.reserve_group();
        let states = self.pool.states(group, slots.len())?;
        let state = initial.with_leaves(&mut states.into_iter(), &self.pool);

        let condition =
            self.call_value(condition.clone(), vec![state.clone()], trace)?;
        let Some(condition) = self.operand(&condition, trace)? else {
            return Ok(Value::Error);
        };
        let body_value = self.call_value(body.clone(), vec![state], trace)?;
        let Some(body) = self.next_state(&body_value, slots.len(), "for", trace)?
        else {
            return Ok(Value::Error);
        };

        log::trace!("loop group #{} with {} slots", group.index(), slots.len());
        self.pool.define_group(
            group,
            Group::Loop {
                initial: slots,
                condition,
                body,
            },
        )?;
        self.group_outputs(initial, group)
    }

    fn state_slots(
        &mut self,
        initial: &Value,
        what: &str,
        trace: &Trace,
    ) -> ElementResult<Option<Vec<ExprRef>>> {
        if initial.is_error() {
            return Ok(None);
        }
        match initial.flatten() {
            Some(slots) if !slots.is_empty() => Ok(Some(slots)),
            _ => {
                let desc = self.describe(initial);
                self.log_error(
                    MessageCode::TypeError,
                    format!(
                        "State of '{what}' must be made of Num and Bool values, got {desc}"
                    ),
                    trace,
                )?;
                Ok(None)
            }
        }
    }

    fn next_state(
        &mut self,
        value: &Value,
        size: usize,
        what: &str,
        trace: &Trace,
    ) -> ElementResult<Option<Vec<ExprRef>>> {
        if value.is_error() {
            return Ok(None);
        }
        match value.flatten() {
            Some(next) if next.len() == size => Ok(Some(next)),
            _ => {
                let desc = self.describe(value);
                self.log_error(
                    MessageCode::TypeError,
                    format!(
                        "Next state of '{what}' must have the shape of its initial state, got {desc}"
                    ),
                    trace,
                )?;
                Ok(None)
            }
        }
    }

    fn group_outputs(
        &mut self,
        shape: &Value,
        group: GroupRef,
    ) -> ElementResult<Value> {
        let size = self.pool.group(group).map_or(0, |g| g.size());
        let elements = (0..size)
            .map(|idx| self.pool.element(group, idx))
            .collect::<ElementResult<Vec<_>>>()?;
        Ok(shape.with_leaves(&mut elements.into_iter(), &self.pool))
    }
}
