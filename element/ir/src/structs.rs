//! Structs as types: identity, constraint matching and construction.
use super::{
    intrinsics::{self, Intrinsic, IntrinsicConstraint},
    Activity, CompilationContext, DeclRef, Env, MessageCode, Port,
    StructInstance, Trace, TypeIdentity, Value,
};
use element_frontend::{DeclKind, Expression};
use element_utils::ElementResult;
use linked_hash_map::LinkedHashMap;
use std::rc::Rc;

/// What a port or return type accepts, compared when matching a function
/// against a declared constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConstraintKey {
    Any,
    Struct(TypeIdentity),
    Constraint(DeclRef),
    Error,
}

impl CompilationContext {
    /// `decl` followed by the structs it aliases, ending with a struct that
    /// is not an alias. `None` after reporting a broken or cyclic chain.
    pub(crate) fn alias_chain(
        &mut self,
        decl: DeclRef,
        trace: &Trace,
    ) -> ElementResult<Option<Vec<DeclRef>>> {
        let mut chain = vec![decl];
        let mut current = self.decl_rc(decl);
        while let Some(target) = current.declared_type.clone().filter(|_| current.is_alias()) {
            let env = self.static_env(current.parent);
            let resolved = self.resolve_expression(&target, &env, trace)?;
            let next = match resolved {
                Value::Struct(next) => next,
                Value::Error => return Ok(None),
                other => {
                    let desc = self.describe(&other);
                    self.report(
                        MessageCode::IntrinsicCannotHaveBody,
                        format!(
                            "Cannot create alias of non-struct: '{}' aliases {desc}",
                            current.qualified_name
                        ),
                        trace,
                    )?;
                    return Ok(None);
                }
            };
            if chain.contains(&next) {
                self.report(
                    MessageCode::CircularCompilation,
                    format!("'{}' aliases itself", self.declaration(decl).qualified_name),
                    trace,
                )?;
                return Ok(None);
            }
            chain.push(next);
            current = self.decl_rc(next);
        }
        Ok(Some(chain))
    }

    /// The identity values of struct `decl` are compared by. Aliases share
    /// the identity of the struct they alias, and intrinsic structs are
    /// identified by their implementation.
    pub fn struct_identity(
        &mut self,
        decl: DeclRef,
        trace: &Trace,
    ) -> ElementResult<Option<TypeIdentity>> {
        let Some(chain) = self.alias_chain(decl, trace)? else {
            return Ok(None);
        };
        let canonical = chain[chain.len() - 1];
        let declaration = self.declaration(canonical);
        if declaration.intrinsic {
            if let Some(Intrinsic::Struct(kind)) =
                intrinsics::lookup(&declaration.qualified_name)
            {
                return Ok(Some(TypeIdentity::Intrinsic(kind)));
            }
        }
        Ok(Some(TypeIdentity::Declared(canonical)))
    }

    /// The type identity of a value. Only numbers, booleans and struct
    /// instances have one.
    pub fn value_identity(
        &mut self,
        value: &Value,
        trace: &Trace,
    ) -> ElementResult<Option<TypeIdentity>> {
        match value {
            Value::Num(_) => Ok(Some(TypeIdentity::Intrinsic(intrinsics::IntrinsicStruct::Num))),
            Value::Bool(_) => Ok(Some(TypeIdentity::Intrinsic(intrinsics::IntrinsicStruct::Bool))),
            Value::Instance(inst) => self.struct_identity(inst.declaring(), trace),
            _ => Ok(None),
        }
    }

    /// Resolve a port or return type. Anything but a struct or a constraint
    /// is reported and resolves to the error sentinel.
    pub(crate) fn resolve_constraint(
        &mut self,
        expr: &Expression,
        env: &Rc<Env>,
        trace: &Trace,
    ) -> ElementResult<Value> {
        match self.resolve_expression(expr, env, trace)? {
            value @ (Value::Struct(_) | Value::Constraint(_) | Value::Error) => Ok(value),
            other => {
                let desc = self.describe(&other);
                self.log_error(
                    MessageCode::TypeError,
                    format!("'{expr}' is {desc}, which is not a struct or constraint"),
                    trace,
                )
            }
        }
    }

    /// Whether `value` satisfies a resolved constraint.
    pub fn matches_constraint(
        &mut self,
        value: &Value,
        constraint: &Value,
        trace: &Trace,
    ) -> ElementResult<bool> {
        match (value, constraint) {
            (Value::Error, _) | (_, Value::Error) => Ok(true),
            (_, Value::Struct(decl)) => {
                let expected = self.struct_identity(*decl, trace)?;
                let actual = self.value_identity(value, trace)?;
                Ok(match (actual, expected) {
                    (Some(actual), Some(expected)) => actual == expected,
                    // a broken alias has already been reported
                    (_, None) => true,
                    (None, _) => false,
                })
            }
            (_, Value::Constraint(decl)) => self.matches_declared_constraint(value, *decl, trace),
            _ => Ok(false),
        }
    }

    fn matches_declared_constraint(
        &mut self,
        value: &Value,
        decl: DeclRef,
        trace: &Trace,
    ) -> ElementResult<bool> {
        let constraint = self.decl_rc(decl);
        if constraint.intrinsic {
            return Ok(match intrinsics::lookup(&constraint.qualified_name) {
                Some(Intrinsic::Constraint(IntrinsicConstraint::Any)) => true,
                _ => false,
            });
        }
        let Value::Function(function) = value else {
            return Ok(false);
        };
        let candidate = self.decl_rc(function.decl);
        let remaining = candidate.inputs().get(function.bound.len()..).unwrap_or(&[]);
        if remaining.len() != constraint.inputs().len() {
            return Ok(false);
        }
        let constraint_env = self.static_env(constraint.parent);
        for (port, expected) in remaining.iter().zip(constraint.inputs()) {
            let actual = self.constraint_key(port.constraint.as_deref(), &function.env, trace)?;
            let expected =
                self.constraint_key(expected.constraint.as_deref(), &constraint_env, trace)?;
            if actual != expected && actual != ConstraintKey::Error && expected != ConstraintKey::Error {
                return Ok(false);
            }
        }
        let actual = self.constraint_key(candidate.declared_type.as_deref(), &function.env, trace)?;
        let expected =
            self.constraint_key(constraint.declared_type.as_deref(), &constraint_env, trace)?;
        Ok(actual == expected || actual == ConstraintKey::Error || expected == ConstraintKey::Error)
    }

    fn constraint_key(
        &mut self,
        expr: Option<&Expression>,
        env: &Rc<Env>,
        trace: &Trace,
    ) -> ElementResult<ConstraintKey> {
        let Some(expr) = expr else {
            return Ok(ConstraintKey::Any);
        };
        Ok(match self.resolve_constraint(expr, env, trace)? {
            Value::Struct(decl) => match self.struct_identity(decl, trace)? {
                Some(identity) => ConstraintKey::Struct(identity),
                None => ConstraintKey::Error,
            },
            Value::Constraint(decl) => {
                let constraint = self.declaration(decl);
                match intrinsics::lookup(&constraint.qualified_name) {
                    Some(Intrinsic::Constraint(IntrinsicConstraint::Any))
                        if constraint.intrinsic =>
                    {
                        ConstraintKey::Any
                    }
                    _ => ConstraintKey::Constraint(decl),
                }
            }
            _ => ConstraintKey::Error,
        })
    }

    /// Whether `value` may be bound to `port`, whose type is resolved in
    /// `env`. Untyped ports accept everything.
    pub(crate) fn matches_port(
        &mut self,
        port: &Port,
        value: &Value,
        env: &Rc<Env>,
        trace: &Trace,
    ) -> ElementResult<bool> {
        match &port.constraint {
            None => Ok(true),
            Some(expr) => {
                let constraint = self.resolve_constraint(expr, env, trace)?;
                self.matches_constraint(value, &constraint, trace)
            }
        }
    }

    /// Check `args` against `ports`. Every port is checked and every
    /// mismatch is reported.
    pub(crate) fn check_ports(
        &mut self,
        ports: &[Port],
        args: &[Value],
        env: &Rc<Env>,
        trace: &Trace,
    ) -> ElementResult<bool> {
        let mut ok = true;
        for (port, arg) in ports.iter().zip(args) {
            if !self.matches_port(port, arg, env, trace)? {
                let constraint = port
                    .constraint
                    .as_ref()
                    .map(|c| c.to_string())
                    .unwrap_or_default();
                self.report(
                    MessageCode::ConstraintNotSatisfied,
                    format!(
                        "Value given for port '{}' does not match '{constraint}' constraint",
                        port.name
                    ),
                    trace,
                )?;
                ok = false;
            }
        }
        Ok(ok)
    }

    /// Call struct `decl` as a constructor. The instance records
    /// `instance_type`, the struct that was called, even when `decl` is the
    /// target of an alias.
    pub fn call_struct(
        &mut self,
        decl: DeclRef,
        args: Vec<Value>,
        instance_type: DeclRef,
        trace: &Trace,
    ) -> ElementResult<Value> {
        let declaration = self.decl_rc(decl);
        debug_assert_eq!(declaration.kind, DeclKind::Struct);
        let trace = trace.push(declaration.trace_site(), Activity::Call(decl));

        if declaration.is_alias() {
            let Some(chain) = self.alias_chain(decl, &trace)? else {
                return Ok(Value::Error);
            };
            let target = chain[chain.len() - 1];
            return self.call_struct(target, args, instance_type, &trace);
        }

        if declaration.intrinsic {
            return match intrinsics::lookup(&declaration.qualified_name) {
                Some(Intrinsic::Struct(kind)) => self.construct_intrinsic(kind, &args, &trace),
                _ => self.log_error(
                    MessageCode::IntrinsicNotImplemented,
                    format!("Intrinsic '{}' is not implemented", declaration.qualified_name),
                    &trace,
                ),
            };
        }

        let ports = declaration.inputs();
        if args.len() != ports.len() {
            return self.log_error(
                MessageCode::ArgumentCountMismatch,
                format!("Expected '{}' arguments but got '{}'", ports.len(), args.len()),
                &trace,
            );
        }
        let env = self.static_env(declaration.lookup_scope());
        if !self.check_ports(ports, &args, &env, &trace)? {
            return Ok(Value::Error);
        }
        let fields: LinkedHashMap<_, _> =
            ports.iter().map(|port| port.name).zip(args).collect();
        Ok(Value::Instance(Rc::new(StructInstance::new(
            instance_type,
            fields,
            &self.pool,
        ))))
    }
}

#[cfg(test)]
mod tests {
    use crate::{CompilationContext, CompilationInput, Trace, Value};
    use element_frontend::{PRELUDE, PRELUDE_NAME};

    fn context(text: &str) -> CompilationContext {
        let mut ctx = CompilationContext::new(CompilationInput::default()).unwrap();
        ctx.add_source(PRELUDE_NAME, PRELUDE).unwrap();
        assert!(ctx.add_source("test.ele", text).unwrap());
        ctx
    }

    fn codes(ctx: &CompilationContext) -> Vec<u32> {
        ctx.messages().iter().filter_map(|m| m.code).collect()
    }

    fn struct_value(ctx: &mut CompilationContext, name: &str) -> Value {
        let value = ctx.compile_expression(name).unwrap();
        assert!(matches!(value, Value::Struct(_)));
        value
    }

    #[test]
    fn identical_structs_are_distinct_types() {
        let mut ctx = context("struct A(x:Num); struct B(x:Num); a = A(1);");
        let a = ctx.compile_expression("a").unwrap();
        let ty_a = struct_value(&mut ctx, "A");
        let ty_b = struct_value(&mut ctx, "B");
        let trace = Trace::empty();
        assert!(ctx.matches_constraint(&a, &ty_a, &trace).unwrap());
        assert!(!ctx.matches_constraint(&a, &ty_b, &trace).unwrap());
    }

    #[test]
    fn intrinsic_values_match_however_built() {
        let mut ctx = context("");
        let literal = ctx.compile_expression("3").unwrap();
        let constructed = ctx.compile_expression("Num(3)").unwrap();
        let computed = ctx.compile_expression("Num.add(1, 2)").unwrap();
        let num = struct_value(&mut ctx, "Num");
        let bool_ty = struct_value(&mut ctx, "Bool");
        let trace = Trace::empty();
        for value in [&literal, &constructed, &computed] {
            assert!(ctx.matches_constraint(value, &num, &trace).unwrap());
            assert!(!ctx.matches_constraint(value, &bool_ty, &trace).unwrap());
        }
        let flag = ctx.compile_expression("Bool(3)").unwrap();
        assert!(ctx.matches_constraint(&flag, &bool_ty, &trace).unwrap());
    }

    #[test]
    fn aliases_share_the_target_identity() {
        let mut ctx = context("struct A(x:Num); struct Alias:A; a = Alias(1); b = A(2);");
        let alias = struct_value(&mut ctx, "Alias");
        let target = struct_value(&mut ctx, "A");
        let a = ctx.compile_expression("a").unwrap();
        let b = ctx.compile_expression("b").unwrap();
        let trace = Trace::empty();
        assert!(ctx.matches_constraint(&a, &target, &trace).unwrap());
        assert!(ctx.matches_constraint(&b, &alias, &trace).unwrap());
        let Value::Instance(inst) = a else {
            panic!("expected an instance")
        };
        assert_eq!(
            ctx.declaration(inst.declaring()).qualified_name,
            "Alias"
        );
        assert!(codes(&ctx).is_empty());
    }

    #[test]
    fn wrong_argument_count_makes_no_instance() {
        let mut ctx = context("struct V(x:Num, y:Num);");
        assert!(ctx.compile_expression("V(1)").unwrap().is_error());
        assert_eq!(codes(&ctx), vec![6]);
    }

    #[test]
    fn every_port_mismatch_is_reported() {
        let mut ctx = context("struct V(x:Num, y:Num); struct W(a:V, b:V, c:Num);");
        assert!(ctx.compile_expression("W(1, 2, 3)").unwrap().is_error());
        assert_eq!(codes(&ctx), vec![8, 8]);
        let context = &ctx.messages()[0].context;
        assert!(context.contains("port 'a'"), "{context}");
        assert!(context.contains("'V'"), "{context}");
    }

    #[test]
    fn functions_match_declared_constraints() {
        let mut ctx = context(
            "constraint Unary(a:Num):Num;
             inc(a:Num):Num = a.add(1);
             both(a:Num, b:Num):Num = a;
             apply(f:Unary, x:Num) = f(x);",
        );
        let ok = ctx.compile_expression("apply(inc, 1)").unwrap();
        assert!(matches!(ok, Value::Num(_)));
        let bad = ctx.compile_expression("apply(both, 1)").unwrap();
        assert!(bad.is_error());
        assert_eq!(codes(&ctx), vec![8]);
        let bound = ctx.compile_expression("apply(2.add, 1)").unwrap();
        assert!(matches!(bound, Value::Num(_)));
    }

    #[test]
    fn constraints_must_be_types() {
        let mut ctx = context("one = 1; f(x:one) = x;");
        // the broken constraint is reported once and then accepts the
        // argument so the call still produces a value
        let value = ctx.compile_expression("f(1)").unwrap();
        assert!(matches!(value, Value::Num(_)));
        assert_eq!(codes(&ctx), vec![14]);
        assert!(ctx.has_errors());
    }

    #[test]
    fn any_accepts_everything() {
        let mut ctx = context("struct S(v:Any); f(x:Any) = x;");
        assert!(!ctx.compile_expression("S(S(1))").unwrap().is_error());
        assert!(!ctx.compile_expression("f(f)").unwrap().is_error());
        assert!(codes(&ctx).is_empty());
    }
}
