//! Calling values: functions, struct constructors and intrinsics.
use super::{
    intrinsics::{self, Intrinsic},
    value::same_values,
    CompilationContext, FunctionValue, MessageCode, StructInstance, Trace, Value,
};
use element_utils::ElementResult;
use linked_hash_map::LinkedHashMap;
use std::rc::Rc;

/// Nested calls of one function, each with different arguments, accepted
/// before the function is reported as recursive.
const MAX_CALL_DEPTH: usize = 64;

impl CompilationContext {
    /// Call `callee` with already resolved arguments. An error sentinel in
    /// any position makes the result an error without further diagnostics.
    pub fn call_value(
        &mut self,
        callee: Value,
        args: Vec<Value>,
        trace: &Trace,
    ) -> ElementResult<Value> {
        if callee.is_error() || args.iter().any(Value::is_error) {
            return Ok(Value::Error);
        }
        match callee {
            Value::Struct(decl) => self.call_struct(decl, args, decl, trace),
            Value::Function(function) => self.call_function(&function, args, trace),
            other => {
                let desc = self.describe(&other);
                self.log_error(
                    MessageCode::InvalidExpression,
                    format!("{desc} is not callable"),
                    trace,
                )
            }
        }
    }

    /// Call a function value. Bound arguments come before `args`.
    pub fn call_function(
        &mut self,
        function: &FunctionValue,
        args: Vec<Value>,
        trace: &Trace,
    ) -> ElementResult<Value> {
        let decl = self.decl_rc(function.decl);
        let ports = decl.inputs();
        let given = args.len();
        let mut all_args = function.bound.clone();
        all_args.extend(args);

        // intrinsics are re-entered legitimately, e.g. a persist inside the
        // next-value function of another persist
        if !decl.intrinsic {
            let mut depth = 0;
            let mut repeated = false;
            for previous in trace.calls(function.decl) {
                depth += 1;
                repeated |= same_values(previous, &all_args);
            }
            if repeated || depth >= MAX_CALL_DEPTH {
                return self.log_error(
                    MessageCode::CircularCompilation,
                    format!("Recursive call to '{}'", decl.qualified_name),
                    trace,
                );
            }
        }
        let trace = trace.push_call(decl.trace_site(), function.decl, &all_args);

        if all_args.len() != ports.len() {
            return self.log_error(
                MessageCode::ArgumentCountMismatch,
                format!(
                    "Expected '{}' arguments but got '{given}'",
                    ports.len().saturating_sub(function.bound.len())
                ),
                &trace,
            );
        }
        if !self.check_ports(ports, &all_args, &function.env, &trace)? {
            return Ok(Value::Error);
        }

        if decl.intrinsic {
            return match intrinsics::lookup(&decl.qualified_name) {
                Some(Intrinsic::Function(intrinsic)) => {
                    self.call_intrinsic(intrinsic, &all_args, &trace)
                }
                _ => self.log_error(
                    MessageCode::IntrinsicNotImplemented,
                    format!("Intrinsic '{}' is not implemented", decl.qualified_name),
                    &trace,
                ),
            };
        }

        let bindings: LinkedHashMap<_, _> =
            ports.iter().map(|port| port.name).zip(all_args).collect();
        let frame = self.frame(decl.body_scope(), bindings, &function.env);
        let result = self.evaluate_body(&decl, &frame, &trace)?;
        self.check_return(&decl, result, &function.env, &trace)
    }

    /// Placeholder arguments for calling `function` from a host: each
    /// `Num` or `Bool` port becomes an `Input` node and struct ports are
    /// built from their own ports recursively. Returns the arguments and the
    /// number of inputs, or `None` after reporting a port that cannot be
    /// supplied by a host.
    pub(crate) fn boundary_inputs(
        &mut self,
        function: &FunctionValue,
        trace: &Trace,
    ) -> ElementResult<Option<(Vec<Value>, usize)>> {
        let decl = self.decl_rc(function.decl);
        let mut next_input = 0;
        let mut args = Vec::new();
        for port in decl.inputs().iter().skip(function.bound.len()) {
            let ty = match &port.constraint {
                Some(expr) => self.resolve_constraint(expr, &function.env, trace)?,
                None => Value::Error,
            };
            let arg = match ty {
                Value::Struct(ty) => self.boundary_value(ty, &mut next_input, trace)?,
                _ => None,
            };
            match arg {
                Some(arg) => args.push(arg),
                None => {
                    self.report(
                        MessageCode::InvalidBoundaryFunctionInterface,
                        format!(
                            "Port '{}' of '{}' must be a Num, a Bool or a struct made of them",
                            port.name, decl.qualified_name
                        ),
                        trace,
                    )?;
                    return Ok(None);
                }
            }
        }
        Ok(Some((args, next_input)))
    }

    fn boundary_value(
        &mut self,
        ty: super::DeclRef,
        next_input: &mut usize,
        trace: &Trace,
    ) -> ElementResult<Option<Value>> {
        let Some(chain) = self.alias_chain(ty, trace)? else {
            return Ok(None);
        };
        let canonical = self.decl_rc(chain[chain.len() - 1]);
        if canonical.intrinsic {
            let input = self.pool.input(*next_input);
            *next_input += 1;
            return Ok(match intrinsics::lookup(&canonical.qualified_name) {
                Some(Intrinsic::Struct(intrinsics::IntrinsicStruct::Num)) => Some(Value::Num(input)),
                Some(Intrinsic::Struct(intrinsics::IntrinsicStruct::Bool)) => {
                    Some(Value::Bool(input))
                }
                _ => None,
            });
        }
        let env = self.static_env(canonical.lookup_scope());
        let mut fields = LinkedHashMap::new();
        for port in canonical.inputs() {
            let field = match &port.constraint {
                Some(expr) => match self.resolve_constraint(expr, &env, trace)? {
                    Value::Struct(field_ty) => self.boundary_value(field_ty, next_input, trace)?,
                    _ => None,
                },
                None => None,
            };
            let Some(field) = field else {
                return Ok(None);
            };
            fields.insert(port.name, field);
        }
        Ok(Some(Value::Instance(Rc::new(StructInstance::new(ty, fields, &self.pool)))))
    }
}

#[cfg(test)]
mod tests {
    use crate::{CompilationContext, CompilationInput, Expr, Value};
    use element_frontend::{PRELUDE, PRELUDE_NAME};
    use std::rc::Rc;

    fn context(text: &str) -> CompilationContext {
        let mut ctx = CompilationContext::new(CompilationInput::default()).unwrap();
        ctx.add_source(PRELUDE_NAME, PRELUDE).unwrap();
        assert!(ctx.add_source("test.ele", text).unwrap());
        ctx
    }

    fn codes(ctx: &CompilationContext) -> Vec<u32> {
        ctx.messages().iter().filter_map(|m| m.code).collect()
    }

    #[test]
    fn non_callables_are_reported() {
        let mut ctx = context("a = 1;");
        assert!(ctx.compile_expression("a(2)").unwrap().is_error());
        assert_eq!(codes(&ctx), vec![16]);
    }

    #[test]
    fn argument_counts_exclude_bound_arguments() {
        let mut ctx = context("");
        assert!(ctx.compile_expression("1.add(2, 3)").unwrap().is_error());
        let message = &ctx.messages()[0];
        assert_eq!(message.code, Some(6));
        assert_eq!(message.context, "Expected '1' arguments but got '2'");
    }

    #[test]
    fn recursion_is_reported() {
        let mut ctx = context("f(x:Num):Num = f(x);");
        assert!(ctx.compile_expression("f(1)").unwrap().is_error());
        assert_eq!(codes(&ctx), vec![11]);
    }

    #[test]
    fn recursion_with_changing_arguments_is_bounded() {
        let mut ctx = context("f(x:Num):Num = f(x.add(1));");
        assert!(ctx.compile_expression("f(1)").unwrap().is_error());
        assert_eq!(codes(&ctx), vec![11]);
    }

    #[test]
    fn higher_order_calls_are_not_recursion() {
        let mut ctx = context(
            "inc(x:Num) = x.add(1);
             apply(f, x) = f(x);
             g(x:Num) = apply(inc, x);
             h = apply(g, 1);
             wrap(f, x) { r = f(x); return = r; }
             k(x:Num) = wrap(inc, x);
             m = wrap(k, 1);",
        );
        assert!(matches!(ctx.compile_expression("h").unwrap(), Value::Num(_)));
        assert!(matches!(ctx.compile_expression("m").unwrap(), Value::Num(_)));
        assert!(codes(&ctx).is_empty());
    }

    #[test]
    fn call_errors_name_the_call_site_and_callee() {
        let mut ctx = context("struct V(x:Num); f(v:V) = v; y = f(1);");
        assert!(ctx.compile_expression("y").unwrap().is_error());
        let message = &ctx.messages()[0];
        assert_eq!(message.code, Some(8));
        let sites: Vec<_> = message.trace.iter().map(|site| site.what.as_str()).collect();
        assert_eq!(sites, vec!["f", "f(1)", "y", "y"]);
    }

    #[test]
    fn environments_are_freed_with_the_context() {
        let mut ctx = context(
            "inc(x:Num) = x.add(1);
             make(k:Num) { add(x:Num) = x.add(k); return = add; }
             h = make(1);",
        );
        let captured = |value: Value| match value {
            Value::Function(function) => Rc::downgrade(&function.env),
            other => panic!("expected a function, got {other:?}"),
        };
        let root = captured(ctx.compile_expression("inc").unwrap());
        let frame = captured(ctx.compile_expression("h").unwrap());
        assert!(root.upgrade().is_some());
        assert!(frame.upgrade().is_some());
        drop(ctx);
        assert!(root.upgrade().is_none());
        assert!(frame.upgrade().is_none());
    }

    #[test]
    fn errors_do_not_cascade() {
        let mut ctx = context("struct V(x:Num); f(v:V) = v;");
        assert!(ctx.compile_expression("f(V(nope))").unwrap().is_error());
        assert_eq!(codes(&ctx), vec![7]);
    }

    #[test]
    fn boundary_functions_take_inputs() {
        let mut ctx = context(
            "struct V(x:Num, y:Num);
             len(v:V, s:Num):Num = v.x.mul(s).add(v.y);
             bad(f) = f;",
        );
        let compiled = ctx.compile_function("len").unwrap();
        assert_eq!(compiled.inputs, 3);
        let Value::Num(expr) = compiled.value else {
            panic!("expected a number")
        };
        assert!(matches!(ctx.pool().get(expr), Expr::Binary(..)));

        let compiled = ctx.compile_function("bad").unwrap();
        assert!(compiled.value.is_error());
        assert_eq!(codes(&ctx), vec![10]);
    }

    #[test]
    fn if_selects_between_instances() {
        let mut ctx = context("struct V(x:Num, y:Num); pick(c:Bool) = if(c, V(1, 2), V(3, 4));");
        let compiled = ctx.compile_function("pick").unwrap();
        let Value::Instance(inst) = compiled.value else {
            panic!("expected an instance")
        };
        assert_eq!(inst.fields().len(), 2);
        assert!(!inst.is_serializable());
        assert!(codes(&ctx).is_empty());
    }

    #[test]
    fn persist_builds_a_group() {
        let mut ctx = context("step(s:Num) = s.add(1); counter = persist(0, step);");
        let Value::Num(expr) = ctx.compile_expression("counter").unwrap() else {
            panic!("expected a number")
        };
        let Expr::Element { group, index } = *ctx.pool().get(expr) else {
            panic!("expected a group element")
        };
        assert_eq!(index, 0);
        let group = ctx.pool().group(group).unwrap();
        assert_eq!(group.kind_name(), "persist");
        assert_eq!(group.size(), 1);
    }

    #[test]
    fn persist_state_keeps_the_struct_shape() {
        let mut ctx = context(
            "struct P(a:Num, b:Num);
             swap(p:P) = P(p.b, p.a);
             s = persist(P(1, 2), swap);",
        );
        let Value::Instance(inst) = ctx.compile_expression("s").unwrap() else {
            panic!("expected an instance")
        };
        let fields = inst.fields().values().filter_map(Value::expr).collect::<Vec<_>>();
        assert_eq!(fields.len(), 2);
        assert!(fields
            .iter()
            .all(|e| matches!(ctx.pool().get(*e), Expr::Element { .. })));
    }

    #[test]
    fn loop_shapes_must_agree() {
        let mut ctx = context(
            "struct P(a:Num, b:Num);
             go(x:Num) = x.lt(10);
             wrong(x:Num) = P(x, x);
             r = for(0, go, wrong);",
        );
        assert!(ctx.compile_expression("r").unwrap().is_error());
        assert_eq!(codes(&ctx), vec![14]);
    }
}
