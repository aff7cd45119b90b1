//! Resolution of declarations and expressions into values.
use super::{
    reserved_names::RETURN, Activity, CompilationContext, DeclBody, DeclRef,
    Declaration, Env, FunctionValue, MessageCode, Trace, TraceSite, Value,
};
use element_frontend::{DeclKind, Expression};
use element_utils::{ElementResult, Id, Span};
use linked_hash_map::LinkedHashMap;
use std::rc::Rc;

impl CompilationContext {
    /// Resolve `decl`, a member of the scope of `env`, into a value.
    ///
    /// The result is cached in `env`. A declaration is validated before its
    /// first resolution; cache hits skip validation.
    pub fn resolve_declaration(
        &mut self,
        decl: DeclRef,
        env: &Rc<Env>,
        trace: &Trace,
    ) -> ElementResult<Value> {
        if let Some(value) = env.cached(decl) {
            log::trace!("cache hit for {}", self.declaration(decl).qualified_name);
            return Ok(value);
        }
        let declaration = self.decl_rc(decl);
        if trace.resolving(decl, env) {
            return self.log_error(
                MessageCode::CircularCompilation,
                format!(
                    "'{}' refers to itself while being resolved",
                    declaration.qualified_name
                ),
                trace,
            );
        }
        let trace = trace.push_resolve(declaration.trace_site(), decl, env);

        if !self.input.skip_validation && !self.ensure_validated(decl, &trace)? {
            env.insert_cache(decl, Value::Error);
            return Ok(Value::Error);
        }

        let value = match declaration.kind {
            DeclKind::Namespace => Value::Namespace(decl),
            DeclKind::Struct => Value::Struct(decl),
            DeclKind::Constraint => Value::Constraint(decl),
            DeclKind::Function
                if declaration.ports.is_some() || declaration.intrinsic =>
            {
                Value::Function(Rc::new(FunctionValue {
                    decl,
                    env: Rc::clone(env),
                    bound: Vec::new(),
                }))
            }
            DeclKind::Function => {
                let frame = self.frame(declaration.body_scope(), LinkedHashMap::new(), env);
                let value = self.evaluate_body(&declaration, &frame, &trace)?;
                self.check_return(&declaration, value, env, &trace)?
            }
        };
        env.insert_cache(decl, value.clone());
        Ok(value)
    }

    /// The value of a function body evaluated in `frame`: the expression of
    /// an expression body or the `return` member of a scope body.
    pub(crate) fn evaluate_body(
        &mut self,
        decl: &Declaration,
        frame: &Rc<Env>,
        trace: &Trace,
    ) -> ElementResult<Value> {
        match &decl.body {
            DeclBody::Expression(expr) => self.resolve_expression(expr, frame, trace),
            DeclBody::Scope(scope) => {
                let ret = self.scope(*scope).members.get(&Id::new(RETURN)).copied();
                match ret {
                    Some(ret) => self.resolve_declaration(ret, frame, trace),
                    None => self.log_error(
                        MessageCode::MissingFunctionBody,
                        format!(
                            "'{}' has no '{RETURN}' member",
                            decl.qualified_name
                        ),
                        trace,
                    ),
                }
            }
            DeclBody::Terminal => self.log_error(
                MessageCode::MissingFunctionBody,
                format!("'{}' has no body", decl.qualified_name),
                trace,
            ),
        }
    }

    /// Check `value` against the declared return constraint of `decl`,
    /// resolved in `env`.
    pub(crate) fn check_return(
        &mut self,
        decl: &Declaration,
        value: Value,
        env: &Rc<Env>,
        trace: &Trace,
    ) -> ElementResult<Value> {
        let Some(ty) = &decl.declared_type else {
            return Ok(value);
        };
        let constraint = self.resolve_constraint(ty, env, trace)?;
        if self.matches_constraint(&value, &constraint, trace)? {
            Ok(value)
        } else {
            let desc = self.describe(&value);
            self.log_error(
                MessageCode::InvalidReturnType,
                format!(
                    "'{}' returned {desc} which does not match '{ty}' constraint",
                    decl.qualified_name
                ),
                trace,
            )
        }
    }

    pub fn resolve_expression(
        &mut self,
        expr: &Expression,
        env: &Rc<Env>,
        trace: &Trace,
    ) -> ElementResult<Value> {
        match expr {
            Expression::Literal { value, .. } => Ok(Value::Num(self.pool.constant(*value))),
            Expression::Identifier { name, .. } => match self.lookup(*name, env, trace)? {
                Some(value) => Ok(value),
                None => self.log_error(
                    MessageCode::IdentifierNotFound,
                    format!("'{name}' not found"),
                    trace,
                ),
            },
            Expression::Index { target, member, span } => {
                let target = self.resolve_expression(target, env, trace)?;
                self.index_value(&target, *member, *span, trace)
            }
            Expression::Call { callee, args, span } => {
                let trace =
                    trace.push(TraceSite::new(expr.to_string(), *span), Activity::Expression);
                let callee = self.resolve_expression(callee, env, &trace)?;
                let args = args
                    .iter()
                    .map(|arg| self.resolve_expression(arg, env, &trace))
                    .collect::<ElementResult<Vec<_>>>()?;
                self.call_value(callee, args, &trace)
            }
        }
    }

    /// Find `name` in `env` and the environments it is nested in: port
    /// bindings first, then members of the environment's scope.
    pub fn lookup(
        &mut self,
        name: Id,
        env: &Rc<Env>,
        trace: &Trace,
    ) -> ElementResult<Option<Value>> {
        let mut current = Some(Rc::clone(env));
        while let Some(env) = current {
            if let Some(value) = env.binding(name) {
                return Ok(Some(value.clone()));
            }
            if let Some(scope) = env.scope() {
                if let Some(decl) = self.scope(scope).members.get(&name).copied() {
                    return self.resolve_declaration(decl, &env, trace).map(Some);
                }
            }
            current = env.parent().cloned();
        }
        Ok(None)
    }

    /// `value.member`
    pub fn index_value(
        &mut self,
        value: &Value,
        member: Id,
        span: Span,
        trace: &Trace,
    ) -> ElementResult<Value> {
        let trace = trace.push(TraceSite::new(format!(".{member}"), span), Activity::Expression);
        match value {
            Value::Error => Ok(Value::Error),
            Value::Namespace(decl) => {
                match self.member_of(*decl, member) {
                    Some((found, scope)) => {
                        let env = self.static_env(scope);
                        self.resolve_declaration(found, &env, &trace)
                    }
                    None => self.member_not_found(value, member, &trace),
                }
            }
            Value::Struct(decl) => {
                let Some(chain) = self.alias_chain(*decl, &trace)? else {
                    return Ok(Value::Error);
                };
                for decl in chain {
                    if let Some((found, scope)) = self.member_of(decl, member) {
                        let env = self.static_env(scope);
                        return self.resolve_declaration(found, &env, &trace);
                    }
                }
                self.member_not_found(value, member, &trace)
            }
            Value::Instance(inst) => {
                if let Some(field) = inst.get(member) {
                    return Ok(field.clone());
                }
                let Some(chain) = self.alias_chain(inst.declaring(), &trace)? else {
                    return Ok(Value::Error);
                };
                self.instance_function(value, &chain, member, &trace)
            }
            Value::Num(_) | Value::Bool(_) => {
                let kind = if matches!(value, Value::Num(_)) {
                    super::IntrinsicStruct::Num
                } else {
                    super::IntrinsicStruct::Bool
                };
                match self.intrinsic_structs.get(&kind).copied() {
                    Some(decl) => self.instance_function(value, &[decl], member, &trace),
                    None => self.member_not_found(value, member, &trace),
                }
            }
            Value::Function(_) | Value::Constraint(_) => {
                self.member_not_found(value, member, &trace)
            }
        }
    }

    /// The member `name` of the body of `decl` and the scope holding it.
    fn member_of(&self, decl: DeclRef, name: Id) -> Option<(DeclRef, super::ScopeId)> {
        let scope = self.declaration(decl).body_scope()?;
        let found = self.scope(scope).members.get(&name).copied()?;
        Some((found, scope))
    }

    fn member_not_found(
        &mut self,
        value: &Value,
        member: Id,
        trace: &Trace,
    ) -> ElementResult<Value> {
        let desc = self.describe(value);
        self.log_error(
            MessageCode::IdentifierNotFound,
            format!("'{member}' not found in {desc}"),
            trace,
        )
    }

    /// Look up `member` as a function of the structs in `chain` and bind
    /// `instance` as its first argument.
    fn instance_function(
        &mut self,
        instance: &Value,
        chain: &[DeclRef],
        member: Id,
        trace: &Trace,
    ) -> ElementResult<Value> {
        let Some((found, scope)) =
            chain.iter().find_map(|decl| self.member_of(*decl, member))
        else {
            return self.member_not_found(instance, member, trace);
        };
        let env = self.static_env(scope);
        let function = match self.resolve_declaration(found, &env, trace)? {
            Value::Function(function) => function,
            Value::Error => return Ok(Value::Error),
            _ => return self.not_an_instance_function(found, instance, trace),
        };
        let decl = self.decl_rc(function.decl);
        let Some(first) = decl.inputs().get(function.bound.len()) else {
            return self.not_an_instance_function(found, instance, trace);
        };
        if !self.matches_port(first, instance, &function.env, trace)? {
            return self.not_an_instance_function(found, instance, trace);
        }
        let mut bound = function.bound.clone();
        bound.push(instance.clone());
        Ok(Value::Function(Rc::new(FunctionValue {
            decl: function.decl,
            env: Rc::clone(&function.env),
            bound,
        })))
    }

    fn not_an_instance_function(
        &mut self,
        decl: DeclRef,
        instance: &Value,
        trace: &Trace,
    ) -> ElementResult<Value> {
        let desc = self.describe(instance);
        let name = self.declaration(decl).qualified_name.clone();
        self.log_error(
            MessageCode::CannotBeUsedAsInstanceFunction,
            format!("'{name}' cannot be used as an instance function of {desc}"),
            trace,
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::{CompilationContext, CompilationInput, Value};
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

    fn constant(ctx: &CompilationContext, value: &Value) -> Option<f32> {
        ctx.pool().as_constant(value.expr()?)
    }

    #[test]
    fn bindings_resolve_through_scopes() {
        let mut ctx = context("a = 2; namespace N { b = a; c { return = b; } }");
        let value = ctx.compile_expression("N.c").unwrap();
        assert_eq!(constant(&ctx, &value), Some(2.0));
        assert!(codes(&ctx).is_empty());
    }

    #[test]
    fn unknown_identifiers_are_reported() {
        let mut ctx = context("a = b;");
        assert!(ctx.compile_expression("a").unwrap().is_error());
        assert_eq!(codes(&ctx), vec![7]);
        // the failure is cached, so asking again reports nothing new
        assert!(ctx.compile_expression("a").unwrap().is_error());
        assert_eq!(codes(&ctx), vec![7]);
    }

    #[test]
    fn self_reference_is_circular() {
        let mut ctx = context("a = b; b = a;");
        assert!(ctx.compile_expression("a").unwrap().is_error());
        assert_eq!(codes(&ctx), vec![11]);
    }

    #[test]
    fn ports_shadow_outer_names() {
        let mut ctx = context("x = 10; f(x) = x; g = f(3);");
        let value = ctx.compile_expression("g").unwrap();
        assert_eq!(constant(&ctx, &value), Some(3.0));
    }

    #[test]
    fn instance_functions_bind_the_instance() {
        let mut ctx = context(
            "struct Vec(x:Num, y:Num) { sum(v:Vec):Num = v.x.add(v.y); scaled(v:Vec, k:Num) = Vec(v.x.mul(k), v.y.mul(k)); }
             v = Vec(1, 2);",
        );
        let sum = ctx.compile_expression("v.sum()").unwrap();
        assert!(matches!(sum, Value::Num(_)));
        let scaled = ctx.compile_expression("v.scaled(2).x").unwrap();
        assert!(matches!(scaled, Value::Num(_)));
        let via_struct = ctx.compile_expression("Vec.sum(v)").unwrap();
        assert!(matches!(via_struct, Value::Num(_)));
        assert!(codes(&ctx).is_empty());
    }

    #[test]
    fn numbers_have_instance_functions() {
        let mut ctx = context("");
        let value = ctx.compile_expression("5.add(3)").unwrap();
        assert!(matches!(value, Value::Num(_)));
        let value = ctx.compile_expression("5.lt(3).not()").unwrap();
        assert!(matches!(value, Value::Bool(_)));
        assert!(codes(&ctx).is_empty());
    }

    #[test]
    fn first_port_must_accept_the_instance() {
        let mut ctx = context(
            "struct A(x:Num) { bad(n:Num) = n; } struct B(x:Num); a = A(1);",
        );
        assert!(ctx.compile_expression("a.bad").unwrap().is_error());
        assert_eq!(codes(&ctx), vec![22]);
        assert!(ctx.compile_expression("a.missing").unwrap().is_error());
        assert_eq!(codes(&ctx), vec![22, 7]);
    }

    #[test]
    fn scope_bodies_need_a_return() {
        let mut ctx = context("f(x) { y = x; }");
        assert!(ctx.compile_expression("f(1)").unwrap().is_error());
        assert_eq!(codes(&ctx), vec![21]);
    }

    #[test]
    fn return_constraints_are_checked() {
        let mut ctx = context("f(x):Bool = x; g(x):Num = x;");
        assert!(ctx.compile_expression("f(1)").unwrap().is_error());
        assert_eq!(codes(&ctx), vec![17]);
        assert!(!ctx.compile_expression("g(1)").unwrap().is_error());
    }
}
