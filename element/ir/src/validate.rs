//! Structural checks run once per declaration before it is first resolved.
use super::{
    intrinsics::{self, Intrinsic},
    reserved_names::{RESERVED_NAMES, RETURN},
    Activity, CompilationContext, DeclBody, DeclRef, Declaration, MessageCode,
    ScopeId, Trace, Value,
};
use element_frontend::DeclKind;
use element_utils::{ElementResult, Id};

impl CompilationContext {
    /// Validate `decl` unless it already has been. The result is remembered
    /// for the rest of the compilation.
    pub fn ensure_validated(&mut self, decl: DeclRef, trace: &Trace) -> ElementResult<bool> {
        if let Some(ok) = self.validated.get(&decl) {
            return Ok(*ok);
        }
        self.validated.insert(decl, true);
        let ok = self.validate_declaration(decl, trace)?;
        self.validated.insert(decl, ok);
        Ok(ok)
    }

    fn validate_declaration(&mut self, decl: DeclRef, trace: &Trace) -> ElementResult<bool> {
        let declaration = self.decl_rc(decl);
        log::debug!("Validating {} {}", declaration.kind, declaration.qualified_name);
        let trace = trace.push(declaration.trace_site(), Activity::Validate(decl));

        let mut ok = self.validate_identifier(declaration.name, declaration.parent, &trace)?;
        for port in declaration.inputs() {
            ok &= self.validate_identifier(port.name, declaration.parent, &trace)?;
        }
        ok &= match declaration.kind {
            DeclKind::Namespace => self.validate_scope_body(&declaration, &trace)?,
            DeclKind::Struct => self.validate_struct(&declaration, &trace)?,
            DeclKind::Constraint => self.validate_constraint(&declaration, &trace)?,
            DeclKind::Function => self.validate_function(&declaration, &trace)?,
        };
        Ok(ok)
    }

    /// Reject empty and reserved identifiers. `return` is allowed as a
    /// member of a function body.
    fn validate_identifier(
        &mut self,
        name: Id,
        scope: ScopeId,
        trace: &Trace,
    ) -> ElementResult<bool> {
        if name.is_empty() {
            self.report(MessageCode::InvalidIdentifier, "Identifier cannot be empty", trace)?;
            return Ok(false);
        }
        if !RESERVED_NAMES.iter().any(|reserved| name.eq_ignore_case(reserved)) {
            return Ok(true);
        }
        let in_function_body = self
            .scope(scope)
            .owner
            .is_some_and(|owner| self.declaration(owner).kind == DeclKind::Function);
        if name == RETURN && in_function_body {
            return Ok(true);
        }
        self.report(
            MessageCode::InvalidIdentifier,
            format!("'{name}' is a reserved identifier"),
            trace,
        )?;
        Ok(false)
    }

    fn validate_scope_body(&mut self, decl: &Declaration, trace: &Trace) -> ElementResult<bool> {
        let Some(scope) = decl.body_scope() else {
            return Ok(true);
        };
        let members: Vec<DeclRef> = self.scope(scope).members.values().copied().collect();
        let mut ok = true;
        for member in members {
            ok &= self.ensure_validated(member, trace)?;
        }
        Ok(ok)
    }

    /// Intrinsics have no body beyond a scope of members, and must have a
    /// registered implementation of the right kind.
    fn validate_intrinsic(&mut self, decl: &Declaration, trace: &Trace) -> ElementResult<bool> {
        if !decl.intrinsic {
            return Ok(true);
        }
        let mut ok = true;
        let allows_scope = decl.kind == DeclKind::Struct;
        let has_body = match decl.body {
            DeclBody::Terminal => false,
            DeclBody::Scope(_) => !allows_scope,
            DeclBody::Expression(_) => true,
        };
        if has_body {
            self.report(
                MessageCode::IntrinsicCannotHaveBody,
                format!("Intrinsic '{}' cannot have a body", decl.qualified_name),
                trace,
            )?;
            ok = false;
        }
        let implemented = matches!(
            (decl.kind, intrinsics::lookup(&decl.qualified_name)),
            (DeclKind::Struct, Some(Intrinsic::Struct(_)))
                | (DeclKind::Constraint, Some(Intrinsic::Constraint(_)))
                | (DeclKind::Function, Some(Intrinsic::Function(_)))
        );
        if !implemented {
            self.report(
                MessageCode::IntrinsicNotImplemented,
                format!("Intrinsic '{}' is not implemented", decl.qualified_name),
                trace,
            )?;
            ok = false;
        }
        Ok(ok)
    }

    fn validate_struct(&mut self, decl: &Declaration, trace: &Trace) -> ElementResult<bool> {
        let mut ok = true;
        if let Some(target) = decl.declared_type.clone() {
            if decl.intrinsic {
                self.report(
                    MessageCode::IntrinsicCannotHaveBody,
                    format!("Intrinsic struct '{}' cannot be an alias", decl.qualified_name),
                    trace,
                )?;
                ok = false;
            }
            if decl.ports.is_some() {
                self.report(
                    MessageCode::StructCannotHaveReturnType,
                    format!("Alias '{}' cannot declare ports", decl.qualified_name),
                    trace,
                )?;
                ok = false;
            }
            let env = self.static_env(decl.parent);
            match self.resolve_expression(&target, &env, trace)? {
                Value::Struct(_) => (),
                Value::Error => ok = false,
                other => {
                    let desc = self.describe(&other);
                    self.report(
                        MessageCode::IntrinsicCannotHaveBody,
                        format!(
                            "Cannot create alias of non-struct: '{target}' is {desc}"
                        ),
                        trace,
                    )?;
                    ok = false;
                }
            }
        } else {
            ok &= self.validate_intrinsic(decl, trace)?;
            if !decl.intrinsic && decl.inputs().is_empty() {
                self.report(
                    MessageCode::MissingPorts,
                    format!("Non intrinsic struct '{}' must have ports", decl.qualified_name),
                    trace,
                )?;
                ok = false;
            }
        }
        ok &= self.validate_scope_body(decl, trace)?;
        Ok(ok)
    }

    fn validate_constraint(&mut self, decl: &Declaration, trace: &Trace) -> ElementResult<bool> {
        let mut ok = self.validate_intrinsic(decl, trace)?;
        if !decl.intrinsic && decl.ports.is_none() {
            self.report(
                MessageCode::MissingPorts,
                format!("Non intrinsic constraint '{}' must have ports", decl.qualified_name),
                trace,
            )?;
            ok = false;
        }
        Ok(ok)
    }

    fn validate_function(&mut self, decl: &Declaration, trace: &Trace) -> ElementResult<bool> {
        if decl.intrinsic {
            return self.validate_intrinsic(decl, trace);
        }
        let mut ok = true;
        match decl.body {
            DeclBody::Terminal => {
                self.report(
                    MessageCode::MissingFunctionBody,
                    format!("Non intrinsic function '{}' must have a body", decl.qualified_name),
                    trace,
                )?;
                ok = false;
            }
            DeclBody::Scope(scope) => {
                let members = &self.scope(scope).members;
                let has_return = members.contains_key(&Id::new(RETURN));
                let shadowed: Vec<Id> = decl
                    .inputs()
                    .iter()
                    .map(|port| port.name)
                    .filter(|name| members.contains_key(name))
                    .collect();
                if !has_return {
                    self.report(
                        MessageCode::MissingFunctionBody,
                        format!("'{}' has no '{RETURN}' member", decl.qualified_name),
                        trace,
                    )?;
                    ok = false;
                }
                for name in shadowed {
                    self.report(
                        MessageCode::LocalShadowing,
                        format!(
                            "'{name}' in the body of '{}' shadows a port",
                            decl.qualified_name
                        ),
                        trace,
                    )?;
                    ok = false;
                }
                ok &= self.validate_scope_body(decl, trace)?;
            }
            DeclBody::Expression(_) => (),
        }
        Ok(ok)
    }
}
