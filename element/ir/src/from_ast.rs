//! Loads parsed source files into the declaration and scope tables of a
//! [CompilationContext].
use super::{
    intrinsics::{self, Intrinsic},
    Activity, CompilationContext, DeclBody, DeclRef, Declaration, MessageCode,
    Port, Scope, ScopeId, Trace, TraceSite,
};
use element_frontend::{ast, DeclKind, SourceFile};
use element_utils::ElementResult;
use std::collections::HashSet;
use std::rc::Rc;

impl CompilationContext {
    /// Add the top-level declarations of `file` to the root scope. Every
    /// file shares the root scope.
    pub fn load_file(&mut self, file: &SourceFile) -> ElementResult<()> {
        log::debug!("Loading {} declarations from {}", file.items.len(), file.name);
        for item in &file.items {
            self.load_declaration(item, ScopeId::ROOT, "")?;
        }
        Ok(())
    }

    fn load_declaration(
        &mut self,
        item: &ast::Declaration,
        parent: ScopeId,
        prefix: &str,
    ) -> ElementResult<DeclRef> {
        let qualified_name = if prefix.is_empty() {
            item.name.to_string()
        } else {
            format!("{prefix}.{}", item.name)
        };
        let trace = Trace::empty().push(
            TraceSite::new(qualified_name.clone(), item.span),
            Activity::Load,
        );
        let handle = DeclRef::new(self.decls.len());

        let ports = match &item.ports {
            Some(ports) => Some(self.load_ports(ports, &qualified_name, &trace)?),
            None => None,
        };
        let (body, members) = match &item.body {
            ast::Body::Scope(members) => {
                let scope = ScopeId::new(self.scopes.len());
                self.scopes.push(Scope {
                    parent: Some(parent),
                    owner: Some(handle),
                    ..Default::default()
                });
                (DeclBody::Scope(scope), Some((scope, members)))
            }
            ast::Body::Terminal => (DeclBody::Terminal, None),
            ast::Body::Expression(expr) => {
                (DeclBody::Expression(Rc::new(expr.clone())), None)
            }
        };

        self.decls.push(Rc::new(Declaration {
            name: item.name,
            kind: item.kind,
            intrinsic: item.intrinsic,
            ports,
            declared_type: item.declared_type.clone().map(Rc::new),
            body,
            parent,
            qualified_name: qualified_name.clone(),
            span: item.span,
        }));

        let members_of_parent = &self.scopes[parent.index()].members;
        if members_of_parent.contains_key(&item.name) {
            self.report(
                MessageCode::MultipleDefinitions,
                format!("'{qualified_name}' is defined multiple times"),
                &trace,
            )?;
        } else {
            self.scopes[parent.index()].members.insert(item.name, handle);
        }

        if item.kind == DeclKind::Struct && item.intrinsic {
            if let Some(Intrinsic::Struct(kind)) = intrinsics::lookup(&qualified_name) {
                self.intrinsic_structs.insert(kind, handle);
            }
        }

        if let Some((scope, members)) = members {
            for member in members {
                self.load_declaration(member, scope, &qualified_name)?;
            }
        }
        Ok(handle)
    }

    fn load_ports(
        &mut self,
        ports: &[ast::PortDef],
        owner: &str,
        trace: &Trace,
    ) -> ElementResult<Vec<Port>> {
        let mut seen = HashSet::new();
        let mut loaded = Vec::with_capacity(ports.len());
        for port in ports {
            if !seen.insert(port.name) {
                self.report(
                    MessageCode::MultipleDefinitions,
                    format!("Port '{}' of '{owner}' is defined multiple times", port.name),
                    trace,
                )?;
                continue;
            }
            loaded.push(Port {
                name: port.name,
                constraint: port.constraint.clone().map(Rc::new),
                span: port.span,
            });
        }
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use crate::{CompilationContext, CompilationInput, ScopeId};

    fn load(text: &str) -> CompilationContext {
        let mut ctx = CompilationContext::new(CompilationInput::default()).unwrap();
        assert!(ctx.add_source("test.ele", text).unwrap());
        ctx
    }

    #[test]
    fn nested_declarations_get_qualified_names() {
        let ctx = load("namespace Geo { struct Point(x, y) { len(p) = p.x; } }");
        let len = ctx.lookup_qualified("Geo.Point.len").unwrap();
        let decl = ctx.declaration(len);
        assert_eq!(decl.qualified_name, "Geo.Point.len");
        let point = ctx.lookup_qualified("Geo.Point").unwrap();
        assert_eq!(ctx.scope(decl.parent).owner, Some(point));
        assert_eq!(ctx.scope(ScopeId::ROOT).members.len(), 1);
    }

    #[test]
    fn duplicates_are_reported() {
        let ctx = load("a = 1; a = 2; f(x, x) = x;");
        let codes: Vec<_> = ctx.messages().iter().map(|m| m.code).collect();
        assert_eq!(codes, vec![Some(2), Some(2)]);
        let f = ctx.lookup_qualified("f").unwrap();
        assert_eq!(ctx.declaration(f).inputs().len(), 1);
    }
}
