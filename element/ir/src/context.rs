//! The state of one compilation: loaded declarations, the expression pool,
//! caches and the diagnostics sink.
use super::{
    CompilerMessage, DeclRef, Declaration, Env, ExprPool,
    IntrinsicStruct, MessageCatalog, MessageCode, MessageLevel, Scope, ScopeId,
    Trace, TraceSite, Value,
};
use element_frontend::{parser::ElementParser, Workspace};
use element_utils::{ElementResult, Id, Span};
use linked_hash_map::LinkedHashMap;
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::{Rc, Weak};
use std::time::SystemTime;

/// Options of a compilation.
#[derive(Debug, Clone, Default)]
pub struct CompilationInput {
    /// Omit the built-in declarations.
    pub exclude_prelude: bool,
    /// Directories searched recursively for sources.
    pub packages: Vec<PathBuf>,
    pub extra_source_files: Vec<PathBuf>,
    /// Keep the unoptimized graph around for printing.
    pub debug: bool,
    /// Messages below this level are not emitted.
    pub verbosity: MessageLevel,
    pub skip_validation: bool,
}

/// Receives every message that passes the verbosity filter.
pub type LogCallback = Box<dyn FnMut(&CompilerMessage)>;

/// The result of compiling a function for a host.
#[derive(Debug)]
pub struct CompiledFunction {
    pub name: String,
    /// Number of `Input` nodes the host must supply.
    pub inputs: usize,
    pub value: Value,
}

/// The state of one compilation.
///
/// All caches are owned by the context, so independent contexts share
/// nothing and may live on different threads.
pub struct CompilationContext {
    pub(crate) input: CompilationInput,
    catalog: MessageCatalog,
    callback: Option<LogCallback>,
    messages: Vec<CompilerMessage>,
    error_count: usize,
    pub(crate) decls: Vec<Rc<Declaration>>,
    pub(crate) scopes: Vec<Scope>,
    pub(crate) pool: ExprPool,
    static_envs: HashMap<ScopeId, Rc<Env>>,
    /// Environments of function bodies, cleared when the context is dropped.
    frames: Vec<Weak<Env>>,
    /// Validation results. An entry is inserted as `true` before a
    /// declaration is validated so re-entrant validation terminates.
    pub(crate) validated: HashMap<DeclRef, bool>,
    /// Declarations bound to the intrinsic structs.
    pub(crate) intrinsic_structs: HashMap<IntrinsicStruct, DeclRef>,
}

impl CompilationContext {
    /// A context with the embedded message catalog and no sources loaded.
    pub fn new(input: CompilationInput) -> ElementResult<Self> {
        Self::with_catalog(input, MessageCatalog::embedded()?)
    }

    /// Fails if `catalog` lacks a code the compiler can emit.
    pub fn with_catalog(
        input: CompilationInput,
        catalog: MessageCatalog,
    ) -> ElementResult<Self> {
        catalog.ensure_complete()?;
        Ok(Self {
            input,
            catalog,
            callback: None,
            messages: Vec::new(),
            error_count: 0,
            decls: Vec::new(),
            scopes: vec![Scope::default()],
            pool: ExprPool::new(),
            static_envs: HashMap::new(),
            frames: Vec::new(),
            validated: HashMap::new(),
            intrinsic_structs: HashMap::new(),
        })
    }

    /// Build a context and load every source `input` names.
    pub fn from_input(input: CompilationInput) -> ElementResult<Self> {
        let workspace = Workspace::construct(
            !input.exclude_prelude,
            &input.packages,
            &input.extra_source_files,
        )?;
        let mut ctx = Self::new(input)?;
        ctx.load_workspace(&workspace)?;
        Ok(ctx)
    }

    pub fn set_log_callback(&mut self, callback: LogCallback) {
        self.callback = Some(callback);
    }

    pub fn input(&self) -> &CompilationInput {
        &self.input
    }

    /// Load every parsed source of `workspace`. Sources that failed to
    /// parse are reported and contribute no declarations.
    pub fn load_workspace(&mut self, workspace: &Workspace) -> ElementResult<()> {
        for failure in &workspace.failures {
            self.report(
                MessageCode::ParseError,
                format!("{}: {}", failure.source, failure.message),
                &Trace::empty(),
            )?;
        }
        for file in &workspace.files {
            self.load_file(file)?;
        }
        Ok(())
    }

    /// Parse and load a single source. Returns whether it parsed.
    pub fn add_source(&mut self, name: &str, text: &str) -> ElementResult<bool> {
        match ElementParser::parse_source(name, text) {
            Ok(file) => {
                self.load_file(&file)?;
                Ok(true)
            }
            Err(err) => {
                self.report(
                    MessageCode::ParseError,
                    format!("{name}: {}", err.message()),
                    &Trace::empty(),
                )?;
                Ok(false)
            }
        }
    }

    /// Validate every loaded declaration. Returns whether all of them are
    /// valid.
    pub fn validate(&mut self) -> ElementResult<bool> {
        if self.input.skip_validation {
            return Ok(true);
        }
        let roots: Vec<DeclRef> =
            self.scopes[ScopeId::ROOT.index()].members.values().copied().collect();
        let mut ok = true;
        for decl in roots {
            ok &= self.ensure_validated(decl, &Trace::empty())?;
        }
        Ok(ok)
    }

    /// Emit a diagnostic and return the error sentinel.
    pub fn log_error(
        &mut self,
        code: MessageCode,
        context: impl Into<String>,
        trace: &Trace,
    ) -> ElementResult<Value> {
        self.report(code, context, trace)?;
        Ok(Value::Error)
    }

    /// Emit a diagnostic with a catalog code. An unknown code is an
    /// internal error.
    pub fn report(
        &mut self,
        code: MessageCode,
        context: impl Into<String>,
        trace: &Trace,
    ) -> ElementResult<()> {
        let entry = self.catalog.entry(code)?;
        let message = CompilerMessage {
            code: Some(code.code()),
            name: Some(entry.name.clone()),
            level: Some(entry.level),
            context: context.into(),
            timestamp: SystemTime::now(),
            trace: trace.sites(),
        };
        self.emit(message);
        Ok(())
    }

    /// Emit a plain informational message.
    pub fn log(&mut self, context: impl Into<String>) {
        self.emit(CompilerMessage {
            code: None,
            name: None,
            level: Some(MessageLevel::Information),
            context: context.into(),
            timestamp: SystemTime::now(),
            trace: Vec::new(),
        })
    }

    fn emit(&mut self, message: CompilerMessage) {
        if message.is_error() {
            self.error_count += 1;
        }
        let level = message.level.unwrap_or_default();
        if level < self.input.verbosity {
            return;
        }
        match self.callback.as_mut() {
            Some(callback) => callback(&message),
            None => log::log!(level.as_log_level(), "{message}"),
        }
        self.messages.push(message);
    }

    /// Messages emitted so far, after verbosity filtering.
    pub fn messages(&self) -> &[CompilerMessage] {
        &self.messages
    }

    /// Number of error or fatal messages, whether or not they were emitted.
    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn pool(&self) -> &ExprPool {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut ExprPool {
        &mut self.pool
    }

    pub fn declaration(&self, decl: DeclRef) -> &Declaration {
        &self.decls[decl.index()]
    }

    pub(crate) fn decl_rc(&self, decl: DeclRef) -> Rc<Declaration> {
        Rc::clone(&self.decls[decl.index()])
    }

    pub fn scope(&self, scope: ScopeId) -> &Scope {
        &self.scopes[scope.index()]
    }

    /// Find a declaration by its dotted path from the root scope.
    pub fn lookup_qualified(&self, qualified_name: &str) -> Option<DeclRef> {
        let mut scope = ScopeId::ROOT;
        let mut found = None;
        for part in qualified_name.split('.') {
            if found.is_some() {
                scope = self.declaration(found?).body_scope()?;
            }
            found = Some(*self.scope(scope).members.get(&Id::new(part))?);
        }
        found
    }

    /// The environment of a namespace or struct body, or of the root scope.
    /// Created once per scope, so values resolved in it are cached for the
    /// whole compilation.
    pub fn static_env(&mut self, scope: ScopeId) -> Rc<Env> {
        if let Some(env) = self.static_envs.get(&scope) {
            return Rc::clone(env);
        }
        let parent = self.scopes[scope.index()]
            .parent
            .map(|parent| self.static_env(parent));
        let env = Env::new(Some(scope), LinkedHashMap::new(), parent);
        self.static_envs.insert(scope, Rc::clone(&env));
        env
    }

    /// A fresh environment for evaluating a function body nested in
    /// `parent`.
    pub(crate) fn frame(
        &mut self,
        scope: Option<ScopeId>,
        bindings: LinkedHashMap<Id, Value>,
        parent: &Rc<Env>,
    ) -> Rc<Env> {
        if self.frames.len() == self.frames.capacity() {
            self.frames.retain(|env| env.strong_count() > 0);
        }
        let env = Env::new(scope, bindings, Some(Rc::clone(parent)));
        self.frames.push(Rc::downgrade(&env));
        env
    }

    /// Compile the declaration named `qualified_name` for a host. Functions
    /// are called with `Input` placeholders for each port.
    pub fn compile_function(
        &mut self,
        qualified_name: &str,
    ) -> ElementResult<CompiledFunction> {
        let trace = Trace::empty();
        let mut compiled = CompiledFunction {
            name: qualified_name.to_string(),
            inputs: 0,
            value: Value::Error,
        };
        let Some(decl) = self.lookup_qualified(qualified_name) else {
            self.report(
                MessageCode::IdentifierNotFound,
                format!("'{qualified_name}' not found"),
                &trace,
            )?;
            return Ok(compiled);
        };
        let parent = self.declaration(decl).parent;
        let env = self.static_env(parent);
        compiled.value = match self.resolve_declaration(decl, &env, &trace)? {
            Value::Function(function) => {
                let trace = trace.push(
                    self.declaration(decl).trace_site(),
                    super::Activity::Expression,
                );
                match self.boundary_inputs(&function, &trace)? {
                    Some((args, inputs)) => {
                        compiled.inputs = inputs;
                        self.call_value(Value::Function(function), args, &trace)?
                    }
                    None => Value::Error,
                }
            }
            value @ (Value::Struct(_)
            | Value::Namespace(_)
            | Value::Constraint(_)) => {
                let desc = self.describe(&value);
                self.log_error(
                    MessageCode::InvalidCompileTarget,
                    format!("'{qualified_name}' is {desc} and cannot be compiled"),
                    &trace,
                )?
            }
            value => value,
        };
        Ok(compiled)
    }

    /// Parse `text` as an expression and resolve it in the root scope.
    pub fn compile_expression(&mut self, text: &str) -> ElementResult<Value> {
        let trace = Trace::empty();
        let expr = match ElementParser::parse_expression(text) {
            Ok(expr) => expr,
            Err(err) => {
                return self.log_error(
                    MessageCode::ParseError,
                    err.message(),
                    &trace,
                );
            }
        };
        let trace = trace.push(
            TraceSite::new(text, Span::new("<expression>".into(), 1, 1)),
            super::Activity::Expression,
        );
        let env = self.static_env(ScopeId::ROOT);
        self.resolve_expression(&expr, &env, &trace)
    }

    /// A short description of `value` for diagnostics.
    pub fn describe(&self, value: &Value) -> String {
        let name = |d: &DeclRef| self.declaration(*d).qualified_name.clone();
        match value {
            Value::Num(_) => "a Num".to_string(),
            Value::Bool(_) => "a Bool".to_string(),
            Value::Instance(inst) => {
                format!("an instance of '{}'", name(&inst.declaring()))
            }
            Value::Struct(d) => format!("struct '{}'", name(d)),
            Value::Function(f) => format!("function '{}'", name(&f.decl)),
            Value::Namespace(d) => format!("namespace '{}'", name(d)),
            Value::Constraint(d) => format!("constraint '{}'", name(d)),
            Value::Error => "an error".to_string(),
        }
    }
}

/// A value cached in an environment may capture that environment, so every
/// cache is emptied here to let the environments be freed.
impl Drop for CompilationContext {
    fn drop(&mut self) {
        for env in self.static_envs.values() {
            env.clear_cache();
        }
        for env in self.frames.drain(..).filter_map(|env| env.upgrade()) {
            env.clear_cache();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn context() -> CompilationContext {
        let mut ctx = CompilationContext::new(CompilationInput::default()).unwrap();
        ctx.add_source(element_frontend::PRELUDE_NAME, element_frontend::PRELUDE)
            .unwrap();
        ctx
    }

    #[test]
    fn verbosity_filters_without_hiding_errors() {
        let mut ctx = CompilationContext::new(CompilationInput {
            verbosity: MessageLevel::Fatal,
            ..Default::default()
        })
        .unwrap();
        let seen = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&seen);
        ctx.set_log_callback(Box::new(move |_| *counter.borrow_mut() += 1));
        ctx.log("hello");
        ctx.report(MessageCode::IdentifierNotFound, "x", &Trace::empty())
            .unwrap();
        assert_eq!(*seen.borrow(), 0);
        assert!(ctx.has_errors());
        assert_eq!(ctx.error_count(), 1);
        assert!(ctx.messages().is_empty());
    }

    #[test]
    fn incomplete_catalog_is_fatal() {
        let catalog = MessageCatalog::from_json(
            r#"{ "ELE1": { "name": "SerializationError", "level": "Error" } }"#,
        )
        .unwrap();
        let err = CompilationContext::with_catalog(CompilationInput::default(), catalog)
            .err()
            .unwrap();
        assert!(err.is_internal());
    }

    #[test]
    fn qualified_lookup_walks_bodies() {
        let ctx = context();
        let add = ctx.lookup_qualified("Num.add").unwrap();
        assert_eq!(ctx.declaration(add).qualified_name, "Num.add");
        assert!(ctx.lookup_qualified("Num.nope").is_none());
        assert!(ctx.lookup_qualified("Any.x").is_none());
    }

    #[test]
    fn parse_failures_are_reported() {
        let mut ctx = context();
        assert!(!ctx.add_source("bad.ele", "struct (").unwrap());
        assert_eq!(ctx.messages()[0].code, Some(9));
        let value = ctx.compile_expression("1 +").unwrap();
        assert!(value.is_error());
    }

    #[test]
    fn compile_targets_must_be_functions() {
        let mut ctx = context();
        ctx.add_source("t.ele", "struct Vec(x:Num, y:Num);").unwrap();
        let compiled = ctx.compile_function("Vec").unwrap();
        assert!(compiled.value.is_error());
        assert_eq!(ctx.messages().last().unwrap().code, Some(3));

        let compiled = ctx.compile_function("Nothing").unwrap();
        assert!(compiled.value.is_error());
        assert_eq!(ctx.messages().last().unwrap().code, Some(7));
    }
}
