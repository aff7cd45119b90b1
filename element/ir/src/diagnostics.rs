//! Compiler messages, the message catalog and the trace of enclosing
//! declarations attached to every message.
use super::{DeclRef, Env, Value};
use element_utils::{ElementResult, Error, Span};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use std::time::SystemTime;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

/// The default catalog, shipped with the compiler.
const MESSAGES: &str = include_str!("messages.json");

/// Severity of a compiler message. Ordered from least to most severe.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
pub enum MessageLevel {
    Verbose,
    Information,
    Warning,
    Error,
    Fatal,
}

impl Default for MessageLevel {
    fn default() -> Self {
        MessageLevel::Information
    }
}

impl MessageLevel {
    pub fn as_log_level(&self) -> log::Level {
        match self {
            MessageLevel::Verbose => log::Level::Debug,
            MessageLevel::Information => log::Level::Info,
            MessageLevel::Warning => log::Level::Warn,
            MessageLevel::Error | MessageLevel::Fatal => log::Level::Error,
        }
    }
}

/// Every message code the compiler can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum MessageCode {
    SerializationError = 1,
    MultipleDefinitions = 2,
    InvalidCompileTarget = 3,
    IntrinsicNotImplemented = 4,
    LocalShadowing = 5,
    ArgumentCountMismatch = 6,
    IdentifierNotFound = 7,
    ConstraintNotSatisfied = 8,
    ParseError = 9,
    InvalidBoundaryFunctionInterface = 10,
    CircularCompilation = 11,
    BoundaryMapMissing = 12,
    MissingPorts = 13,
    TypeError = 14,
    InvalidIdentifier = 15,
    InvalidExpression = 16,
    InvalidReturnType = 17,
    RedundantQualifier = 18,
    StructCannotHaveReturnType = 19,
    IntrinsicCannotHaveBody = 20,
    MissingFunctionBody = 21,
    CannotBeUsedAsInstanceFunction = 22,
    UnknownError = 9999,
}

impl MessageCode {
    pub fn code(&self) -> u32 {
        *self as u32
    }
}

/// Name and severity of a message code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub name: String,
    pub level: MessageLevel,
}

#[derive(Deserialize)]
struct RawEntry {
    name: String,
    level: String,
}

/// Maps message codes to their name and severity. Keys in the source
/// document have the form `ELE<code>`.
#[derive(Debug, Clone)]
pub struct MessageCatalog {
    entries: HashMap<u32, CatalogEntry>,
}

impl MessageCatalog {
    /// The catalog shipped with the compiler.
    pub fn embedded() -> ElementResult<Self> {
        Self::from_json(MESSAGES)
    }

    pub fn from_json(text: &str) -> ElementResult<Self> {
        let raw: BTreeMap<String, RawEntry> = serde_json::from_str(text)
            .map_err(|err| {
                Error::internal(format!("Malformed message catalog: {err}"))
            })?;
        let mut entries = HashMap::with_capacity(raw.len());
        for (key, entry) in raw {
            let code = key
                .strip_prefix("ELE")
                .and_then(|num| num.parse::<u32>().ok())
                .ok_or_else(|| {
                    Error::internal(format!(
                        "Message catalog key `{key}` is not of the form ELE<code>"
                    ))
                })?;
            let level = entry.level.parse::<MessageLevel>().map_err(|_| {
                Error::internal(format!(
                    "\"{}\" is not a valid message level",
                    entry.level
                ))
            })?;
            entries.insert(
                code,
                CatalogEntry {
                    name: entry.name,
                    level,
                },
            );
        }
        Ok(Self { entries })
    }

    pub fn get(&self, code: u32) -> Option<&CatalogEntry> {
        self.entries.get(&code)
    }

    /// Fails if a code the compiler can emit is missing.
    pub fn ensure_complete(&self) -> ElementResult<()> {
        match MessageCode::iter().find(|code| self.get(code.code()).is_none()) {
            Some(missing) => Err(Error::internal(format!(
                "ELE{} could not be found in the message catalog",
                missing.code()
            ))),
            None => Ok(()),
        }
    }

    /// Look up a code that must exist. A missing code is a compiler bug.
    pub fn entry(&self, code: MessageCode) -> ElementResult<&CatalogEntry> {
        self.get(code.code()).ok_or_else(|| {
            Error::internal(format!("ELE{} could not be found", code.code()))
        })
    }
}

/// A frame of the trace: something the compiler was busy with when a
/// message was emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceSite {
    pub what: String,
    pub source: String,
    pub line: usize,
    pub column: usize,
}

impl TraceSite {
    pub fn new(what: impl Into<String>, span: Span) -> Self {
        Self {
            what: what.into(),
            source: span.file.to_string(),
            line: span.line,
            column: span.column,
        }
    }
}

impl std::fmt::Display for TraceSite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}:{}:{})",
            self.what, self.source, self.line, self.column
        )
    }
}

/// What a trace frame records, used to detect re-entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    /// Resolving a declaration into a value
    Resolve(DeclRef),
    /// Validating a declaration
    Validate(DeclRef),
    /// Executing the body of a function
    Call(DeclRef),
    /// Evaluating an expression
    Expression,
    /// Loading declarations from a source
    Load,
}

struct Frame {
    site: TraceSite,
    activity: Activity,
    /// Arguments of a call frame
    args: Vec<Value>,
    /// Environment a declaration is resolved in
    env: Option<Rc<Env>>,
    parent: Trace,
}

/// An immutable stack of trace sites. Pushing returns a new trace and leaves
/// the original untouched, so each resolution step owns the snapshot it was
/// called with.
#[derive(Clone, Default)]
pub struct Trace(Option<Rc<Frame>>);

impl Trace {
    pub fn empty() -> Self {
        Trace(None)
    }

    pub fn push(&self, site: TraceSite, activity: Activity) -> Self {
        self.push_frame(site, activity, Vec::new(), None)
    }

    /// Push the call of `decl` with `args`.
    pub fn push_call(&self, site: TraceSite, decl: DeclRef, args: &[Value]) -> Self {
        self.push_frame(site, Activity::Call(decl), args.to_vec(), None)
    }

    /// Push the resolution of `decl` in `env`.
    pub fn push_resolve(&self, site: TraceSite, decl: DeclRef, env: &Rc<Env>) -> Self {
        self.push_frame(site, Activity::Resolve(decl), Vec::new(), Some(Rc::clone(env)))
    }

    fn push_frame(
        &self,
        site: TraceSite,
        activity: Activity,
        args: Vec<Value>,
        env: Option<Rc<Env>>,
    ) -> Self {
        Trace(Some(Rc::new(Frame {
            site,
            activity,
            args,
            env,
            parent: self.clone(),
        })))
    }

    /// Whether `decl` is being resolved in `env` by an enclosing frame.
    pub fn resolving(&self, decl: DeclRef, env: &Rc<Env>) -> bool {
        self.frames().any(|frame| {
            frame.activity == Activity::Resolve(decl)
                && frame.env.as_ref().is_some_and(|e| Rc::ptr_eq(e, env))
        })
    }

    /// Arguments of every enclosing call of `decl`, innermost first.
    pub fn calls(&self, decl: DeclRef) -> impl Iterator<Item = &[Value]> {
        self.frames()
            .filter(move |frame| frame.activity == Activity::Call(decl))
            .map(|frame| frame.args.as_slice())
    }

    fn frames(&self) -> Frames<'_> {
        Frames(self.0.as_deref())
    }

    /// Sites ordered innermost first.
    pub fn sites(&self) -> Vec<TraceSite> {
        self.frames().map(|frame| frame.site.clone()).collect()
    }

    pub fn contains(&self, activity: Activity) -> bool {
        self.frames().any(|frame| frame.activity == activity)
    }

    pub fn depth(&self) -> usize {
        self.frames().count()
    }
}

struct Frames<'a>(Option<&'a Frame>);

impl<'a> Iterator for Frames<'a> {
    type Item = &'a Frame;

    fn next(&mut self) -> Option<Self::Item> {
        let frame = self.0?;
        self.0 = frame.parent.0.as_deref();
        Some(frame)
    }
}

impl std::fmt::Debug for Trace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.sites()).finish()
    }
}

/// A message emitted during compilation.
#[derive(Debug, Clone, Serialize)]
pub struct CompilerMessage {
    /// `None` for plain log messages
    pub code: Option<u32>,
    pub name: Option<String>,
    pub level: Option<MessageLevel>,
    pub context: String,
    pub timestamp: SystemTime,
    /// Enclosing sites, innermost first
    pub trace: Vec<TraceSite>,
}

impl CompilerMessage {
    pub fn is_error(&self) -> bool {
        self.level.is_some_and(|level| level >= MessageLevel::Error)
    }
}

impl std::fmt::Display for CompilerMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.code, &self.name, &self.level) {
            (Some(code), Some(name), Some(level)) => {
                write!(f, "ELE{code} {name} ({level}): {}", self.context)?
            }
            _ => write!(f, "{}", self.context)?,
        }
        for site in &self.trace {
            write!(f, "\n    at {site}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use element_utils::Id;

    #[test]
    fn embedded_catalog_is_complete() {
        let catalog = MessageCatalog::embedded().unwrap();
        catalog.ensure_complete().unwrap();
        let entry = catalog.entry(MessageCode::ArgumentCountMismatch).unwrap();
        assert_eq!(entry.name, "ArgumentCountMismatch");
        assert_eq!(entry.level, MessageLevel::Error);
    }

    #[test]
    fn bad_levels_and_keys_are_internal_errors() {
        let bad_level = r#"{ "ELE1": { "name": "X", "level": "Loud" } }"#;
        assert!(MessageCatalog::from_json(bad_level).unwrap_err().is_internal());
        let bad_key = r#"{ "E1": { "name": "X", "level": "Error" } }"#;
        assert!(MessageCatalog::from_json(bad_key).unwrap_err().is_internal());
    }

    #[test]
    fn incomplete_catalog_is_rejected() {
        let partial = r#"{ "ELE1": { "name": "SerializationError", "level": "Error" } }"#;
        let catalog = MessageCatalog::from_json(partial).unwrap();
        assert!(catalog.ensure_complete().unwrap_err().is_internal());
        assert!(catalog.entry(MessageCode::ParseError).is_err());
    }

    #[test]
    fn levels_are_ordered() {
        assert!(MessageLevel::Verbose < MessageLevel::Information);
        assert!(MessageLevel::Error < MessageLevel::Fatal);
        assert_eq!("Warning".parse::<MessageLevel>(), Ok(MessageLevel::Warning));
    }

    #[test]
    fn trace_snapshots_are_persistent() {
        let span = Span::new(Id::new("t.ele"), 1, 1);
        let root = Trace::empty();
        let outer = root.push(TraceSite::new("outer", span), Activity::Expression);
        let inner = outer.push(
            TraceSite::new("inner", span),
            Activity::Call(DeclRef::new(3)),
        );
        assert_eq!(root.depth(), 0);
        assert_eq!(outer.depth(), 1);
        let names: Vec<_> = inner.sites().into_iter().map(|s| s.what).collect();
        assert_eq!(names, vec!["inner", "outer"]);
        assert!(inner.contains(Activity::Call(DeclRef::new(3))));
        assert!(!outer.contains(Activity::Call(DeclRef::new(3))));
    }
}
