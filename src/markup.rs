//! Built-in template engine for the component markup
//!
//! Components are small declarative files:
//!
//! ```text
//! item NodeView {
//!     property title: heading      // read from the construction context
//!     property color: "#4488ff"
//!     required property node       // must be set before completion
//!     property ports: [1, 2]
//! }
//! ```
//!
//! Sources are looked up through resource roots (URI prefix -> directory),
//! `file:` URIs, plain paths, or sources registered in memory. With an event
//! queue attached, asynchronous compiles finish from that queue.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::rc::Rc;

use indexmap::IndexMap;
use thiserror::Error;
use tracing::debug;

use crate::context::Context;
use crate::engine::{
    BindingSetter, CompileMode, CompileStatus, CompiledTemplate, ReflectiveSetter, SceneObject,
    TemplateEngine, VisualItem,
};
use crate::gate::LocalEventQueue;
use crate::parser::{self, ComponentDecl, ComponentKind, Expr};
use crate::template::is_absolute;
use crate::value::Value;

/// Errors that can occur while loading or compiling markup
#[derive(Error, Debug)]
pub enum MarkupError {
    #[error("no source registered for '{0}'")]
    NotFound(String),

    #[error("failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse '{uri}':\n{report}")]
    Parse { uri: String, report: String },

    #[error("property '{name}' declared twice in '{uri}'")]
    DuplicateProperty { uri: String, name: String },
}

/// Template engine that compiles component markup
#[derive(Default)]
pub struct MarkupEngine {
    roots: IndexMap<String, PathBuf>,
    sources: RefCell<HashMap<String, String>>,
    queue: Option<Rc<LocalEventQueue>>,
    compiles: Cell<usize>,
}

impl MarkupEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read URIs starting with `prefix` from files under `dir`
    pub fn with_root(mut self, prefix: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        self.roots.insert(prefix.into(), dir.into());
        self
    }

    pub fn with_roots(mut self, roots: IndexMap<String, PathBuf>) -> Self {
        self.roots.extend(roots);
        self
    }

    /// Finish asynchronous compiles from `queue` instead of immediately
    pub fn with_queue(mut self, queue: Rc<LocalEventQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Serve `source` for `uri` without touching the filesystem
    pub fn register_source(&self, uri: impl Into<String>, source: impl Into<String>) {
        self.sources.borrow_mut().insert(uri.into(), source.into());
    }

    /// Number of compiles requested so far
    pub fn compile_count(&self) -> usize {
        self.compiles.get()
    }

    /// Filesystem path for `uri`, if it maps to one
    pub fn locate(&self, uri: &str) -> Option<PathBuf> {
        let root = self
            .roots
            .iter()
            .filter(|(prefix, _)| uri.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len());
        if let Some((prefix, dir)) = root {
            return Some(dir.join(uri[prefix.len()..].trim_start_matches('/')));
        }

        if let Some(path) = uri.strip_prefix("file://") {
            return Some(PathBuf::from(path));
        }
        if let Some(path) = uri.strip_prefix("file:") {
            return Some(PathBuf::from(path));
        }
        // Unmapped schemes have no file behind them; drive letters do
        let has_drive = uri.len() >= 2 && uri.as_bytes()[1] == b':' && uri.as_bytes()[0].is_ascii_alphabetic();
        if is_absolute(uri) && uri.contains(':') && !has_drive {
            return None;
        }
        Some(PathBuf::from(uri))
    }

    fn read_source(&self, uri: &str) -> Result<String, MarkupError> {
        if let Some(source) = self.sources.borrow().get(uri) {
            return Ok(source.clone());
        }
        let path = self
            .locate(uri)
            .ok_or_else(|| MarkupError::NotFound(uri.to_string()))?;
        std::fs::read_to_string(&path).map_err(|source| MarkupError::Io { path, source })
    }
}

impl TemplateEngine for MarkupEngine {
    fn compile(&self, uri: &str, mode: CompileMode) -> Rc<dyn CompiledTemplate> {
        self.compiles.set(self.compiles.get() + 1);
        let template = Rc::new(MarkupTemplate::loading(uri));
        let source = self.read_source(uri);

        match (mode, &self.queue) {
            (CompileMode::Asynchronous, Some(queue)) => {
                debug!(uri, "queued markup compile");
                let target = Rc::clone(&template);
                let uri = uri.to_string();
                queue.post(move || target.finish(source.and_then(|s| compile_source(&uri, &s))));
            }
            _ => template.finish(source.and_then(|s| compile_source(uri, &s))),
        }
        template
    }
}

/// Parse and check one component source
pub fn compile_source(uri: &str, source: &str) -> Result<ComponentDecl, MarkupError> {
    let decl = parser::parse(source).map_err(|errors| MarkupError::Parse {
        uri: uri.to_string(),
        report: errors
            .iter()
            .map(|e| e.format(source, uri))
            .collect::<Vec<_>>()
            .join("\n"),
    })?;

    let mut seen = HashSet::new();
    for property in &decl.properties {
        let name = property.node.name.node.as_str();
        if !seen.insert(name) {
            return Err(MarkupError::DuplicateProperty {
                uri: uri.to_string(),
                name: name.to_string(),
            });
        }
    }
    Ok(decl)
}

enum TemplateState {
    Loading,
    Ready(Rc<ComponentDecl>),
    Error(String),
}

/// A markup component, compiled or still compiling
pub struct MarkupTemplate {
    uri: String,
    state: RefCell<TemplateState>,
}

impl MarkupTemplate {
    fn loading(uri: &str) -> Self {
        Self {
            uri: uri.to_string(),
            state: RefCell::new(TemplateState::Loading),
        }
    }

    fn finish(&self, result: Result<ComponentDecl, MarkupError>) {
        let state = match result {
            Ok(decl) => {
                debug!(uri = %self.uri, component = %decl.name.node, "markup compiled");
                TemplateState::Ready(Rc::new(decl))
            }
            Err(err) => TemplateState::Error(err.to_string()),
        };
        *self.state.borrow_mut() = state;
    }

    fn decl(&self) -> Option<Rc<ComponentDecl>> {
        match &*self.state.borrow() {
            TemplateState::Ready(decl) => Some(Rc::clone(decl)),
            _ => None,
        }
    }
}

impl CompiledTemplate for MarkupTemplate {
    fn status(&self) -> CompileStatus {
        match &*self.state.borrow() {
            TemplateState::Loading => CompileStatus::Loading,
            TemplateState::Ready(_) => CompileStatus::Ready,
            TemplateState::Error(detail) => CompileStatus::Error(detail.clone()),
        }
    }

    fn begin_construct(&self, context: &Rc<Context>) -> Option<Box<dyn SceneObject>> {
        let decl = self.decl()?;
        let declared = decl
            .properties
            .iter()
            .map(|p| {
                let value = p
                    .node
                    .init
                    .as_ref()
                    .map_or(Value::Null, |init| evaluate(&init.node, context));
                (p.node.name.node.0.clone(), value)
            })
            .collect();

        Some(Box::new(MarkupObject {
            type_name: decl.name.node.0.clone(),
            visual: decl.kind == ComponentKind::Item,
            parent: None,
            declared,
            dynamic: IndexMap::new(),
        }))
    }

    fn complete_construct(
        &self,
        object: &mut dyn SceneObject,
        _context: &Rc<Context>,
    ) -> Result<(), String> {
        let decl = self
            .decl()
            .ok_or_else(|| format!("'{}' is not compiled", self.uri))?;

        let missing: Vec<&str> = decl
            .properties
            .iter()
            .filter(|p| p.node.required)
            .map(|p| p.node.name.node.as_str())
            .filter(|name| object.property(name).map_or(true, |v| v.is_null()))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(format!(
                "required property not set: {}",
                missing.join(", ")
            ))
        }
    }
}

fn evaluate(expr: &Expr, context: &Context) -> Value {
    match expr {
        Expr::Literal(value) => value.clone(),
        Expr::ContextRef(name) => context.property(name.as_str()).unwrap_or_default(),
        Expr::List(items) => Value::List(items.iter().map(|i| evaluate(&i.node, context)).collect()),
    }
}

/// Object produced by a [`MarkupTemplate`].
///
/// Declared properties take typed writes; anything else lands in a dynamic
/// property map.
#[derive(Debug)]
pub struct MarkupObject {
    type_name: String,
    visual: bool,
    parent: Option<String>,
    declared: IndexMap<String, Value>,
    dynamic: IndexMap<String, Value>,
}

impl MarkupObject {
    pub fn is_visual(&self) -> bool {
        self.visual
    }

    pub fn dynamic_properties(&self) -> &IndexMap<String, Value> {
        &self.dynamic
    }
}

impl SceneObject for MarkupObject {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn as_visual_mut(&mut self) -> Option<&mut dyn VisualItem> {
        if self.visual {
            Some(self)
        } else {
            None
        }
    }

    fn binding_setter(&mut self) -> Option<&mut dyn BindingSetter> {
        Some(self)
    }

    fn reflective_setter(&mut self) -> Option<&mut dyn ReflectiveSetter> {
        Some(self)
    }

    fn property(&self, name: &str) -> Option<Value> {
        self.declared
            .get(name)
            .or_else(|| self.dynamic.get(name))
            .cloned()
    }

    fn properties(&self) -> Vec<(String, Value)> {
        self.declared
            .iter()
            .chain(self.dynamic.iter())
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
}

impl VisualItem for MarkupObject {
    fn set_parent_name(&mut self, parent: Option<&str>) {
        self.parent = parent.map(str::to_string);
    }

    fn parent_name(&self) -> Option<&str> {
        self.parent.as_deref()
    }
}

impl BindingSetter for MarkupObject {
    fn is_writable(&self, name: &str) -> bool {
        self.declared.contains_key(name)
    }

    fn write(&mut self, name: &str, value: &Value) -> bool {
        match self.declared.get_mut(name) {
            Some(slot) if slot.accepts(value) => {
                *slot = value.clone();
                true
            }
            _ => false,
        }
    }
}

impl ReflectiveSetter for MarkupObject {
    // Declared names only take typed writes
    fn set_dynamic(&mut self, name: &str, value: &Value) -> bool {
        if self.declared.contains_key(name) {
            return false;
        }
        self.dynamic.insert(name.to_string(), value.clone());
        true
    }
}
