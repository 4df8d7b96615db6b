//! Collaborator interfaces for the template runtime and produced objects
//!
//! The factory never knows how templates are compiled or what the objects it
//! builds look like. It talks to a [`TemplateEngine`] to obtain compiled
//! templates and drives each [`CompiledTemplate`] through the construction
//! protocol. Produced objects advertise optional capabilities: being
//! attachable to the visual tree, a binding-aware property setter, and a
//! generic reflective setter.

use std::fmt;
use std::rc::Rc;

use serde::Deserialize;

use crate::context::Context;
use crate::value::Value;

/// Compilation state of a template
#[derive(Debug, Clone, PartialEq)]
pub enum CompileStatus {
    Loading,
    Ready,
    Error(String),
}

impl CompileStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, CompileStatus::Loading)
    }
}

impl fmt::Display for CompileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileStatus::Loading => write!(f, "loading"),
            CompileStatus::Ready => write!(f, "ready"),
            CompileStatus::Error(detail) => write!(f, "error: {}", detail),
        }
    }
}

/// How the engine should compile a template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompileMode {
    /// The engine may return a `Loading` template and finish later from the host event queue
    #[default]
    Asynchronous,
    /// The returned template is already terminal
    Synchronous,
}

/// The template compiler and runtime
pub trait TemplateEngine {
    /// Start compiling the template at `uri`.
    ///
    /// The returned template may still be loading. Its status changes in place
    /// as compilation progresses.
    fn compile(&self, uri: &str, mode: CompileMode) -> Rc<dyn CompiledTemplate>;
}

/// A compiled (or compiling) template
pub trait CompiledTemplate {
    fn status(&self) -> CompileStatus;

    /// Begin constructing an object against `context`.
    ///
    /// Initialization logic runs here and may read the context. Returns `None`
    /// if no object could be produced.
    fn begin_construct(&self, context: &Rc<Context>) -> Option<Box<dyn SceneObject>>;

    /// Finish construction once all initial attributes are written.
    ///
    /// Completion hooks fire and internal bindings activate here.
    fn complete_construct(
        &self,
        object: &mut dyn SceneObject,
        context: &Rc<Context>,
    ) -> Result<(), String>;
}

/// An object produced by a compiled template
pub trait SceneObject {
    /// Name of the object's type, used in diagnostics and dumps
    fn type_name(&self) -> &str;

    /// The visual capability. Objects without it cannot join the visual tree.
    fn as_visual_mut(&mut self) -> Option<&mut dyn VisualItem> {
        None
    }

    /// The binding-aware property setter, if the object exposes one
    fn binding_setter(&mut self) -> Option<&mut dyn BindingSetter> {
        None
    }

    /// The generic key/value setter, if the object exposes one
    fn reflective_setter(&mut self) -> Option<&mut dyn ReflectiveSetter> {
        None
    }

    /// Read a property back
    fn property(&self, _name: &str) -> Option<Value> {
        None
    }

    /// All readable properties in a stable order
    fn properties(&self) -> Vec<(String, Value)> {
        Vec::new()
    }
}

/// Capability of objects that can be attached to a visual container
pub trait VisualItem {
    fn set_parent_name(&mut self, parent: Option<&str>);

    fn parent_name(&self) -> Option<&str>;
}

/// Typed, binding-aware property writes
pub trait BindingSetter {
    /// Whether `name` is a declared, writable property
    fn is_writable(&self, name: &str) -> bool;

    /// Write a declared property. Returns false if the value is rejected.
    fn write(&mut self, name: &str, value: &Value) -> bool;
}

/// Untyped property writes by name
pub trait ReflectiveSetter {
    /// Returns false if the object refuses the property
    fn set_dynamic(&mut self, name: &str, value: &Value) -> bool;
}

/// Which setter tier accepted a direct attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeWrite {
    Bound,
    Reflective,
    Dropped,
}

/// Apply one direct attribute, preferring the binding-aware tier
pub fn write_attribute(object: &mut dyn SceneObject, name: &str, value: &Value) -> AttributeWrite {
    if let Some(setter) = object.binding_setter() {
        if setter.is_writable(name) {
            // A declared property never falls through to a dynamic one of the same name.
            return if setter.write(name, value) {
                AttributeWrite::Bound
            } else {
                AttributeWrite::Dropped
            };
        }
    }
    if let Some(setter) = object.reflective_setter() {
        if setter.set_dynamic(name, value) {
            return AttributeWrite::Reflective;
        }
    }
    AttributeWrite::Dropped
}
