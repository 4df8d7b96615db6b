//! Scripted collaborators shared by the integration tests

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::time::Duration;

use indexmap::IndexMap;
use nodelink_factory::engine::{BindingSetter, ReflectiveSetter, VisualItem};
use nodelink_factory::{
    CompileMode, CompileStatus, CompiledTemplate, Context, EventPump, SceneObject,
    TemplateEngine, Value,
};

/// What a fake template does when asked to construct
#[derive(Debug, Clone, PartialEq)]
pub enum Behavior {
    /// A visual object, unless its `model` property ends up as 3
    Visual,
    /// An object without the visual capability
    NonVisual,
    /// `begin_construct` yields nothing
    NoObject,
    /// `complete_construct` fails with this detail
    FailCompletion(String),
}

/// Context values seen by `begin_construct`
#[derive(Debug, Clone, PartialEq)]
pub struct Observed {
    pub title: Option<Value>,
    pub theme: Option<Value>,
    pub model: Option<Value>,
}

pub struct FakeTemplate {
    status: RefCell<CompileStatus>,
    behavior: Behavior,
    reflective: bool,
    pub drops: Rc<Cell<usize>>,
    pub contexts: RefCell<Vec<Weak<Context>>>,
    pub observed: RefCell<Vec<Observed>>,
}

impl FakeTemplate {
    pub fn new(status: CompileStatus, behavior: Behavior) -> Rc<Self> {
        Rc::new(Self {
            status: RefCell::new(status),
            behavior,
            reflective: true,
            drops: Rc::new(Cell::new(0)),
            contexts: RefCell::new(Vec::new()),
            observed: RefCell::new(Vec::new()),
        })
    }

    pub fn ready(behavior: Behavior) -> Rc<Self> {
        Self::new(CompileStatus::Ready, behavior)
    }

    /// A ready visual template whose objects have no reflective setter
    pub fn strict() -> Rc<Self> {
        Rc::new(Self {
            status: RefCell::new(CompileStatus::Ready),
            behavior: Behavior::Visual,
            reflective: false,
            drops: Rc::new(Cell::new(0)),
            contexts: RefCell::new(Vec::new()),
            observed: RefCell::new(Vec::new()),
        })
    }

    pub fn set_status(&self, status: CompileStatus) {
        *self.status.borrow_mut() = status;
    }

    pub fn live_contexts(&self) -> usize {
        self.contexts
            .borrow()
            .iter()
            .filter(|weak| weak.upgrade().is_some())
            .count()
    }
}

impl CompiledTemplate for FakeTemplate {
    fn status(&self) -> CompileStatus {
        self.status.borrow().clone()
    }

    fn begin_construct(&self, context: &Rc<Context>) -> Option<Box<dyn SceneObject>> {
        self.contexts.borrow_mut().push(Rc::downgrade(context));
        self.observed.borrow_mut().push(Observed {
            title: context.property("title"),
            theme: context.property("theme"),
            model: context.property("model"),
        });

        if self.behavior == Behavior::NoObject {
            return None;
        }

        let mut declared = IndexMap::new();
        declared.insert("width".to_string(), Value::Int(10));
        declared.insert("model".to_string(), Value::Null);
        declared.insert("color".to_string(), Value::Null);

        Some(Box::new(FakeObject {
            visual: self.behavior != Behavior::NonVisual,
            parent: None,
            declared,
            dynamic: self.reflective.then(IndexMap::new),
            drops: Rc::clone(&self.drops),
        }))
    }

    fn complete_construct(
        &self,
        _object: &mut dyn SceneObject,
        _context: &Rc<Context>,
    ) -> Result<(), String> {
        match &self.behavior {
            Behavior::FailCompletion(detail) => Err(detail.clone()),
            _ => Ok(()),
        }
    }
}

pub struct FakeObject {
    visual: bool,
    parent: Option<String>,
    declared: IndexMap<String, Value>,
    dynamic: Option<IndexMap<String, Value>>,
    drops: Rc<Cell<usize>>,
}

impl SceneObject for FakeObject {
    fn type_name(&self) -> &str {
        if self.visual {
            "FakeItem"
        } else {
            "FakeModel"
        }
    }

    fn as_visual_mut(&mut self) -> Option<&mut dyn VisualItem> {
        let demoted = self.declared.get("model") == Some(&Value::Int(3));
        if self.visual && !demoted {
            Some(self)
        } else {
            None
        }
    }

    fn binding_setter(&mut self) -> Option<&mut dyn BindingSetter> {
        Some(self)
    }

    fn reflective_setter(&mut self) -> Option<&mut dyn ReflectiveSetter> {
        if self.dynamic.is_some() {
            Some(self)
        } else {
            None
        }
    }

    fn property(&self, name: &str) -> Option<Value> {
        self.declared
            .get(name)
            .or_else(|| self.dynamic.as_ref().and_then(|d| d.get(name)))
            .cloned()
    }

    fn properties(&self) -> Vec<(String, Value)> {
        let dynamic = self.dynamic.iter().flat_map(|d| d.iter());
        self.declared
            .iter()
            .chain(dynamic)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl VisualItem for FakeObject {
    fn set_parent_name(&mut self, parent: Option<&str>) {
        self.parent = parent.map(str::to_string);
    }

    fn parent_name(&self) -> Option<&str> {
        self.parent.as_deref()
    }
}

impl BindingSetter for FakeObject {
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

impl ReflectiveSetter for FakeObject {
    fn set_dynamic(&mut self, name: &str, value: &Value) -> bool {
        match self.dynamic.as_mut() {
            Some(dynamic) => {
                dynamic.insert(name.to_string(), value.clone());
                true
            }
            None => false,
        }
    }
}

impl Drop for FakeObject {
    fn drop(&mut self) {
        self.drops.set(self.drops.get() + 1);
    }
}

/// Engine serving pre-registered fake templates by URI
#[derive(Default)]
pub struct FakeEngine {
    templates: RefCell<HashMap<String, Rc<FakeTemplate>>>,
    compiles: Cell<usize>,
}

impl FakeEngine {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Serve `template` for `uri` from the next compile on
    pub fn add(&self, uri: &str, template: Rc<FakeTemplate>) -> Rc<FakeTemplate> {
        self.templates
            .borrow_mut()
            .insert(uri.to_string(), Rc::clone(&template));
        template
    }

    pub fn compiles(&self) -> usize {
        self.compiles.get()
    }
}

impl TemplateEngine for FakeEngine {
    fn compile(&self, uri: &str, _mode: CompileMode) -> Rc<dyn CompiledTemplate> {
        self.compiles.set(self.compiles.get() + 1);
        match self.templates.borrow().get(uri) {
            Some(template) => Rc::clone(template) as Rc<dyn CompiledTemplate>,
            None => FakeTemplate::new(
                CompileStatus::Error(format!("no such template: {}", uri)),
                Behavior::NoObject,
            ),
        }
    }
}

/// Simulated host loop: each call reports a full slice and may flip a template
pub struct ScriptedPump {
    pub calls: Rc<Cell<usize>>,
    finish_after: usize,
    target: Option<(Rc<FakeTemplate>, CompileStatus)>,
}

impl ScriptedPump {
    /// A pump that never changes anything
    pub fn idle() -> Self {
        Self {
            calls: Rc::new(Cell::new(0)),
            finish_after: usize::MAX,
            target: None,
        }
    }

    /// Set `template` to `status` on the `after`-th call
    pub fn finishing(template: &Rc<FakeTemplate>, after: usize, status: CompileStatus) -> Self {
        Self {
            calls: Rc::new(Cell::new(0)),
            finish_after: after,
            target: Some((Rc::clone(template), status)),
        }
    }
}

impl EventPump for ScriptedPump {
    fn process_pending_events(&mut self, max_slice: Duration) -> Duration {
        let calls = self.calls.get() + 1;
        self.calls.set(calls);
        if calls == self.finish_after {
            if let Some((template, status)) = &self.target {
                template.set_status(status.clone());
            }
        }
        max_slice
    }
}
