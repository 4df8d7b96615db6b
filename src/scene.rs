//! Live instances and the visual containers they attach to

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::warn;

use crate::context::Context;
use crate::engine::{SceneObject, TemplateEngine};
use crate::value::Value;

static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

/// Shared handle to a visual container
pub type ContainerRef = Rc<RefCell<dyn VisualContainer>>;

/// Shared handle to a live instance
pub type InstanceRef = Rc<Instance>;

/// A node of the visual tree that instances attach to
pub trait VisualContainer {
    fn name(&self) -> &str;

    /// Context that construction contexts for children should inherit from
    fn context(&self) -> Option<Rc<Context>> {
        None
    }

    /// Engine the container was created by, used when the factory has none bound
    fn engine(&self) -> Option<Rc<dyn TemplateEngine>> {
        None
    }

    fn attach_child(&mut self, child: InstanceRef);

    fn detach_child(&mut self, id: InstanceId) -> Option<InstanceRef>;
}

/// Stable identity of an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where an instance is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentState {
    Constructed,
    Attached,
    Detached,
    Destroyed,
}

impl fmt::Display for AttachmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttachmentState::Constructed => "constructed",
            AttachmentState::Attached => "attached",
            AttachmentState::Detached => "detached",
            AttachmentState::Destroyed => "destroyed",
        };
        f.write_str(name)
    }
}

// Field order matters: the object is dropped before the context that owns its scope.
struct InstanceParts {
    object: Option<Box<dyn SceneObject>>,
    context: Option<Rc<Context>>,
    state: AttachmentState,
    parent: Option<Weak<RefCell<dyn VisualContainer>>>,
}

/// A constructed object together with the context it was built in
pub struct Instance {
    id: InstanceId,
    uri: String,
    parts: RefCell<InstanceParts>,
}

impl Instance {
    pub(crate) fn new(uri: &str, object: Box<dyn SceneObject>, context: Rc<Context>) -> InstanceRef {
        Rc::new(Self {
            id: InstanceId(NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed)),
            uri: uri.to_string(),
            parts: RefCell::new(InstanceParts {
                object: Some(object),
                context: Some(context),
                state: AttachmentState::Constructed,
                parent: None,
            }),
        })
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    /// Canonical URI of the template this instance was built from
    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn state(&self) -> AttachmentState {
        self.parts.borrow().state
    }

    pub fn is_destroyed(&self) -> bool {
        self.state() == AttachmentState::Destroyed
    }

    pub fn type_name(&self) -> Option<String> {
        self.with_object(|object| object.type_name().to_string())
    }

    pub fn property(&self, name: &str) -> Option<Value> {
        self.with_object(|object| object.property(name)).flatten()
    }

    pub fn properties(&self) -> Vec<(String, Value)> {
        self.with_object(|object| object.properties())
            .unwrap_or_default()
    }

    /// Run `f` against the backing object, unless it was released
    pub fn with_object<R>(&self, f: impl FnOnce(&dyn SceneObject) -> R) -> Option<R> {
        let parts = self.parts.borrow();
        parts.object.as_deref().map(|object| f(object))
    }

    /// The construction context owned by this instance
    pub fn context(&self) -> Option<Rc<Context>> {
        self.parts.borrow().context.clone()
    }

    /// The container this instance is attached to, if it is still alive
    pub fn parent(&self) -> Option<ContainerRef> {
        self.parts.borrow().parent.as_ref().and_then(Weak::upgrade)
    }

    /// Name of the container the visual object reports as its parent
    pub fn parent_name(&self) -> Option<String> {
        let mut parts = self.parts.borrow_mut();
        let visual = parts.object.as_mut()?.as_visual_mut()?;
        visual.parent_name().map(str::to_string)
    }

    pub(crate) fn is_visual(&self) -> bool {
        let mut parts = self.parts.borrow_mut();
        parts
            .object
            .as_mut()
            .is_some_and(|object| object.as_visual_mut().is_some())
    }

    pub(crate) fn attach_to(self: &Rc<Self>, container: &ContainerRef) {
        let name = container.borrow().name().to_string();
        {
            let mut parts = self.parts.borrow_mut();
            if let Some(visual) = parts.object.as_mut().and_then(|o| o.as_visual_mut()) {
                visual.set_parent_name(Some(&name));
            }
            parts.parent = Some(Rc::downgrade(container));
            parts.state = AttachmentState::Attached;
        }
        container.borrow_mut().attach_child(Rc::clone(self));
    }

    /// Remove this instance from its container, keeping the object alive.
    ///
    /// Returns false if it was not attached to a live container.
    pub fn detach(&self) -> bool {
        let parent = {
            let mut parts = self.parts.borrow_mut();
            if parts.state != AttachmentState::Attached {
                return false;
            }
            parts.state = AttachmentState::Detached;
            if let Some(visual) = parts.object.as_mut().and_then(|o| o.as_visual_mut()) {
                visual.set_parent_name(None);
            }
            parts.parent.take().and_then(|weak| weak.upgrade())
        };

        let Some(container) = parent else {
            return false;
        };
        let detached = match container.try_borrow_mut() {
            Ok(mut container) => container.detach_child(self.id).is_some(),
            Err(_) => {
                warn!(instance = %self.id, "container busy, child left in place");
                false
            }
        };
        detached
    }

    /// Drop the backing object, then its context.
    ///
    /// Returns false if the instance was already destroyed.
    pub(crate) fn release(&self) -> bool {
        let (object, context) = {
            let mut parts = self.parts.borrow_mut();
            if parts.state == AttachmentState::Destroyed {
                return false;
            }
            parts.state = AttachmentState::Destroyed;
            parts.parent = None;
            (parts.object.take(), parts.context.take())
        };
        drop(object);
        drop(context);
        true
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("id", &self.id)
            .field("uri", &self.uri)
            .field("state", &self.state())
            .finish()
    }
}

/// A plain visual container holding an ordered list of child instances
pub struct SceneNode {
    name: String,
    context: Option<Rc<Context>>,
    engine: Option<Rc<dyn TemplateEngine>>,
    children: Vec<InstanceRef>,
}

impl SceneNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            context: None,
            engine: None,
            children: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: Rc<Context>) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_engine(mut self, engine: Rc<dyn TemplateEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Wrap the node for sharing with the factory
    pub fn shared(self) -> Rc<RefCell<SceneNode>> {
        Rc::new(RefCell::new(self))
    }

    pub fn children(&self) -> &[InstanceRef] {
        &self.children
    }

    /// Render the node and its children as an indented tree
    pub fn dump(&self) -> String {
        let mut out = format!("{}\n", self.name);
        for child in &self.children {
            let type_name = child.type_name().unwrap_or_else(|| "<released>".to_string());
            out.push_str(&format!(
                "  {} {} [{}] {}\n",
                type_name,
                child.id(),
                child.state(),
                child.uri()
            ));
            for (name, value) in child.properties() {
                out.push_str(&format!("    {} = {}\n", name, value));
            }
        }
        out
    }
}

impl VisualContainer for SceneNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn context(&self) -> Option<Rc<Context>> {
        self.context.clone()
    }

    fn engine(&self) -> Option<Rc<dyn TemplateEngine>> {
        self.engine.clone()
    }

    fn attach_child(&mut self, child: InstanceRef) {
        if !self.children.iter().any(|c| c.id() == child.id()) {
            self.children.push(child);
        }
    }

    fn detach_child(&mut self, id: InstanceId) -> Option<InstanceRef> {
        let index = self.children.iter().position(|c| c.id() == id)?;
        Some(self.children.remove(index))
    }
}
