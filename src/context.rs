//! Scoped property contexts used during component construction
//!
//! A context is a property store with an optional parent. Property lookups
//! walk outward through the parents until a value is found, so attributes
//! written into a construction context shadow values from the container's
//! context and the factory's root context.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::value::{AttributeSet, Value};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identity of a context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx{}", self.0)
    }
}

#[derive(Debug)]
pub struct Context {
    id: ContextId,
    parent: Option<Rc<Context>>,
    properties: RefCell<AttributeSet>,
}

impl Context {
    /// Create a context with no parent
    pub fn root() -> Rc<Self> {
        Rc::new(Self {
            id: ContextId(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed)),
            parent: None,
            properties: RefCell::new(AttributeSet::new()),
        })
    }

    /// Create a context whose lookups fall back to `parent`
    pub fn child(parent: &Rc<Context>) -> Rc<Self> {
        Rc::new(Self {
            id: ContextId(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed)),
            parent: Some(Rc::clone(parent)),
            properties: RefCell::new(AttributeSet::new()),
        })
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn parent(&self) -> Option<&Rc<Context>> {
        self.parent.as_ref()
    }

    /// Set a property on this context (never on a parent)
    pub fn set_property(&self, name: &str, value: Value) {
        self.properties.borrow_mut().insert(name, value);
    }

    /// Look a property up here, then in each parent in turn
    pub fn property(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.properties.borrow().get(name) {
            return Some(value.clone());
        }
        self.parent.as_ref().and_then(|parent| parent.property(name))
    }

    /// Whether `name` is set on this context itself
    pub fn has_own_property(&self, name: &str) -> bool {
        self.properties.borrow().contains(name)
    }

    /// Number of contexts from here up to the root, counting this one
    pub fn depth(&self) -> usize {
        1 + self.parent.as_ref().map_or(0, |parent| parent.depth())
    }
}
