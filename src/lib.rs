//! NodeLink Factory - runtime instantiation of declarative node-graph components
//!
//! This library compiles and caches component templates, constructs live
//! instances with their initial attributes applied in a binding-safe order,
//! attaches them to a visual tree and tracks the ones the caller wants to
//! destroy explicitly.
//!
//! # Example
//!
//! ```rust
//! use std::rc::Rc;
//! use nodelink_factory::{
//!     AttributeSet, CompileMode, ComponentFactory, ContainerRef, FactoryConfig, MarkupEngine,
//!     Ownership, SceneNode,
//! };
//!
//! let engine = MarkupEngine::new();
//! engine.register_source(
//!     "mem:/NodeView.tmpl",
//!     "item NodeView { property title: heading  required property node }",
//! );
//!
//! let config = FactoryConfig::new()
//!     .with_base_path("mem:/")
//!     .with_compile_mode(CompileMode::Synchronous);
//! let mut factory = ComponentFactory::new(config).with_engine(Rc::new(engine));
//!
//! let root = SceneNode::new("graph").shared();
//! let container: ContainerRef = root.clone();
//! let instance = factory
//!     .create(
//!         Some(&container),
//!         "NodeView.tmpl",
//!         &AttributeSet::new().with("heading", "Input"),
//!         &AttributeSet::new().with("node", 7),
//!         Ownership::Tracked,
//!     )
//!     .unwrap();
//!
//! assert_eq!(instance.property("title").unwrap().as_str(), Some("Input"));
//! assert_eq!(root.borrow().children().len(), 1);
//!
//! factory.destroy(instance.id());
//! factory.flush_releases();
//! assert!(root.borrow().children().is_empty());
//! ```

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod factory;
pub mod gate;
pub mod lifecycle;
pub mod markup;
pub mod parser;
pub mod scene;
pub mod template;
pub mod value;

pub use config::{AttributeFile, BatchSpec, ConfigError, FactoryConfig};
pub use context::Context;
pub use engine::{CompileMode, CompileStatus, CompiledTemplate, SceneObject, TemplateEngine};
pub use error::{FactoryError, ParseError};
pub use factory::{ComponentFactory, Ownership};
pub use gate::{EventPump, LocalEventQueue, Readiness, ReadinessGate, SleepPump};
pub use lifecycle::LifecycleTracker;
pub use markup::{MarkupEngine, MarkupError};
pub use scene::{
    AttachmentState, ContainerRef, Instance, InstanceId, InstanceRef, SceneNode, VisualContainer,
};
pub use template::{TemplateCache, TemplateHandle};
pub use value::{AttributeSet, Value};
