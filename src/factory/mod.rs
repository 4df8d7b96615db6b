//! Component factory: compile, construct, attach and track instances
//!
//! A [`ComponentFactory`] turns a template identifier plus initial attributes
//! into a live instance attached to a visual container. It owns the template
//! cache, the readiness gate and the lifecycle tracker, and is passed to the
//! code that needs it rather than living in a global.
//!
//! ```text
//! identifier ─▶ resolve ─▶ cache ─▶ await ready ─▶ construct ─▶ attach ─▶ (track)
//! ```

mod batch;
mod staged;

use std::rc::Rc;

use tracing::{debug, instrument, warn};

use crate::config::FactoryConfig;
use crate::context::Context;
use crate::engine::TemplateEngine;
use crate::error::FactoryError;
use crate::gate::{EventPump, Readiness, ReadinessGate, SleepPump};
use crate::lifecycle::LifecycleTracker;
use crate::scene::{ContainerRef, InstanceId, InstanceRef};
use crate::template::{TemplateCache, TemplateHandle};
use crate::value::AttributeSet;

/// Who is responsible for destroying an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ownership {
    /// The visual tree owns it; it goes away with its container
    #[default]
    Delegated,
    /// The factory tracks it until [`ComponentFactory::destroy`] is called
    Tracked,
}

pub struct ComponentFactory {
    config: FactoryConfig,
    engine: Option<Rc<dyn TemplateEngine>>,
    cache: TemplateCache,
    gate: ReadinessGate,
    pump: Box<dyn EventPump>,
    tracker: LifecycleTracker,
    root_context: Rc<Context>,
}

impl ComponentFactory {
    /// Create a factory with no engine bound.
    ///
    /// Until [`with_event_pump`](Self::with_event_pump) is called, waiting on a
    /// loading template simply sleeps one slice at a time.
    pub fn new(config: FactoryConfig) -> Self {
        let cache = TemplateCache::new(config.base_path.clone(), config.compile_mode);
        let gate = ReadinessGate::new(config.ready_timeout, config.poll_slice);
        Self {
            config,
            engine: None,
            cache,
            gate,
            pump: Box::new(SleepPump),
            tracker: LifecycleTracker::new(),
            root_context: Context::root(),
        }
    }

    /// Use the host's event loop while waiting for templates
    pub fn with_event_pump(mut self, pump: impl EventPump + 'static) -> Self {
        self.pump = Box::new(pump);
        self
    }

    pub fn with_engine(mut self, engine: Rc<dyn TemplateEngine>) -> Self {
        self.bind_engine(engine);
        self
    }

    pub fn bind_engine(&mut self, engine: Rc<dyn TemplateEngine>) {
        self.engine = Some(engine);
    }

    pub fn is_bound(&self) -> bool {
        self.engine.is_some()
    }

    pub fn config(&self) -> &FactoryConfig {
        &self.config
    }

    pub fn cache(&self) -> &TemplateCache {
        &self.cache
    }

    pub fn tracker(&self) -> &LifecycleTracker {
        &self.tracker
    }

    /// Context that construction contexts inherit from when the container has none
    pub fn root_context(&self) -> &Rc<Context> {
        &self.root_context
    }

    /// Canonical URI for `identifier`
    pub fn resolve(&self, identifier: &str) -> String {
        self.cache.resolve(identifier)
    }

    /// Cached or freshly compiled template for `identifier`, without waiting
    pub fn template(&mut self, identifier: &str) -> Result<Rc<TemplateHandle>, FactoryError> {
        let uri = self.cache.resolve(identifier);
        self.cache.get_or_create(self.engine.as_deref(), &uri)
    }

    /// Cached or freshly compiled template, waited on until it is usable.
    ///
    /// A template that fails while loading is evicted so the next request
    /// compiles it again. A timed out template stays cached and keeps loading.
    pub fn ready_template(
        &mut self,
        container: Option<&ContainerRef>,
        identifier: &str,
    ) -> Result<Rc<TemplateHandle>, FactoryError> {
        if self.engine.is_none() {
            if let Some(engine) = container.and_then(|c| c.borrow().engine()) {
                debug!("binding engine from container");
                self.engine = Some(engine);
            }
        }

        let handle = self.template(identifier)?;
        match self.gate.await_ready(&handle, self.pump.as_mut()) {
            Readiness::Ready => Ok(handle),
            Readiness::Error(detail) => {
                warn!(uri = handle.uri(), %detail, "template failed to load");
                self.cache.evict(handle.uri());
                Err(FactoryError::Compile {
                    uri: handle.uri().to_string(),
                    detail,
                })
            }
            Readiness::Timeout => {
                warn!(uri = handle.uri(), "template still loading after timeout");
                Err(FactoryError::Timeout {
                    uri: handle.uri().to_string(),
                    waited: self.gate.timeout(),
                })
            }
        }
    }

    /// Construct one instance of `identifier` and attach it to `container`.
    ///
    /// `contextual` attributes are visible to the template's initializers;
    /// `direct` attributes are written onto the object before completion.
    #[instrument(skip(self, container, contextual, direct))]
    pub fn create(
        &mut self,
        container: Option<&ContainerRef>,
        identifier: &str,
        contextual: &AttributeSet,
        direct: &AttributeSet,
        ownership: Ownership,
    ) -> Result<InstanceRef, FactoryError> {
        let container = container.ok_or(FactoryError::NoContainer)?;
        self.flush_releases();

        let handle = self.ready_template(Some(container), identifier)?;
        let instance =
            staged::construct(&handle, container, &self.root_context, contextual, direct)?;
        self.adopt(&instance, ownership);
        Ok(instance)
    }

    fn adopt(&mut self, instance: &InstanceRef, ownership: Ownership) {
        if ownership == Ownership::Tracked {
            self.tracker.register(Rc::clone(instance));
        }
    }

    /// Stop tracking `id` and schedule its release. Unknown ids are ignored.
    pub fn destroy(&mut self, id: InstanceId) -> bool {
        self.tracker.destroy(id)
    }

    pub fn destroy_all(&mut self, ids: &[InstanceId]) -> usize {
        self.tracker.destroy_all(ids)
    }

    /// Detach and release everything destroyed since the last flush.
    ///
    /// Creation calls this on entry, so hosts only need it when they want
    /// memory back before the next creation.
    pub fn flush_releases(&mut self) -> usize {
        self.tracker.flush()
    }

    /// Destroy every tracked instance, drop all cached templates and unbind the engine
    pub fn teardown(&mut self) {
        let destroyed = self.tracker.destroy_everything();
        let released = self.tracker.flush();
        let templates = self.cache.len();
        self.cache.clear();
        self.engine = None;
        if destroyed > 0 || templates > 0 {
            debug!(destroyed, released, templates, "factory torn down");
        }
    }
}

impl Drop for ComponentFactory {
    fn drop(&mut self) {
        self.teardown();
    }
}
