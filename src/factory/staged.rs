//! The staged construction protocol for a single instance

use std::rc::Rc;

use tracing::{debug, warn};

use crate::context::Context;
use crate::engine::{write_attribute, AttributeWrite};
use crate::error::FactoryError;
use crate::scene::{ContainerRef, Instance, InstanceRef};
use crate::template::TemplateHandle;
use crate::value::AttributeSet;

/// Build one instance from a ready template and attach it to `container`.
///
/// Contextual attributes are written into a fresh construction context before
/// the object exists, so initializers observe them. Direct attributes are
/// written between begin and complete, before any completion hook runs. On
/// every failure path the object (if any) is released before its context.
pub(crate) fn construct(
    handle: &TemplateHandle,
    container: &ContainerRef,
    root_context: &Rc<Context>,
    contextual: &AttributeSet,
    direct: &AttributeSet,
) -> Result<InstanceRef, FactoryError> {
    let uri = handle.uri();
    let compiled = handle.compiled();

    let parent_context = container
        .borrow()
        .context()
        .unwrap_or_else(|| Rc::clone(root_context));
    let context = Context::child(&parent_context);
    for (name, value) in contextual.iter() {
        context.set_property(name, value.clone());
    }

    let Some(mut object) = compiled.begin_construct(&context) else {
        warn!(uri, "template produced no object");
        return Err(FactoryError::ConstructionFailed {
            uri: uri.to_string(),
        });
    };

    for (name, value) in direct.iter() {
        match write_attribute(object.as_mut(), name, value) {
            AttributeWrite::Dropped => {
                debug!(uri, attribute = name, "no setter accepted attribute, dropped")
            }
            tier => debug!(uri, attribute = name, ?tier, "attribute written"),
        }
    }

    if let Err(detail) = compiled.complete_construct(object.as_mut(), &context) {
        warn!(uri, %detail, "completion failed");
        drop(object);
        drop(context);
        return Err(FactoryError::CompletionFailed {
            uri: uri.to_string(),
            detail,
        });
    }

    // From here on the instance owns the context and releases it after the object
    let instance = Instance::new(uri, object, context);

    if !instance.is_visual() {
        let type_name = instance.type_name().unwrap_or_default();
        warn!(uri, %type_name, "object is not a visual item");
        instance.release();
        return Err(FactoryError::IncompatibleType {
            uri: uri.to_string(),
            type_name,
        });
    }

    instance.attach_to(container);
    debug!(uri, instance = %instance.id(), "instance attached");
    Ok(instance)
}
