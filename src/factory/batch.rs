//! Many instances of one template from a sequence of values

use std::time::Instant;

use tracing::{debug, instrument, warn};

use super::{staged, ComponentFactory, Ownership};
use crate::scene::{ContainerRef, InstanceRef};
use crate::value::{AttributeSet, Value};

impl ComponentFactory {
    /// Create one instance per element of `values`.
    ///
    /// Every instance gets `base` as its direct attributes with `key` set to
    /// its element. The template is resolved and awaited once. Elements that
    /// fail are logged and skipped, so the result keeps input order but may
    /// be shorter than `values`.
    #[instrument(skip(self, values, container, base), fields(count = values.len()))]
    pub fn create_many(
        &mut self,
        key: &str,
        values: &[Value],
        container: Option<&ContainerRef>,
        identifier: &str,
        base: &AttributeSet,
        ownership: Ownership,
    ) -> Vec<InstanceRef> {
        let Some(container) = container else {
            warn!("no container for batch");
            return Vec::new();
        };
        if values.is_empty() {
            return Vec::new();
        }
        self.flush_releases();

        let handle = match self.ready_template(Some(container), identifier) {
            Ok(handle) => handle,
            Err(err) => {
                warn!(%err, "batch template unavailable");
                return Vec::new();
            }
        };

        let started = Instant::now();
        let no_context = AttributeSet::new();
        let mut created = Vec::with_capacity(values.len());

        for (index, value) in values.iter().enumerate() {
            let direct = base.merged(key, value.clone());
            match staged::construct(&handle, container, &self.root_context, &no_context, &direct) {
                Ok(instance) => {
                    self.adopt(&instance, ownership);
                    created.push(instance);
                }
                Err(err) => warn!(index, %err, "skipping batch element"),
            }
        }

        debug!(
            created = created.len(),
            elapsed = ?started.elapsed(),
            "batch finished"
        );
        created
    }
}
