//! Registry of instances whose destruction the caller controls

use indexmap::IndexMap;
use tracing::debug;

use crate::scene::{InstanceId, InstanceRef};

/// Tracked instances plus the ones waiting for release.
///
/// Destruction is two-phase. [`destroy`](Self::destroy) only unregisters the
/// instance and queues it; [`flush`](Self::flush) is the safe point where it
/// is detached and its object and context are released.
#[derive(Debug, Default)]
pub struct LifecycleTracker {
    live: IndexMap<InstanceId, InstanceRef>,
    pending: Vec<InstanceRef>,
}

impl LifecycleTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, instance: InstanceRef) {
        debug!(instance = %instance.id(), uri = instance.uri(), "tracking instance");
        self.live.insert(instance.id(), instance);
    }

    /// Unregister `id` and schedule its release. Unknown ids are ignored.
    pub fn destroy(&mut self, id: InstanceId) -> bool {
        match self.live.shift_remove(&id) {
            Some(instance) => {
                self.pending.push(instance);
                true
            }
            None => false,
        }
    }

    /// Destroy each id in turn, returning how many were tracked
    pub fn destroy_all(&mut self, ids: &[InstanceId]) -> usize {
        ids.iter().filter(|&&id| self.destroy(id)).count()
    }

    /// Destroy every tracked instance
    pub fn destroy_everything(&mut self) -> usize {
        let count = self.live.len();
        self.pending.extend(self.live.drain(..).map(|(_, instance)| instance));
        count
    }

    /// Detach and release every pending instance, returning how many were released
    pub fn flush(&mut self) -> usize {
        let pending = std::mem::take(&mut self.pending);
        let mut released = 0;
        for instance in pending {
            instance.detach();
            if instance.release() {
                released += 1;
            }
        }
        if released > 0 {
            debug!(released, "released tracked instances");
        }
        released
    }

    pub fn is_tracked(&self, id: InstanceId) -> bool {
        self.live.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Tracked ids in registration order
    pub fn ids(&self) -> Vec<InstanceId> {
        self.live.keys().copied().collect()
    }
}
