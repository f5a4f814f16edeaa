use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::object::ExecutionObject;

/// Ordered collection of execution objects keyed by execution ID.
///
/// Readers always receive copies of the object list, so the trigger worker can
/// iterate a candidate set while the dispatch context marks or removes entries.
#[derive(Debug, Default)]
pub struct ExecutionRegistry {
    objects: RwLock<Vec<Arc<ExecutionObject>>>,
}

impl ExecutionRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Arc<ExecutionObject>>> {
        self.objects.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Arc<ExecutionObject>>> {
        self.objects.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert `object`, replacing any object with the same ID.
    ///
    /// The replaced object is retired under the same write lock, so an
    /// in-flight snapshot that still holds it will skip it. The new object is
    /// appended to the end of the evaluation order.
    pub fn upsert(&self, object: Arc<ExecutionObject>) -> Option<Arc<ExecutionObject>> {
        let mut guard = self.write();
        let existing = guard
            .iter()
            .position(|o| o.execution_id() == object.execution_id());
        let previous = existing.map(|idx| guard.remove(idx));
        if let Some(prev) = &previous {
            prev.mark_for_deletion();
        }
        guard.push(object);
        previous
    }

    /// Live objects listening to `event`, in registration order.
    #[must_use]
    pub fn interested_in(&self, event: &str) -> Vec<Arc<ExecutionObject>> {
        self.read()
            .iter()
            .filter(|o| !o.is_marked_for_deletion() && o.listens_to(event))
            .cloned()
            .collect()
    }

    /// The object currently registered under `execution_id`.
    #[must_use]
    pub fn get(&self, execution_id: &str) -> Option<Arc<ExecutionObject>> {
        self.read()
            .iter()
            .find(|o| o.execution_id() == execution_id)
            .cloned()
    }

    /// Remove and retire the object registered under `execution_id`.
    pub fn remove(&self, execution_id: &str) -> Option<Arc<ExecutionObject>> {
        let mut guard = self.write();
        let idx = guard.iter().position(|o| o.execution_id() == execution_id)?;
        let removed = guard.remove(idx);
        removed.mark_for_deletion();
        Some(removed)
    }

    /// Remove `object` only if it is still the registered instance for its ID.
    pub fn remove_object(&self, object: &Arc<ExecutionObject>) -> bool {
        let mut guard = self.write();
        match guard.iter().position(|o| Arc::ptr_eq(o, object)) {
            Some(idx) => {
                guard.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Remove and retire everything. Returns the number of objects removed.
    pub fn remove_all(&self) -> usize {
        let removed: Vec<_> = self.write().drain(..).collect();
        for obj in &removed {
            obj.mark_for_deletion();
        }
        removed.len()
    }

    /// Copy of the collection. Objects are shared, not cloned.
    #[must_use]
    pub fn snapshot_all(&self) -> Vec<Arc<ExecutionObject>> {
        self.read().clone()
    }

    /// Number of registered objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// True if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::ExecutionSpec;

    fn object(id: &str, events: &[&str]) -> Arc<ExecutionObject> {
        Arc::new(ExecutionSpec::new(id, events.iter().copied(), |_, _| {}).into_object())
    }

    #[test]
    fn upsert_replaces_and_retires_previous() {
        let registry = ExecutionRegistry::new();
        let old = object("a", &["x"]);
        assert!(registry.upsert(Arc::clone(&old)).is_none());

        let new = object("a", &["x"]);
        let replaced = registry.upsert(Arc::clone(&new)).unwrap();
        assert!(Arc::ptr_eq(&replaced, &old));
        assert!(old.is_marked_for_deletion());
        assert_eq!(registry.len(), 1);

        let interested = registry.interested_in("x");
        assert_eq!(interested.len(), 1);
        assert!(Arc::ptr_eq(&interested[0], &new));
    }

    #[test]
    fn replacement_moves_to_end_of_order() {
        let registry = ExecutionRegistry::new();
        registry.upsert(object("a", &["x"]));
        registry.upsert(object("b", &["x"]));
        registry.upsert(object("a", &["x"]));

        let ids: Vec<_> = registry
            .snapshot_all()
            .iter()
            .map(|o| o.execution_id().to_string())
            .collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn interested_in_filters_by_event_and_mark() {
        let registry = ExecutionRegistry::new();
        let a = object("a", &["x"]);
        registry.upsert(Arc::clone(&a));
        registry.upsert(object("b", &["y"]));
        registry.upsert(object("c", &["x", "y"]));

        assert_eq!(registry.interested_in("x").len(), 2);
        a.mark_for_deletion();
        let ids: Vec<_> = registry
            .interested_in("x")
            .iter()
            .map(|o| o.execution_id().to_string())
            .collect();
        assert_eq!(ids, vec!["c"]);
        assert!(registry.interested_in("z").is_empty());
    }

    #[test]
    fn remove_object_keeps_newer_replacement() {
        let registry = ExecutionRegistry::new();
        let old = object("a", &["x"]);
        registry.upsert(Arc::clone(&old));
        let new = object("a", &["x"]);
        registry.upsert(Arc::clone(&new));

        assert!(!registry.remove_object(&old));
        assert!(registry.get("a").is_some());
        assert!(registry.remove_object(&new));
        assert!(registry.is_empty());
    }

    #[test]
    fn remove_and_remove_all_retire_objects() {
        let registry = ExecutionRegistry::new();
        let a = object("a", &["x"]);
        let b = object("b", &["x"]);
        registry.upsert(Arc::clone(&a));
        registry.upsert(Arc::clone(&b));

        assert!(registry.remove("missing").is_none());
        assert!(registry.remove("a").is_some());
        assert!(a.is_marked_for_deletion());

        assert_eq!(registry.remove_all(), 1);
        assert!(b.is_marked_for_deletion());
        assert!(registry.is_empty());
    }

    #[test]
    fn snapshot_shares_identity() {
        let registry = ExecutionRegistry::new();
        registry.upsert(object("a", &["x"]));
        let snap = registry.snapshot_all();
        snap[0].mark_for_deletion();
        assert!(registry.get("a").unwrap().is_marked_for_deletion());
        assert!(registry.interested_in("x").is_empty());
    }
}
