//! # IDs
//! Strokes, nodes, filter cookies and resources are all named by a `UniqueID<T>`, which is unique
//! within one execution of the program and namespaced by the marker type `T`.
//!
//! IDs of one namespace are handed out in increasing order, which the replay code leans on to get a
//! deterministic node order. Nothing else should rely on it.

// Next free ID, per namespace.
static ID_SERVER: parking_lot::Mutex<
    std::collections::BTreeMap<std::any::TypeId, std::sync::Arc<std::sync::atomic::AtomicU64>>,
> = parking_lot::const_mutex(std::collections::BTreeMap::new());

fn counter_for<T: std::any::Any>() -> std::sync::Arc<std::sync::atomic::AtomicU64> {
    ID_SERVER
        .lock()
        .entry(std::any::TypeId::of::<T>())
        // Zero is the niche, start at one.
        .or_insert_with(|| std::sync::Arc::new(1.into()))
        .clone()
}

/// ID that is guaranteed unique within this execution of the program.
/// IDs with different marker types may share a value but are never comparable.
pub struct UniqueID<T: std::any::Any> {
    id: std::num::NonZeroU64,
    _phantom: std::marker::PhantomData<fn() -> T>,
}
impl<T: std::any::Any> UniqueID<T> {
    /// Allocate a fresh ID.
    #[must_use]
    pub fn new() -> Self {
        let id = counter_for::<T>().fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        // A u64 will not be exhausted by this program, but wrapping around to zero would hand out duplicates.
        let Some(id) = std::num::NonZeroU64::new(id) else {
            log::error!("{} ID overflow! Aborting!", std::any::type_name::<T>());
            log::logger().flush();
            std::process::abort();
        };
        Self {
            id,
            _phantom: std::marker::PhantomData,
        }
    }
    /// Get the raw numeric value of this ID.
    #[must_use]
    pub fn get(&self) -> u64 {
        self.id.get()
    }
}
impl<T: std::any::Any> Default for UniqueID<T> {
    fn default() -> Self {
        Self::new()
    }
}
impl<T: std::any::Any> Clone for UniqueID<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T: std::any::Any> Copy for UniqueID<T> {}
impl<T: std::any::Any> PartialEq for UniqueID<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl<T: std::any::Any> Eq for UniqueID<T> {}
impl<T: std::any::Any> PartialOrd for UniqueID<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl<T: std::any::Any> Ord for UniqueID<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}
impl<T: std::any::Any> std::hash::Hash for UniqueID<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
impl<T: std::any::Any> std::fmt::Display for UniqueID<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // rsplit always yields at least one element.
        write!(
            f,
            "{}#{}",
            std::any::type_name::<T>().rsplit("::").next().unwrap_or_default(),
            self.id
        )
    }
}
impl<T: std::any::Any> std::fmt::Debug for UniqueID<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        <Self as std::fmt::Display>::fmt(self, f)
    }
}

#[cfg(test)]
mod test {
    use super::UniqueID;
    // Tests share the global ID server, so each gets its own namespace.

    #[test]
    fn ids_unique() {
        struct Namespace;
        type TestID = UniqueID<Namespace>;

        let mut v: Vec<_> = (0..1024).map(|_| TestID::new()).collect();
        let length_before = v.len();
        v.sort_unstable();
        v.dedup();
        assert_eq!(length_before, v.len(), "had duplicate ids");
    }
    #[test]
    fn ids_increase() {
        struct Namespace;
        type TestID = UniqueID<Namespace>;

        let a = TestID::new();
        let b = TestID::new();
        assert!(a < b);
        assert_eq!(a.get(), 1);
    }
    #[test]
    fn namespaces_independent() {
        struct A;
        struct B;
        let a = UniqueID::<A>::new();
        let b = UniqueID::<B>::new();
        // Both namespaces start fresh.
        assert_eq!(a.get(), b.get());
        assert_eq!(format!("{a}"), "A#1");
    }
}
