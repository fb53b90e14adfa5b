use std::sync::Arc;

pub struct ResourceMarker;
pub type ResourceID = crate::id::UniqueID<ResourceMarker>;

/// Shared data that strokes run their jobs against, such as an image.
///
/// `Normal` jobs hold it shared, `Exclusive` jobs hold it alone. This holds across strokes,
/// every stroke started on clones of the same `ExclusiveResource` contends for the same lock.
#[derive(Clone)]
pub struct ExclusiveResource {
    id: ResourceID,
    lock: Arc<parking_lot::RwLock<()>>,
}
impl ExclusiveResource {
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: ResourceID::default(),
            lock: Arc::default(),
        }
    }
    #[must_use]
    pub fn id(&self) -> ResourceID {
        self.id
    }
    pub(super) fn shared(&self) -> parking_lot::RwLockReadGuard<'_, ()> {
        self.lock.read()
    }
    pub(super) fn exclusive(&self) -> parking_lot::RwLockWriteGuard<'_, ()> {
        self.lock.write()
    }
}
impl Default for ExclusiveResource {
    fn default() -> Self {
        Self::new()
    }
}
impl std::fmt::Debug for ExclusiveResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ExclusiveResource({})", self.id)
    }
}
