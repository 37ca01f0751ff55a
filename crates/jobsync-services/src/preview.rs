//! Local previews of selected photos.
//!
//! A preview is a registry entry addressed by a `preview://` URI. Handles
//! release their entry on drop, so a preview lives exactly as long as the
//! pending upload that owns it.

use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct PreviewRegistry {
    entries: Arc<Mutex<HashMap<Uuid, Bytes>>>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, Bytes>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn create(&self, data: Bytes) -> PreviewHandle {
        let id = Uuid::new_v4();
        self.lock().insert(id, data);
        PreviewHandle {
            id,
            registry: self.clone(),
        }
    }

    /// Bytes behind a preview URI, if it is still live.
    pub fn resolve(&self, uri: &str) -> Option<Bytes> {
        let id = uri.strip_prefix("preview://")?.parse::<Uuid>().ok()?;
        self.lock().get(&id).cloned()
    }

    pub fn live_count(&self) -> usize {
        self.lock().len()
    }

    fn release(&self, id: Uuid) {
        self.lock().remove(&id);
    }
}

pub struct PreviewHandle {
    id: Uuid,
    registry: PreviewRegistry,
}

impl PreviewHandle {
    pub fn uri(&self) -> String {
        format!("preview://{}", self.id)
    }
}

impl std::fmt::Debug for PreviewHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PreviewHandle").field(&self.id).finish()
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.registry.release(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_release_on_drop() {
        let registry = PreviewRegistry::new();
        let handle = registry.create(Bytes::from_static(b"img"));
        assert_eq!(registry.resolve(&handle.uri()).unwrap(), "img");
        assert_eq!(registry.live_count(), 1);

        let uri = handle.uri();
        drop(handle);
        assert_eq!(registry.live_count(), 0);
        assert!(registry.resolve(&uri).is_none());
    }
}
