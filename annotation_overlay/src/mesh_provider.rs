//! Holds the currently loaded mesh and fans out "mesh (re)loaded"
//! notifications. Subscriptions are guards: dropping one unsubscribes, so a
//! listener can never outlive the marker that registered it.

use std::{
    cell::{Cell, RefCell},
    collections::BTreeMap,
    rc::{Rc, Weak},
};

use crate::scene::SceneObject;

type Listener = Rc<dyn Fn()>;

#[derive(Default)]
struct ProviderState {
    mesh: RefCell<Option<Rc<SceneObject>>>,
    listeners: RefCell<BTreeMap<u64, Listener>>,
    next_listener: Cell<u64>,
}

/// Cheap to clone; clones share the same mesh slot and listener list.
#[derive(Clone, Default)]
pub struct MeshProvider {
    state: Rc<ProviderState>,
}

impl MeshProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Rc<SceneObject>> {
        self.state.mesh.borrow().clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.state.mesh.borrow().is_some()
    }

    /// Replaces the mesh and notifies every subscriber.
    pub fn load(&self, mesh: SceneObject) {
        log::info!("[overlay] mesh {} loaded", mesh.name);
        *self.state.mesh.borrow_mut() = Some(Rc::new(mesh));
        self.notify();
    }

    pub fn unload(&self) {
        self.state.mesh.borrow_mut().take();
    }

    /// Re-announces the current mesh without replacing it.
    pub fn notify(&self) {
        // Snapshot so listeners may subscribe or unsubscribe while running.
        let listeners: Vec<Listener> = self.state.listeners.borrow().values().cloned().collect();
        for listener in listeners {
            listener();
        }
    }

    pub fn subscribe(&self, listener: impl Fn() + 'static) -> MeshSubscription {
        let id = self.state.next_listener.get();
        self.state.next_listener.set(id + 1);
        self.state.listeners.borrow_mut().insert(id, Rc::new(listener));
        MeshSubscription {
            state: Rc::downgrade(&self.state),
            id,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.state.listeners.borrow().len()
    }

    pub fn downgrade(&self) -> WeakMeshProvider {
        WeakMeshProvider {
            state: Rc::downgrade(&self.state),
        }
    }
}

/// Non-owning provider reference for listeners, which the provider itself
/// stores and therefore must not keep alive.
#[derive(Clone)]
pub struct WeakMeshProvider {
    state: Weak<ProviderState>,
}

impl WeakMeshProvider {
    pub fn upgrade(&self) -> Option<MeshProvider> {
        self.state.upgrade().map(|state| MeshProvider { state })
    }
}

#[must_use = "dropping the subscription unsubscribes immediately"]
pub struct MeshSubscription {
    state: Weak<ProviderState>,
    id: u64,
}

impl Drop for MeshSubscription {
    fn drop(&mut self) {
        if let Some(state) = self.state.upgrade() {
            state.listeners.borrow_mut().remove(&self.id);
        }
    }
}

#[cfg(test)]
mod mesh_provider_tests {
    use super::*;
    use crate::geometry::TriangleMesh;

    fn mesh(name: &str) -> SceneObject {
        SceneObject::mesh(name, Rc::new(TriangleMesh::default()))
    }

    #[test]
    fn load_notifies_subscribers() {
        let provider = MeshProvider::new();
        let calls = Rc::new(Cell::new(0));
        let probe = Rc::clone(&calls);
        let _subscription = provider.subscribe(move || probe.set(probe.get() + 1));
        assert!(!provider.is_loaded());

        provider.load(mesh("part.stl"));
        provider.load(mesh("part-v2.stl"));
        assert_eq!(calls.get(), 2);
        assert_eq!(provider.current().map(|m| m.name.clone()).as_deref(), Some("part-v2.stl"));
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let provider = MeshProvider::new();
        let calls = Rc::new(Cell::new(0));
        let probe = Rc::clone(&calls);
        let subscription = provider.subscribe(move || probe.set(probe.get() + 1));
        assert_eq!(provider.subscriber_count(), 1);
        drop(subscription);
        assert_eq!(provider.subscriber_count(), 0);
        provider.load(mesh("part.stl"));
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn subscription_may_outlive_provider() {
        let provider = MeshProvider::new();
        let subscription = provider.subscribe(|| {});
        drop(provider);
        drop(subscription);
    }

    #[test]
    fn listener_can_read_current_mesh() {
        let provider = MeshProvider::new();
        let seen = Rc::new(RefCell::new(None));
        let reader = provider.clone();
        let sink = Rc::clone(&seen);
        let _subscription =
            provider.subscribe(move || *sink.borrow_mut() = reader.current().map(|m| m.name.clone()));
        provider.load(mesh("bracket.stl"));
        assert_eq!(seen.borrow().as_deref(), Some("bracket.stl"));
    }
}
